// src/units.rs
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

pub const LBS_TO_KGS: f64 = 0.453_592;
pub const KGS_TO_LBS: f64 = 2.204_62;

/// Converts pounds to kilograms.
#[must_use]
pub fn to_kgs(lbs: f64) -> f64 {
    lbs * LBS_TO_KGS
}

/// Converts kilograms to pounds.
/// Not an exact inverse of `to_kgs`, compare round trips with a tolerance.
#[must_use]
pub fn to_lbs(kgs: f64) -> f64 {
    kgs * KGS_TO_LBS
}

/// Display/input unit chosen by the user. Stored weights are always pounds.
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum WeightUnit {
    Lbs,
    #[default]
    Kgs,
}

impl WeightUnit {
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Lbs => Self::Kgs,
            Self::Kgs => Self::Lbs,
        }
    }

    /// Converts a stored (pound) value into this unit for display.
    #[must_use]
    pub fn from_canonical(self, lbs: f64) -> f64 {
        match self {
            Self::Lbs => lbs,
            Self::Kgs => to_kgs(lbs),
        }
    }

    /// Converts a value entered in this unit into pounds for storage.
    #[must_use]
    pub fn to_canonical(self, value: f64) -> f64 {
        match self {
            Self::Lbs => value,
            Self::Kgs => to_lbs(value),
        }
    }
}
