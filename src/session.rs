// src/session.rs
use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::str::FromStr;

use crate::auth::UserId;
use crate::db::{self, keys, KeyValueStore};
use crate::day::WorkoutLog;
use crate::template::TemplateBook;
use crate::units::WeightUnit;
use crate::workout::DailyWorkouts;

/// Everything stored for one signed-in user, loaded together and written back together.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: UserId,
    pub unit: WeightUnit,
    pub templates: TemplateBook,
    pub log: WorkoutLog,
}

impl Session {
    /// A brand new user's data: no templates, no workouts, kilograms.
    #[must_use]
    pub fn empty(user: UserId) -> Self {
        Self {
            user,
            unit: WeightUnit::default(),
            templates: TemplateBook::new(),
            log: WorkoutLog::default(),
        }
    }

    /// Reads the user's keys. Missing keys fall back to empty values.
    /// # Errors
    /// `db::Error` when a read fails or a stored value is corrupt.
    pub fn load(store: &dyn KeyValueStore, user: UserId) -> Result<Self, db::Error> {
        let uid = user.as_str();
        let workouts: DailyWorkouts =
            db::get_json(store, &keys::workouts(uid))?.unwrap_or_default();
        let templates: TemplateBook =
            db::get_json(store, &keys::templates(uid))?.unwrap_or_default();
        let finished: Vec<NaiveDate> =
            db::get_json(store, &keys::finished(uid))?.unwrap_or_default();
        // Unknown unit strings are treated like a missing preference.
        let unit = store
            .get(&keys::unit(uid))?
            .and_then(|raw| WeightUnit::from_str(raw.trim()).ok())
            .unwrap_or_default();

        tracing::debug!(
            user = uid,
            days = workouts.len(),
            templates = templates.len(),
            "Loaded session"
        );

        Ok(Self {
            user,
            unit,
            templates,
            log: WorkoutLog::new(workouts, finished.into_iter().collect::<BTreeSet<_>>()),
        })
    }

    /// The serialized form of every key this session owns.
    /// # Errors
    /// `db::Error::Serialize` if a value cannot be encoded.
    pub fn entries(&self) -> Result<Vec<(String, String)>, db::Error> {
        let uid = self.user.as_str();
        let finished: Vec<NaiveDate> = self.log.finished().iter().copied().collect();
        Ok(vec![
            db::to_json(&keys::workouts(uid), self.log.workouts())?,
            db::to_json(&keys::templates(uid), &self.templates)?,
            db::to_json(&keys::finished(uid), &finished)?,
            (keys::unit(uid), self.unit.to_string()),
        ])
    }

    /// Writes all of the user's keys in one atomic batch.
    /// # Errors
    /// `db::Error` if encoding or the write fails; nothing is written in that case.
    pub fn save(&self, store: &mut dyn KeyValueStore) -> Result<(), db::Error> {
        let entries = self.entries()?;
        store.set_many(&entries)?;
        tracing::debug!(user = self.user.as_str(), "Saved session");
        Ok(())
    }
}
