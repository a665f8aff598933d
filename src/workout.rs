// src/workout.rs
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::config::{CarryForward, StandardColor};
use crate::template::Template;

pub const DEFAULT_SETS: u32 = 3;
pub const DEFAULT_REPS: u32 = 8;

/// One exercise scheduled on one day. Weights are always pounds.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseEntry {
    pub name: String,
    pub sets: u32,
    pub reps: u32,
    pub weight: f64,
    pub last_weight: f64,
    #[serde(default)]
    pub color: Option<StandardColor>,
    /// May be shorter than `sets`; missing flags read as unlogged.
    #[serde(default)]
    pub logged_sets: Vec<bool>,
    pub rest_time: u32,
}

impl ExerciseEntry {
    /// A fresh entry with default sets/reps, nothing logged.
    pub fn new(name: impl Into<String>, carried_weight: f64, rest_time: u32) -> Self {
        Self {
            name: name.into(),
            sets: DEFAULT_SETS,
            reps: DEFAULT_REPS,
            weight: carried_weight,
            last_weight: carried_weight,
            color: None,
            logged_sets: Vec::new(),
            rest_time,
        }
    }

    #[must_use]
    pub fn is_set_logged(&self, set_index: usize) -> bool {
        self.logged_sets.get(set_index).copied().unwrap_or(false)
    }

    #[must_use]
    pub fn logged_count(&self) -> usize {
        self.logged_sets.iter().filter(|s| **s).count()
    }

    /// Every recorded flag is set and at least one is recorded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.logged_sets.is_empty() && self.logged_sets.iter().all(|s| *s)
    }

    /// Whether this entry may supply a carried-forward weight.
    #[must_use]
    pub fn is_weight_source(&self, policy: CarryForward) -> bool {
        match policy {
            CarryForward::AnyRecorded => !self.logged_sets.is_empty(),
            CarryForward::AnyCompleted => self.logged_sets.iter().any(|s| *s),
        }
    }

    /// Weight change against the previous session, in pounds.
    #[must_use]
    pub fn weight_delta(&self) -> f64 {
        self.weight - self.last_weight
    }
}

/// Every logged day of one user, keyed by calendar date (serialized as `YYYY-MM-DD`).
pub type DailyWorkouts = BTreeMap<NaiveDate, Vec<ExerciseEntry>>;

/// Most recent weight for `exercise` strictly before `before`, searching newest first.
/// Returns `None` if no entry qualifies under `policy`.
#[must_use]
pub fn carried_weight(
    history: &DailyWorkouts,
    exercise: &str,
    before: NaiveDate,
    policy: CarryForward,
) -> Option<f64> {
    history
        .range(..before)
        .rev()
        .find_map(|(_, entries)| {
            // Only the first same-named entry of a day is considered.
            entries
                .iter()
                .find(|e| e.name == exercise)
                .filter(|e| e.is_weight_source(policy))
                .map(|e| e.weight)
        })
}

/// Builds a day's entries from `template`, prefilling weights from `history`.
/// Pure: the same inputs always produce the same output and nothing is stored.
#[must_use]
pub fn apply_template(
    template: &Template,
    target: NaiveDate,
    history: &DailyWorkouts,
    policy: CarryForward,
) -> Vec<ExerciseEntry> {
    template
        .exercises
        .iter()
        .map(|ex| {
            let weight = carried_weight(history, &ex.name, target, policy).unwrap_or(0.0);
            ExerciseEntry::new(ex.name.clone(), weight, template.rest_time)
        })
        .collect()
}

/// A day counts as completed when it has entries and every one of them is complete.
#[must_use]
pub fn is_day_completed(entries: &[ExerciseEntry]) -> bool {
    !entries.is_empty() && entries.iter().all(ExerciseEntry::is_complete)
}

/// Derives the completed dates. Recomputed after every change, never stored.
#[must_use]
pub fn completed_dates(workouts: &DailyWorkouts) -> BTreeSet<NaiveDate> {
    workouts
        .iter()
        .filter(|(_, entries)| is_day_completed(entries))
        .map(|(date, _)| *date)
        .collect()
}
