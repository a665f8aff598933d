// src/template.rs
use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::validation::Error as ValidationError;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TemplateExercise {
    pub name: String,
}

impl TemplateExercise {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: String,
    pub name: String,
    pub exercises: Vec<TemplateExercise>,
    #[serde(default)]
    pub assigned_days: Vec<Weekday>,
    pub rest_time: u32,
}

impl Template {
    /// Checks the template is usable: a name, at least one named exercise, positive rest.
    /// # Errors
    /// Returns the first `ValidationError` found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyField("template name"));
        }
        if self.exercises.is_empty() {
            return Err(ValidationError::NoExercises);
        }
        if let Some(pos) = self.exercises.iter().position(|e| e.name.trim().is_empty()) {
            return Err(ValidationError::EmptyExerciseName(pos + 1));
        }
        if self.rest_time == 0 {
            return Err(ValidationError::NonPositive("rest time"));
        }
        Ok(())
    }

    /// Adds the day if absent, removes it otherwise.
    pub fn toggle_day(&mut self, day: Weekday) {
        if let Some(pos) = self.assigned_days.iter().position(|d| *d == day) {
            self.assigned_days.remove(pos);
        } else {
            self.assigned_days.push(day);
            self.assigned_days.sort_by_key(Weekday::num_days_from_sunday);
        }
    }

    #[must_use]
    pub fn is_assigned_to(&self, day: Weekday) -> bool {
        self.assigned_days.contains(&day)
    }

    pub fn add_exercise(&mut self, name: impl Into<String>) {
        self.exercises.push(TemplateExercise::new(name));
    }

    /// Removes the exercise at `index`, returning it.
    pub fn remove_exercise(&mut self, index: usize) -> Option<TemplateExercise> {
        (index < self.exercises.len()).then(|| self.exercises.remove(index))
    }

    /// Moves the exercise at `from` so it ends up at `to`. Returns false if either index is out of range.
    pub fn move_exercise(&mut self, from: usize, to: usize) -> bool {
        move_item(&mut self.exercises, from, to)
    }
}

/// Remove-then-insert reorder shared by templates and day plans.
pub(crate) fn move_item<T>(items: &mut Vec<T>, from: usize, to: usize) -> bool {
    if from >= items.len() || to >= items.len() {
        return false;
    }
    let item = items.remove(from);
    items.insert(to, item);
    true
}

/// Parses a weekday label such as "Mon" or "monday".
/// # Errors
/// `ValidationError::InvalidWeekday` when the label is not a weekday.
pub fn parse_weekday(label: &str) -> Result<Weekday, ValidationError> {
    label
        .trim()
        .parse::<Weekday>()
        .map_err(|_| ValidationError::InvalidWeekday(label.to_string()))
}

/// All templates of one user, keyed by id.
pub type TemplateBook = BTreeMap<String, Template>;

/// Generates an id from the current time in milliseconds, bumped until unused.
#[must_use]
pub fn next_template_id(book: &TemplateBook, now_millis: i64) -> String {
    let mut candidate = now_millis;
    while book.contains_key(&candidate.to_string()) {
        candidate += 1;
    }
    candidate.to_string()
}

/// Templates assigned to `day`, sorted by name.
#[must_use]
pub fn templates_for_weekday(book: &TemplateBook, day: Weekday) -> Vec<&Template> {
    let mut found: Vec<&Template> = book.values().filter(|t| t.is_assigned_to(day)).collect();
    found.sort_by(|a, b| a.name.cmp(&b.name));
    found
}

/// Finds a template by id, or failing that by case-insensitive name.
#[must_use]
pub fn find_template<'a>(book: &'a TemplateBook, identifier: &str) -> Option<&'a Template> {
    let trimmed = identifier.trim();
    book.get(trimmed)
        .or_else(|| book.values().find(|t| t.name.eq_ignore_ascii_case(trimmed)))
}
