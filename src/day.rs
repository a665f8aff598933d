// src/day.rs
use chrono::NaiveDate;
use std::collections::BTreeSet;
use thiserror::Error;

use crate::config::{CarryForward, StandardColor};
use crate::rest::RestTimer;
use crate::template::{move_item, Template};
use crate::units::WeightUnit;
use crate::validation::Error as ValidationError;
use crate::workout::{self, apply_template, carried_weight, DailyWorkouts, ExerciseEntry};

/// Rest time for an exercise added to an empty day.
pub const FALLBACK_REST_SECS: u32 = 60;

/// Guard violations on a day's workout.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("{0} is in the past and can no longer be changed.")]
    Locked(NaiveDate),
    #[error("The workout for {0} is already finished.")]
    Finished(NaiveDate),
    #[error("Sets can only be logged today, not on {0}.")]
    NotToday(NaiveDate),
    #[error("No workout scheduled on {0}.")]
    NoWorkout(NaiveDate),
    #[error("No exercise #{index} on {date}.")]
    ExerciseOutOfRange { date: NaiveDate, index: usize },
    #[error("No set #{index} for this exercise.")]
    SetOutOfRange { index: usize },
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayStatus {
    Past,
    Today,
    Future,
}

impl DayStatus {
    #[must_use]
    pub fn of(date: NaiveDate, today: NaiveDate) -> Self {
        match date.cmp(&today) {
            std::cmp::Ordering::Less => Self::Past,
            std::cmp::Ordering::Equal => Self::Today,
            std::cmp::Ordering::Greater => Self::Future,
        }
    }
}

/// What a `log_set` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetToggle {
    /// The set is now logged and a rest of this many seconds started.
    Logged { rest_secs: u32 },
    /// The set was logged already and is now cleared.
    Unlogged,
}

/// The daily workouts of one user plus the finished markers and the rest timer.
#[derive(Debug, Clone, Default)]
pub struct WorkoutLog {
    workouts: DailyWorkouts,
    finished: BTreeSet<NaiveDate>,
    completed: BTreeSet<NaiveDate>,
    pub rest: RestTimer,
}

impl WorkoutLog {
    #[must_use]
    pub fn new(workouts: DailyWorkouts, finished: BTreeSet<NaiveDate>) -> Self {
        let completed = workout::completed_dates(&workouts);
        Self {
            workouts,
            finished,
            completed,
            rest: RestTimer::Idle,
        }
    }

    #[must_use]
    pub const fn workouts(&self) -> &DailyWorkouts {
        &self.workouts
    }

    #[must_use]
    pub const fn finished(&self) -> &BTreeSet<NaiveDate> {
        &self.finished
    }

    #[must_use]
    pub const fn completed(&self) -> &BTreeSet<NaiveDate> {
        &self.completed
    }

    /// The day's entries, empty when nothing is scheduled.
    #[must_use]
    pub fn day(&self, date: NaiveDate) -> &[ExerciseEntry] {
        self.workouts.get(&date).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn is_finished(&self, date: NaiveDate) -> bool {
        self.finished.contains(&date)
    }

    #[must_use]
    pub fn is_completed(&self, date: NaiveDate) -> bool {
        self.completed.contains(&date)
    }

    /// Today or later, and not finished.
    #[must_use]
    pub fn is_editable(&self, date: NaiveDate, today: NaiveDate) -> bool {
        DayStatus::of(date, today) != DayStatus::Past && !self.is_finished(date)
    }

    fn ensure_editable(&self, date: NaiveDate, today: NaiveDate) -> Result<(), Error> {
        if DayStatus::of(date, today) == DayStatus::Past {
            return Err(Error::Locked(date));
        }
        if self.is_finished(date) {
            return Err(Error::Finished(date));
        }
        Ok(())
    }

    fn refresh_completed(&mut self) {
        self.completed = workout::completed_dates(&self.workouts);
    }

    fn entry_mut(&mut self, date: NaiveDate, index: usize) -> Result<&mut ExerciseEntry, Error> {
        let entries = self.workouts.get_mut(&date).ok_or(Error::NoWorkout(date))?;
        entries
            .get_mut(index)
            .ok_or(Error::ExerciseOutOfRange { date, index })
    }

    /// Replaces the day's list with entries built from `template`.
    /// # Errors
    /// `Locked` for past days, `Finished` for finished days.
    pub fn apply_template(
        &mut self,
        template: &Template,
        date: NaiveDate,
        today: NaiveDate,
        policy: CarryForward,
    ) -> Result<&[ExerciseEntry], Error> {
        self.ensure_editable(date, today)?;
        let entries = apply_template(template, date, &self.workouts, policy);
        if matches!(self.rest, RestTimer::Resting { date: d, .. } if d == date) {
            self.rest.skip();
        }
        self.workouts.insert(date, entries);
        self.refresh_completed();
        Ok(self.day(date))
    }

    /// Appends one exercise to the day, prefilled like a template entry.
    /// # Errors
    /// Guard errors, or `EmptyField` for a blank name.
    pub fn add_exercise(
        &mut self,
        date: NaiveDate,
        today: NaiveDate,
        name: &str,
        policy: CarryForward,
    ) -> Result<usize, Error> {
        self.ensure_editable(date, today)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyField("exercise name").into());
        }
        let weight = carried_weight(&self.workouts, name, date, policy).unwrap_or(0.0);
        let entries = self.workouts.entry(date).or_default();
        let rest = entries.last().map_or(FALLBACK_REST_SECS, |e| e.rest_time);
        entries.push(ExerciseEntry::new(name, weight, rest));
        let index = entries.len() - 1;
        self.refresh_completed();
        Ok(index)
    }

    /// Toggles one set. Logging an unlogged set starts the rest timer.
    /// The flag list is padded with `false` up to `set_index` first.
    /// # Errors
    /// `NotToday` unless `date == today`; index errors, including a set index
    /// at or past the entry's set count.
    pub fn log_set(
        &mut self,
        date: NaiveDate,
        today: NaiveDate,
        exercise_index: usize,
        set_index: usize,
    ) -> Result<SetToggle, Error> {
        if date != today {
            return Err(Error::NotToday(date));
        }
        let entry = self.entry_mut(date, exercise_index)?;
        if set_index >= entry.sets as usize {
            return Err(Error::SetOutOfRange { index: set_index });
        }
        if entry.logged_sets.len() <= set_index {
            entry.logged_sets.resize(set_index + 1, false);
        }
        let now_logged = !entry.logged_sets[set_index];
        entry.logged_sets[set_index] = now_logged;
        let rest_secs = entry.rest_time;

        let toggle = if now_logged {
            self.rest.start(date, exercise_index, set_index, rest_secs);
            SetToggle::Logged { rest_secs }
        } else {
            SetToggle::Unlogged
        };
        self.refresh_completed();
        Ok(toggle)
    }

    /// Adds an unlogged set.
    /// # Errors
    /// Guard and index errors.
    pub fn add_set(
        &mut self,
        date: NaiveDate,
        today: NaiveDate,
        exercise_index: usize,
    ) -> Result<u32, Error> {
        self.ensure_editable(date, today)?;
        let entry = self.entry_mut(date, exercise_index)?;
        entry.sets += 1;
        entry.logged_sets.push(false);
        let sets = entry.sets;
        self.refresh_completed();
        Ok(sets)
    }

    /// Removes set `set_index`. With only one set left nothing changes.
    /// A rest on the removed set ends; a rest on a later set shifts down.
    /// # Errors
    /// Guard and index errors.
    pub fn remove_set(
        &mut self,
        date: NaiveDate,
        today: NaiveDate,
        exercise_index: usize,
        set_index: usize,
    ) -> Result<u32, Error> {
        self.ensure_editable(date, today)?;
        let entry = self.entry_mut(date, exercise_index)?;
        if set_index >= entry.sets as usize {
            return Err(Error::SetOutOfRange { index: set_index });
        }
        if entry.sets <= 1 {
            return Ok(entry.sets);
        }
        entry.sets -= 1;
        if set_index < entry.logged_sets.len() {
            entry.logged_sets.remove(set_index);
        }
        let sets = entry.sets;
        self.rest.follow_set_removal(date, exercise_index, set_index);
        self.refresh_completed();
        Ok(sets)
    }

    /// Sets the working weight, entered in `unit`, stored in pounds.
    /// # Errors
    /// Guard and index errors, `InvalidNumber` for negative or non-finite input.
    pub fn set_weight(
        &mut self,
        date: NaiveDate,
        today: NaiveDate,
        exercise_index: usize,
        value: f64,
        unit: WeightUnit,
    ) -> Result<f64, Error> {
        self.ensure_editable(date, today)?;
        if !value.is_finite() || value < 0.0 {
            return Err(ValidationError::InvalidNumber {
                field: "weight",
                value: value.to_string(),
            }
            .into());
        }
        let entry = self.entry_mut(date, exercise_index)?;
        entry.weight = unit.to_canonical(value);
        Ok(entry.weight)
    }

    /// # Errors
    /// Guard and index errors, `NonPositive` for zero reps.
    pub fn set_reps(
        &mut self,
        date: NaiveDate,
        today: NaiveDate,
        exercise_index: usize,
        reps: u32,
    ) -> Result<(), Error> {
        self.ensure_editable(date, today)?;
        if reps == 0 {
            return Err(ValidationError::NonPositive("reps").into());
        }
        self.entry_mut(date, exercise_index)?.reps = reps;
        Ok(())
    }

    /// # Errors
    /// Guard and index errors.
    pub fn set_color(
        &mut self,
        date: NaiveDate,
        today: NaiveDate,
        exercise_index: usize,
        color: Option<StandardColor>,
    ) -> Result<(), Error> {
        self.ensure_editable(date, today)?;
        self.entry_mut(date, exercise_index)?.color = color;
        Ok(())
    }

    /// Moves an exercise within the day. A running rest follows its exercise.
    /// # Errors
    /// Guard and index errors.
    pub fn move_exercise(
        &mut self,
        date: NaiveDate,
        today: NaiveDate,
        from: usize,
        to: usize,
    ) -> Result<(), Error> {
        self.ensure_editable(date, today)?;
        let entries = self.workouts.get_mut(&date).ok_or(Error::NoWorkout(date))?;
        let len = entries.len();
        if !move_item(entries, from, to) {
            let index = if from >= len { from } else { to };
            return Err(Error::ExerciseOutOfRange { date, index });
        }
        self.rest.follow_move(date, from, to);
        Ok(())
    }

    /// Marks today's workout as finished, whether or not every set was logged.
    /// # Errors
    /// `NotToday` for other days, `Finished` when already marked.
    pub fn finish(&mut self, date: NaiveDate, today: NaiveDate) -> Result<(), Error> {
        if date != today {
            return Err(Error::NotToday(date));
        }
        if !self.finished.insert(date) {
            return Err(Error::Finished(date));
        }
        self.workouts.entry(date).or_default();
        self.refresh_completed();
        Ok(())
    }

    /// One second of rest elapsed. Returns true when the rest just ended.
    pub fn tick(&mut self) -> bool {
        self.rest.tick()
    }

    pub fn skip_rest(&mut self) {
        self.rest.skip();
    }
}
