// src/rest.rs
use chrono::{DateTime, Local, NaiveDate, Utc};

/// Source of the current time. Injected so day classification can be pinned in tests.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;

    /// Today's calendar date in the user's local time zone.
    fn today(&self) -> NaiveDate {
        self.now().with_timezone(&Local).date_naive()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at one instant, with "today" fixed independently of time zone.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    pub now: DateTime<Utc>,
    pub today: NaiveDate,
}

impl FixedClock {
    #[must_use]
    pub fn on(today: NaiveDate) -> Self {
        let now = today
            .and_hms_opt(12, 0, 0)
            .map_or_else(Utc::now, |dt| dt.and_utc());
        Self { now, today }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn today(&self) -> NaiveDate {
        self.today
    }
}

/// The single rest countdown of a workout log. At most one runs at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestTimer {
    #[default]
    Idle,
    Resting {
        date: NaiveDate,
        exercise_index: usize,
        set_index: usize,
        remaining_secs: u32,
    },
}

impl RestTimer {
    /// Starts a countdown, replacing whatever was running.
    pub fn start(&mut self, date: NaiveDate, exercise_index: usize, set_index: usize, secs: u32) {
        *self = if secs == 0 {
            Self::Idle
        } else {
            Self::Resting {
                date,
                exercise_index,
                set_index,
                remaining_secs: secs,
            }
        };
    }

    /// Advances the countdown by one second. Returns true when this tick ended the rest.
    pub fn tick(&mut self) -> bool {
        match self {
            Self::Idle => false,
            Self::Resting { remaining_secs, .. } => {
                *remaining_secs = remaining_secs.saturating_sub(1);
                if *remaining_secs == 0 {
                    *self = Self::Idle;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Ends the rest early.
    pub fn skip(&mut self) {
        *self = Self::Idle;
    }

    #[must_use]
    pub const fn is_resting(&self) -> bool {
        matches!(self, Self::Resting { .. })
    }

    #[must_use]
    pub const fn remaining_secs(&self) -> Option<u32> {
        match self {
            Self::Idle => None,
            Self::Resting { remaining_secs, .. } => Some(*remaining_secs),
        }
    }

    /// True if the rest belongs to this set.
    #[must_use]
    pub fn is_resting_on(&self, date: NaiveDate, exercise_index: usize, set_index: usize) -> bool {
        matches!(*self, Self::Resting { date: d, exercise_index: e, set_index: s, .. }
            if d == date && e == exercise_index && s == set_index)
    }

    /// Keeps the timer pointing at the same exercise after a reorder on `date`.
    pub(crate) fn follow_move(&mut self, on: NaiveDate, from: usize, to: usize) {
        if let Self::Resting {
            date,
            exercise_index,
            ..
        } = self
        {
            if *date != on {
                return;
            }
            let idx = *exercise_index;
            *exercise_index = if idx == from {
                to
            } else if from < idx && idx <= to {
                idx - 1
            } else if to <= idx && idx < from {
                idx + 1
            } else {
                idx
            };
        }
    }

    /// Keeps the timer on the same set after set `removed` of an exercise
    /// is deleted. Resting on the removed set goes idle.
    pub(crate) fn follow_set_removal(&mut self, on: NaiveDate, exercise: usize, removed: usize) {
        if let Self::Resting {
            date,
            exercise_index,
            set_index,
            ..
        } = self
        {
            if *date != on || *exercise_index != exercise {
                return;
            }
            if *set_index == removed {
                *self = Self::Idle;
            } else if *set_index > removed {
                *set_index -= 1;
            }
        }
    }
}

/// Formats seconds as `MM:SS`.
#[must_use]
pub fn format_countdown(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
