use chrono::NaiveDate;
use revup_lib::rest::format_countdown;
use revup_lib::{
    CarryForward, DailyWorkouts, DayError, DayStatus, ExerciseEntry, RestTimer, SetToggle,
    StandardColor, Template, TemplateExercise, ValidationError, WeightUnit, WorkoutLog,
};
use std::collections::BTreeSet;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

const TODAY: (i32, u32, u32) = (2024, 5, 15);

fn today() -> NaiveDate {
    date(TODAY.0, TODAY.1, TODAY.2)
}

fn push_day() -> Template {
    Template {
        id: "1715000000000".to_string(),
        name: "Push Day".to_string(),
        exercises: vec![
            TemplateExercise::new("Bench Press"),
            TemplateExercise::new("Overhead Press"),
        ],
        assigned_days: vec![],
        rest_time: 90,
    }
}

/// A log with Push Day applied to today.
fn log_with_today() -> WorkoutLog {
    let mut log = WorkoutLog::default();
    log.apply_template(&push_day(), today(), today(), CarryForward::default())
        .unwrap();
    log
}

#[test]
fn test_day_status() {
    assert_eq!(DayStatus::of(date(2024, 5, 14), today()), DayStatus::Past);
    assert_eq!(DayStatus::of(today(), today()), DayStatus::Today);
    assert_eq!(DayStatus::of(date(2024, 5, 16), today()), DayStatus::Future);
}

#[test]
fn test_toggle_logs_and_starts_rest() {
    let mut log = log_with_today();

    let toggle = log.log_set(today(), today(), 0, 0).unwrap();
    assert_eq!(toggle, SetToggle::Logged { rest_secs: 90 });
    assert!(log.day(today())[0].is_set_logged(0));
    assert!(log.rest.is_resting_on(today(), 0, 0));
    assert_eq!(log.rest.remaining_secs(), Some(90));

    log.skip_rest();
    let toggle = log.log_set(today(), today(), 0, 0).unwrap();
    assert_eq!(toggle, SetToggle::Unlogged);
    assert!(!log.day(today())[0].is_set_logged(0));
    assert!(!log.rest.is_resting());
}

#[test]
fn test_log_set_pads_missing_flags() {
    let mut log = log_with_today();
    log.log_set(today(), today(), 1, 2).unwrap();
    assert_eq!(log.day(today())[1].logged_sets, vec![false, false, true]);
}

#[test]
fn test_log_set_rejects_sets_past_the_count() {
    let mut log = log_with_today();
    assert_eq!(
        log.log_set(today(), today(), 0, 3),
        Err(DayError::SetOutOfRange { index: 3 })
    );
    assert_eq!(
        log.log_set(today(), today(), 0, usize::MAX - 1),
        Err(DayError::SetOutOfRange { index: usize::MAX - 1 })
    );
    assert!(log.day(today())[0].logged_sets.is_empty());
    assert!(!log.rest.is_resting());

    // Every real set still completes the day
    for ex in 0..2 {
        for set in 0..3 {
            log.log_set(today(), today(), ex, set).unwrap();
        }
    }
    assert!(log.is_completed(today()));
}

#[test]
fn test_new_log_replaces_running_rest() {
    let mut log = log_with_today();
    log.log_set(today(), today(), 0, 0).unwrap();
    log.tick();
    log.log_set(today(), today(), 1, 0).unwrap();
    assert!(log.rest.is_resting_on(today(), 1, 0));
    assert!(!log.rest.is_resting_on(today(), 0, 0));
    assert_eq!(log.rest.remaining_secs(), Some(90));
}

#[test]
fn test_rest_timer_runs_out_after_rest_time_ticks() {
    let mut timer = RestTimer::default();
    timer.start(today(), 0, 0, 3);
    assert!(!timer.tick());
    assert!(!timer.tick());
    assert!(timer.tick());
    assert_eq!(timer, RestTimer::Idle);
    assert!(!timer.tick());

    timer.start(today(), 0, 0, 0);
    assert!(!timer.is_resting());

    assert_eq!(format_countdown(125), "02:05");
    assert_eq!(format_countdown(0), "00:00");
}

#[test]
fn test_rest_follows_moved_exercise() {
    let mut log = WorkoutLog::default();
    let mut t = push_day();
    t.add_exercise("Dips");
    log.apply_template(&t, today(), today(), CarryForward::default())
        .unwrap();
    log.log_set(today(), today(), 0, 1).unwrap();

    log.move_exercise(today(), today(), 0, 2).unwrap();
    let names: Vec<&str> = log.day(today()).iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["Overhead Press", "Dips", "Bench Press"]);
    assert!(log.rest.is_resting_on(today(), 2, 1));
}

#[test]
fn test_logging_completes_the_day() {
    let mut log = log_with_today();
    for ex in 0..2 {
        for set in 0..3 {
            log.log_set(today(), today(), ex, set).unwrap();
        }
    }
    assert!(log.is_completed(today()));

    log.log_set(today(), today(), 1, 2).unwrap();
    assert!(!log.is_completed(today()));
}

#[test]
fn test_remove_set_keeps_at_least_one() {
    let mut log = log_with_today();
    log.log_set(today(), today(), 0, 0).unwrap();
    log.log_set(today(), today(), 0, 2).unwrap();

    assert_eq!(log.remove_set(today(), today(), 0, 1).unwrap(), 2);
    let entry = &log.day(today())[0];
    assert_eq!(entry.logged_sets, vec![true, true]);

    assert_eq!(log.remove_set(today(), today(), 0, 0).unwrap(), 1);
    let before: ExerciseEntry = log.day(today())[0].clone();
    assert_eq!(log.remove_set(today(), today(), 0, 0).unwrap(), 1);
    assert_eq!(log.day(today())[0], before);

    assert_eq!(
        log.remove_set(today(), today(), 0, 4),
        Err(DayError::SetOutOfRange { index: 4 })
    );
}

#[test]
fn test_remove_set_moves_or_ends_rest() {
    let mut log = log_with_today();
    log.log_set(today(), today(), 0, 2).unwrap();

    // Another exercise's sets leave the rest alone
    log.remove_set(today(), today(), 1, 0).unwrap();
    assert!(log.rest.is_resting_on(today(), 0, 2));

    log.remove_set(today(), today(), 0, 0).unwrap();
    assert!(log.rest.is_resting_on(today(), 0, 1));
    assert_eq!(log.rest.remaining_secs(), Some(90));

    log.remove_set(today(), today(), 0, 1).unwrap();
    assert!(!log.rest.is_resting());
}

#[test]
fn test_add_set_appends_unlogged_flag() {
    let mut log = log_with_today();
    log.log_set(today(), today(), 0, 2).unwrap();
    assert_eq!(log.add_set(today(), today(), 0).unwrap(), 4);
    assert_eq!(log.day(today())[0].logged_sets, vec![false, false, true, false]);
}

#[test]
fn test_past_days_are_locked() {
    let yesterday = date(2024, 5, 14);
    let mut log = WorkoutLog::default();
    assert_eq!(
        log.apply_template(&push_day(), yesterday, today(), CarryForward::default())
            .map(|_| ()),
        Err(DayError::Locked(yesterday))
    );
    assert_eq!(
        log.add_exercise(yesterday, today(), "Dips", CarryForward::default()),
        Err(DayError::Locked(yesterday))
    );
    assert!(!log.is_editable(yesterday, today()));
}

#[test]
fn test_future_days_plan_but_do_not_log() {
    let tomorrow = date(2024, 5, 16);
    let mut log = WorkoutLog::default();
    log.apply_template(&push_day(), tomorrow, today(), CarryForward::default())
        .unwrap();
    log.set_reps(tomorrow, today(), 0, 5).unwrap();
    assert_eq!(log.day(tomorrow)[0].reps, 5);

    assert_eq!(log.log_set(tomorrow, today(), 0, 0), Err(DayError::NotToday(tomorrow)));
    assert_eq!(log.finish(tomorrow, today()), Err(DayError::NotToday(tomorrow)));
}

#[test]
fn test_finished_day_rejects_edits() {
    let mut log = log_with_today();
    log.finish(today(), today()).unwrap();
    assert!(log.is_finished(today()));
    assert!(!log.is_editable(today(), today()));

    assert_eq!(log.finish(today(), today()), Err(DayError::Finished(today())));
    assert_eq!(log.add_set(today(), today(), 0), Err(DayError::Finished(today())));
    assert_eq!(
        log.apply_template(&push_day(), today(), today(), CarryForward::default())
            .map(|_| ()),
        Err(DayError::Finished(today()))
    );
}

#[test]
fn test_finish_creates_empty_day() {
    let mut log = WorkoutLog::default();
    log.finish(today(), today()).unwrap();
    assert!(log.workouts().contains_key(&today()));
    assert!(log.day(today()).is_empty());
    assert!(!log.is_completed(today()));
}

#[test]
fn test_add_exercise_carries_weight_and_rest() {
    let mut history = DailyWorkouts::new();
    let mut dips = ExerciseEntry::new("Dips", 25.0, 45);
    dips.logged_sets = vec![true];
    history.insert(date(2024, 5, 10), vec![dips]);
    let mut log = WorkoutLog::new(history, BTreeSet::new());

    let index = log
        .add_exercise(today(), today(), "Dips", CarryForward::default())
        .unwrap();
    assert_eq!(index, 0);
    let added = &log.day(today())[0];
    assert_eq!(added.weight, 25.0);
    assert_eq!(added.rest_time, 60);

    log.apply_template(&push_day(), today(), today(), CarryForward::default())
        .unwrap();
    let index = log
        .add_exercise(today(), today(), "  Dips ", CarryForward::default())
        .unwrap();
    assert_eq!(index, 2);
    assert_eq!(log.day(today())[2].name, "Dips");
    assert_eq!(log.day(today())[2].rest_time, 90);

    assert_eq!(
        log.add_exercise(today(), today(), "   ", CarryForward::default()),
        Err(DayError::Invalid(ValidationError::EmptyField("exercise name")))
    );
}

#[test]
fn test_weight_is_stored_in_pounds() {
    let mut log = log_with_today();
    let stored = log
        .set_weight(today(), today(), 0, 100.0, WeightUnit::Kgs)
        .unwrap();
    assert!((stored - 220.462).abs() < 1e-9);
    assert!((WeightUnit::Kgs.from_canonical(log.day(today())[0].weight) - 100.0).abs() < 1e-3);

    assert!(matches!(
        log.set_weight(today(), today(), 0, -5.0, WeightUnit::Lbs),
        Err(DayError::Invalid(ValidationError::InvalidNumber { .. }))
    ));
    assert_eq!(
        log.set_reps(today(), today(), 0, 0),
        Err(DayError::Invalid(ValidationError::NonPositive("reps")))
    );
}

#[test]
fn test_index_errors() {
    let mut log = log_with_today();
    let other = date(2024, 5, 20);
    assert_eq!(
        log.set_color(today(), today(), 7, Some(StandardColor::Red)),
        Err(DayError::ExerciseOutOfRange { date: today(), index: 7 })
    );
    assert_eq!(
        log.set_color(other, today(), 0, None),
        Err(DayError::NoWorkout(other))
    );
    log.set_color(today(), today(), 1, Some(StandardColor::Cyan))
        .unwrap();
    assert_eq!(log.day(today())[1].color, Some(StandardColor::Cyan));
}
