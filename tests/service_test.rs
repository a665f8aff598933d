use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc, Weekday};
use revup_lib::db::keys;
use revup_lib::{
    AppService, AuthError, AuthProvider, CarryForward, Clock, Config, Credentials, DayError,
    DayStatus, EditTemplateParams, KeyValueStore, LocalAuth, MemoryStore, SetToggle,
    ValidationError, WeightUnit,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tempfile::TempDir;

/// Clock shared by the service and the auth provider so tests can move time forward.
#[derive(Clone)]
struct TestClock(Rc<Cell<DateTime<Utc>>>);

impl TestClock {
    fn starting(now: DateTime<Utc>) -> Self {
        Self(Rc::new(Cell::new(now)))
    }

    fn advance(&self, by: Duration) {
        self.0.set(self.0.get() + by);
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        self.0.get()
    }

    fn today(&self) -> NaiveDate {
        self.0.get().date_naive()
    }
}

struct TestContext {
    service: AppService,
    clock: TestClock,
    _config_dir: TempDir,
}

// Helper function to create a test service backed by in-memory stores
fn create_test_service() -> Result<TestContext> {
    let config_dir = tempfile::tempdir()?;
    let clock = TestClock::starting(Utc.with_ymd_and_hms(2024, 5, 15, 9, 0, 0).unwrap());
    let config = Config::default();
    let auth = LocalAuth::new(
        MemoryStore::new(),
        Box::new(clock.clone()),
        Duration::minutes(config.recent_login_window_mins),
    );

    let service = AppService {
        config,
        store: Box::new(MemoryStore::new()),
        auth: Box::new(auth),
        clock: Box::new(clock.clone()),
        db_path: ":memory:".into(),
        config_path: config_dir.path().join("config.toml"),
    };
    Ok(TestContext {
        service,
        clock,
        _config_dir: config_dir,
    })
}

fn signed_in_service() -> Result<TestContext> {
    let mut ctx = create_test_service()?;
    ctx.service.sign_up("lifter@example.com", "hunter22", "hunter22")?;
    Ok(ctx)
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn test_sign_up_validation() -> Result<()> {
    let mut ctx = create_test_service()?;
    let service = &mut ctx.service;

    let err = service
        .sign_up("lifter@example.com", "hunter22", "hunter23")
        .unwrap_err();
    assert_eq!(
        err.downcast_ref::<ValidationError>(),
        Some(&ValidationError::PasswordMismatch)
    );

    let err = service.sign_up("lifter@example.com", "abc", "abc").unwrap_err();
    assert_eq!(
        err.downcast_ref::<ValidationError>(),
        Some(&ValidationError::PasswordTooShort)
    );

    let err = service.sign_up("not-an-email", "hunter22", "hunter22").unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ValidationError>(),
        Some(ValidationError::InvalidEmail(_))
    ));
    assert!(service.current_user().is_none());
    Ok(())
}

#[test]
fn test_sign_up_initializes_user_data() -> Result<()> {
    let mut ctx = create_test_service()?;
    let uid = ctx
        .service
        .sign_up("Lifter@Example.com", "hunter22", "hunter22")?;

    assert_eq!(ctx.service.current_user(), Some(uid.clone()));
    let store = &ctx.service.store;
    assert_eq!(store.get(&keys::workouts(uid.as_str()))?.as_deref(), Some("{}"));
    assert_eq!(store.get(&keys::templates(uid.as_str()))?.as_deref(), Some("{}"));
    assert_eq!(store.get(&keys::finished(uid.as_str()))?.as_deref(), Some("[]"));
    assert_eq!(store.get(&keys::unit(uid.as_str()))?.as_deref(), Some("kgs"));
    assert!(ctx.service.list_templates()?.is_empty());
    Ok(())
}

#[test]
fn test_duplicate_email_and_login() -> Result<()> {
    let mut ctx = signed_in_service()?;
    let service = &mut ctx.service;
    let uid = service.require_user()?;
    service.logout()?;
    assert!(service.current_user().is_none());

    let err = service
        .sign_up(" LIFTER@example.com ", "other-pass", "other-pass")
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<AuthError>(),
        Some(AuthError::EmailInUse(_))
    ));

    let err = service.login("lifter@example.com", "wrong-pass").unwrap_err();
    assert!(matches!(
        err.downcast_ref::<AuthError>(),
        Some(AuthError::InvalidCredentials)
    ));

    assert_eq!(service.login("lifter@example.com", "hunter22")?, uid);
    Ok(())
}

#[test]
fn test_operations_require_login() -> Result<()> {
    let ctx = create_test_service()?;
    let err = ctx.service.list_templates().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<AuthError>(),
        Some(AuthError::NotLoggedIn)
    ));
    Ok(())
}

#[test]
fn test_delete_account_requires_recent_login() -> Result<()> {
    let mut ctx = signed_in_service()?;
    let uid = ctx.service.require_user()?;
    ctx.service
        .create_template("Legs", &["Squat".to_string()], &[], None)?;

    ctx.clock.advance(Duration::minutes(30));
    let err = ctx.service.delete_account().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<AuthError>(),
        Some(AuthError::RequiresRecentLogin)
    ));
    assert!(ctx.service.store.get(&keys::templates(uid.as_str()))?.is_some());

    ctx.service.login("lifter@example.com", "hunter22")?;
    assert_eq!(ctx.service.delete_account()?, uid);
    assert!(ctx.service.current_user().is_none());
    for key in keys::all(uid.as_str()) {
        assert!(ctx.service.store.get(&key)?.is_none(), "{key} left behind");
    }

    let err = ctx
        .service
        .login("lifter@example.com", "hunter22")
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<AuthError>(),
        Some(AuthError::InvalidCredentials)
    ));
    Ok(())
}

#[test]
fn test_auth_state_listeners() -> Result<()> {
    let clock = TestClock::starting(Utc.with_ymd_and_hms(2024, 5, 15, 9, 0, 0).unwrap());
    let mut auth = LocalAuth::new(MemoryStore::new(), Box::new(clock), Duration::minutes(5));
    let seen: Rc<RefCell<Vec<Option<String>>>> = Rc::default();
    let sink = Rc::clone(&seen);
    auth.on_auth_state_change(Box::new(move |user| {
        sink.borrow_mut().push(user.map(|u| u.to_string()));
    }));

    let uid = auth.sign_up(&Credentials::new("a@b.io", "secret1"))?;
    auth.logout()?;
    auth.login(&Credentials::new("a@b.io", "secret1"))?;

    assert_eq!(
        *seen.borrow(),
        vec![Some(uid.to_string()), None, Some(uid.to_string())]
    );
    Ok(())
}

#[test]
fn test_template_management() -> Result<()> {
    let mut ctx = signed_in_service()?;
    let service = &mut ctx.service;

    let push_id = service.create_template(
        " Push Day ",
        &["Bench Press".to_string(), "Dips".to_string()],
        &[Weekday::Thu, Weekday::Mon],
        Some(90),
    )?;
    let pull_id = service.create_template("Pull Day", &["Row".to_string()], &[], None)?;
    assert_ne!(push_id, pull_id);

    let push = service.get_template("push day")?.unwrap();
    assert_eq!(push.id, push_id);
    assert_eq!(push.name, "Push Day");
    assert_eq!(push.assigned_days, vec![Weekday::Mon, Weekday::Thu]);
    let pull = service.get_template(&pull_id)?.unwrap();
    assert_eq!(pull.rest_time, 60);

    let names: Vec<String> = service.list_templates()?.into_iter().map(|t| t.name).collect();
    assert_eq!(names, vec!["Pull Day", "Push Day"]);

    // 2024-05-16 is a Thursday
    let thursday = service.templates_for_date(day(2024, 5, 16))?;
    assert_eq!(thursday.len(), 1);
    assert_eq!(thursday[0].id, push_id);

    let edited = service.edit_template(
        &push_id,
        EditTemplateParams {
            toggle_days: vec![Weekday::Thu, Weekday::Sun],
            new_rest_time: Some(120),
            ..Default::default()
        },
    )?;
    assert_eq!(edited.assigned_days, vec![Weekday::Sun, Weekday::Mon]);
    assert_eq!(edited.rest_time, 120);

    service.add_template_exercise(&push_id, "Overhead Press")?;
    let moved = service.move_template_exercise(&push_id, 2, 0)?;
    let order: Vec<&str> = moved.exercises.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(order, vec!["Overhead Press", "Bench Press", "Dips"]);
    let trimmed = service.remove_template_exercise(&push_id, 2)?;
    assert_eq!(trimmed.exercises.len(), 2);

    // The last exercise cannot go
    assert!(service.remove_template_exercise(&pull_id, 0).is_err());
    assert!(service.remove_template_exercise(&push_id, 9).is_err());

    let err = service
        .create_template("  ", &["Row".to_string()], &[], None)
        .unwrap_err();
    assert_eq!(
        err.downcast_ref::<ValidationError>(),
        Some(&ValidationError::EmptyField("template name"))
    );
    let err = service.create_template("Empty", &[], &[], None).unwrap_err();
    assert_eq!(
        err.downcast_ref::<ValidationError>(),
        Some(&ValidationError::NoExercises)
    );

    let removed = service.delete_template("Pull Day")?;
    assert_eq!(removed.id, pull_id);
    assert!(service.get_template(&pull_id)?.is_none());
    assert!(service.delete_template("Pull Day").is_err());
    Ok(())
}

#[test]
fn test_weights_carry_forward_across_days() -> Result<()> {
    let mut ctx = signed_in_service()?;
    ctx.service.set_unit(WeightUnit::Lbs)?;
    ctx.service.create_template(
        "Upper",
        &["Bench Press".to_string(), "Row".to_string()],
        &[],
        Some(90),
    )?;

    let monday = ctx.service.today();
    let view = ctx.service.apply_template("upper", monday)?;
    assert_eq!(view.status, DayStatus::Today);
    assert_eq!(view.entries.len(), 2);
    assert!(view.entries.iter().all(|e| e.weight == 0.0));

    ctx.service.set_weight(monday, 0, 135.0)?;
    assert_eq!(
        ctx.service.log_set(monday, 0, 0)?,
        SetToggle::Logged { rest_secs: 90 }
    );
    let finished = ctx.service.finish_workout(monday)?;
    assert!(finished.finished);
    assert!(!finished.editable);

    ctx.clock.advance(Duration::days(2));
    let wednesday = ctx.service.today();
    let view = ctx.service.apply_template("Upper", wednesday)?;
    assert_eq!(view.entries[0].name, "Bench Press");
    assert_eq!(view.entries[0].weight, 135.0);
    assert_eq!(view.entries[0].last_weight, 135.0);
    // Row was never recorded
    assert_eq!(view.entries[1].weight, 0.0);

    // The earlier day is locked now
    let err = ctx.service.add_set(monday, 0).unwrap_err();
    assert_eq!(err.downcast_ref::<DayError>(), Some(&DayError::Locked(monday)));
    Ok(())
}

#[test]
fn test_weights_follow_unit_preference() -> Result<()> {
    let mut ctx = signed_in_service()?;
    let today = ctx.service.today();
    assert_eq!(ctx.service.get_unit()?, WeightUnit::Kgs);
    ctx.service.add_exercise(today, "Deadlift")?;

    let stored = ctx.service.set_weight(today, 0, 100.0)?;
    assert!((stored - 220.462).abs() < 1e-9);

    assert_eq!(ctx.service.toggle_unit()?, WeightUnit::Lbs);
    assert_eq!(ctx.service.get_unit()?, WeightUnit::Lbs);
    let rows = ctx.service.history(None, None)?;
    assert_eq!(rows.len(), 3);
    assert!((rows[0].weight - 220.462).abs() < 1e-9);
    assert_eq!(
        rows.iter().map(|r| r.set_number).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    Ok(())
}

#[test]
fn test_day_views_and_calendar() -> Result<()> {
    let mut ctx = signed_in_service()?;
    let today = ctx.service.today();
    let tomorrow = today + Duration::days(1);
    ctx.service
        .create_template("Arms", &["Curl".to_string()], &[], Some(45))?;

    let planned = ctx.service.apply_template("Arms", tomorrow)?;
    assert_eq!(planned.status, DayStatus::Future);
    assert!(planned.editable);
    let err = ctx.service.log_set(tomorrow, 0, 0).unwrap_err();
    assert_eq!(
        err.downcast_ref::<DayError>(),
        Some(&DayError::NotToday(tomorrow))
    );

    ctx.service.apply_template("Arms", today)?;
    ctx.service.remove_set(today, 0, 2)?;
    ctx.service.remove_set(today, 0, 1)?;
    assert_eq!(ctx.service.remove_set(today, 0, 0)?, 1);
    ctx.service.log_set(today, 0, 0)?;
    ctx.service.set_reps(today, 0, 12)?;

    let view = ctx.service.day(today)?;
    assert!(view.completed);
    assert_eq!(view.entries[0].reps, 12);
    assert_eq!(ctx.service.completed_dates()?, vec![today]);

    let cells = ctx.service.calendar(today - Duration::days(1), 3)?;
    assert_eq!(cells.len(), 3);
    assert!(!cells[0].has_workout);
    assert!(cells[1].is_today && cells[1].completed);
    assert!(cells[2].has_workout && !cells[2].completed);

    let empty = ctx.service.day(today + Duration::days(5))?;
    assert!(empty.entries.is_empty());
    assert!(!empty.finished);
    Ok(())
}

#[test]
fn test_config_operations() -> Result<()> {
    let mut ctx = create_test_service()?;
    ctx.service.set_header_color("cyan")?;
    ctx.service.set_carry_forward(CarryForward::AnyCompleted)?;

    let saved = revup_lib::load_config_util(ctx.service.get_config_path())?;
    assert_eq!(saved.theme.header_color, "Cyan");
    assert_eq!(saved.carry_forward, CarryForward::AnyCompleted);

    assert!(ctx.service.set_header_color("ultraviolet").is_err());
    Ok(())
}
