use anyhow::{bail, Context, Result};
// Use anyhow::Result as standard Result for service layer
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use std::path::{Path, PathBuf};

// --- Declare modules ---
pub mod auth;
mod config;
pub mod day;
pub mod db;
pub mod generator;
pub mod rest;
pub mod session;
pub mod template;
pub mod units;
pub mod validation;
pub mod workout;

// --- Expose public types ---
pub use auth::{
    AuthProvider, Credentials, Error as AuthError, LocalAuth, UserId,
};
pub use config::{
    get_config_path as get_config_path_util, load as load_config_util, parse_color,
    save as save_config_util, CarryForward, Config, Error as ConfigError, GeneratorConfig,
    StandardColor, Theme,
};
pub use day::{DayStatus, Error as DayError, SetToggle, WorkoutLog};
pub use db::{
    get_db_path as get_db_path_util, Error as StoreError, KeyValueStore, MemoryStore,
    SqliteStore,
};
pub use generator::{
    Error as GenerationError, GenerateRequest, GeneratedTemplate, Goal, HttpTemplateGenerator,
    Level, TemplateGenerator,
};
pub use rest::{Clock, FixedClock, RestTimer, SystemClock};
pub use session::Session;
pub use template::{Template, TemplateBook, TemplateExercise};
pub use units::WeightUnit;
pub use validation::Error as ValidationError;
pub use workout::{DailyWorkouts, ExerciseEntry};

/// Changes to apply to an existing template. `None` leaves a field as it is.
#[derive(Default, Debug, Clone)]
pub struct EditTemplateParams {
    pub new_name: Option<String>,
    pub new_exercises: Option<Vec<String>>,
    pub toggle_days: Vec<Weekday>,
    pub new_rest_time: Option<u32>,
}

/// A day as the front end shows it.
#[derive(Debug, Clone, PartialEq)]
pub struct DayView {
    pub date: NaiveDate,
    pub status: DayStatus,
    pub entries: Vec<ExerciseEntry>,
    pub finished: bool,
    pub completed: bool,
    pub editable: bool,
    pub unit: WeightUnit,
}

/// One cell of the calendar strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub has_workout: bool,
    pub completed: bool,
    pub finished: bool,
    pub is_today: bool,
}

/// One set row of the history export, with the weight in the user's unit.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRow {
    pub date: NaiveDate,
    pub exercise: String,
    pub set_number: u32,
    pub reps: u32,
    pub weight: f64,
    pub logged: bool,
}

pub struct AppService {
    pub config: Config,
    pub store: Box<dyn KeyValueStore>,
    pub auth: Box<dyn AuthProvider>,
    pub clock: Box<dyn Clock>,
    pub db_path: PathBuf,
    pub config_path: PathBuf,
}

impl AppService {
    /// Initializes the application service.
    /// # Errors
    /// Returns `anyhow::Error` if config/db path determination, loading, or initialization fails.
    pub fn initialize() -> Result<Self> {
        let config_path =
            config::get_config_path().context("Failed to determine configuration file path")?;
        let config = config::load(&config_path)
            .with_context(|| format!("Failed to load config from {config_path:?}"))?;

        let db_path = db::get_db_path().context("Failed to determine database path")?;
        let store = SqliteStore::open(&db_path)
            .with_context(|| format!("Failed to open database at {db_path:?}"))?;
        let auth_store = SqliteStore::open(&db_path)
            .with_context(|| format!("Failed to open account store at {db_path:?}"))?;
        let auth = LocalAuth::new(
            auth_store,
            Box::new(SystemClock),
            Duration::minutes(config.recent_login_window_mins),
        );

        tracing::debug!("Using config {:?} and database {:?}", config_path, db_path);

        Ok(Self {
            config,
            store: Box::new(store),
            auth: Box::new(auth),
            clock: Box::new(SystemClock),
            db_path,
            config_path,
        })
    }

    pub fn get_config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn get_db_path(&self) -> &Path {
        &self.db_path
    }

    /// Saves the current configuration state.
    /// # Errors
    /// Returns `ConfigError` if saving fails.
    pub fn save_config(&self) -> Result<(), ConfigError> {
        config::save(&self.config_path, &self.config)
    }

    /// Sets the header color of tables.
    /// # Errors
    /// `ConfigError::InvalidColor` for unknown names, or a save failure.
    pub fn set_header_color(&mut self, color: &str) -> Result<(), ConfigError> {
        let parsed = parse_color(color)?;
        self.config.theme.header_color = format!("{parsed:?}");
        self.save_config()
    }

    /// Chooses which past entries may supply carried-forward weights.
    /// # Errors
    /// Returns `ConfigError` if saving fails.
    pub fn set_carry_forward(&mut self, policy: CarryForward) -> Result<(), ConfigError> {
        self.config.carry_forward = policy;
        self.save_config()
    }

    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    // --- Accounts ---

    /// Creates an account, signs in and initializes the user's empty data.
    /// # Errors
    /// `ValidationError` for bad input, `AuthError::EmailInUse`, or a storage failure.
    pub fn sign_up(&mut self, email: &str, password: &str, confirm: &str) -> Result<UserId> {
        validation::check_sign_up(email, password, confirm)?;
        let uid = self.auth.sign_up(&Credentials::new(email, password))?;
        Session::empty(uid.clone())
            .save(self.store.as_mut())
            .context("Failed to initialize data for the new account")?;
        Ok(uid)
    }

    /// # Errors
    /// `AuthError::InvalidCredentials` or a storage failure.
    pub fn login(&mut self, email: &str, password: &str) -> Result<UserId> {
        Ok(self.auth.login(&Credentials::new(email, password))?)
    }

    /// # Errors
    /// Storage failure while forgetting the session.
    pub fn logout(&mut self) -> Result<()> {
        Ok(self.auth.logout()?)
    }

    #[must_use]
    pub fn current_user(&self) -> Option<UserId> {
        self.auth.current_user()
    }

    /// # Errors
    /// `AuthError::NotLoggedIn` when nobody is signed in.
    pub fn require_user(&self) -> Result<UserId, AuthError> {
        self.auth.current_user().ok_or(AuthError::NotLoggedIn)
    }

    /// Deletes the signed-in account and every key stored for it.
    /// # Errors
    /// `AuthError::RequiresRecentLogin`, `AuthError::NotLoggedIn`, or a storage failure.
    pub fn delete_account(&mut self) -> Result<UserId> {
        let uid = self.auth.delete_account()?;
        self.store
            .remove_many(&db::keys::all(uid.as_str()))
            .with_context(|| format!("Account deleted but data for {uid} could not be removed"))?;
        Ok(uid)
    }

    // --- Session ---

    /// Loads everything stored for the signed-in user.
    /// # Errors
    /// `AuthError::NotLoggedIn`, or a storage failure.
    pub fn open_session(&self) -> Result<Session> {
        let uid = self.require_user()?;
        Session::load(self.store.as_ref(), uid).context("Failed to load workout data")
    }

    /// # Errors
    /// Storage failure; nothing is written in that case.
    pub fn save_session(&mut self, session: &Session) -> Result<()> {
        session
            .save(self.store.as_mut())
            .context("Failed to save workout data")
    }

    /// Loads the session, applies `change` and stores the result if it succeeded.
    fn update_session<T, E>(
        &mut self,
        change: impl FnOnce(&mut Session, NaiveDate, &Config) -> Result<T, E>,
    ) -> Result<T>
    where
        E: Into<anyhow::Error>,
    {
        let mut session = self.open_session()?;
        let today = self.today();
        let out = change(&mut session, today, &self.config).map_err(Into::into)?;
        self.save_session(&session)?;
        Ok(out)
    }

    // --- Units ---

    /// # Errors
    /// `AuthError::NotLoggedIn`, or a storage failure.
    pub fn get_unit(&self) -> Result<WeightUnit> {
        Ok(self.open_session()?.unit)
    }

    /// # Errors
    /// `AuthError::NotLoggedIn`, or a storage failure.
    pub fn set_unit(&mut self, unit: WeightUnit) -> Result<()> {
        let uid = self.require_user()?;
        self.store
            .set(&db::keys::unit(uid.as_str()), &unit.to_string())
            .context("Failed to save unit preference")
    }

    /// Switches between pounds and kilograms, returning the new unit.
    /// # Errors
    /// `AuthError::NotLoggedIn`, or a storage failure.
    pub fn toggle_unit(&mut self) -> Result<WeightUnit> {
        let unit = self.get_unit()?.toggled();
        self.set_unit(unit)?;
        Ok(unit)
    }

    // --- Templates ---

    /// Templates sorted by name.
    /// # Errors
    /// `AuthError::NotLoggedIn`, or a storage failure.
    pub fn list_templates(&self) -> Result<Vec<Template>> {
        let mut templates: Vec<Template> = self.open_session()?.templates.into_values().collect();
        templates.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Ok(templates)
    }

    /// Looks a template up by id or name.
    /// # Errors
    /// `AuthError::NotLoggedIn`, or a storage failure.
    pub fn get_template(&self, identifier: &str) -> Result<Option<Template>> {
        let session = self.open_session()?;
        Ok(template::find_template(&session.templates, identifier).cloned())
    }

    /// Templates assigned to the weekday of `date`.
    /// # Errors
    /// `AuthError::NotLoggedIn`, or a storage failure.
    pub fn templates_for_date(&self, date: NaiveDate) -> Result<Vec<Template>> {
        let session = self.open_session()?;
        Ok(template::templates_for_weekday(&session.templates, date.weekday())
            .into_iter()
            .cloned()
            .collect())
    }

    /// Creates a template. `rest_time` defaults to the configured rest.
    /// # Errors
    /// `ValidationError` for an unusable template, `AuthError::NotLoggedIn`, or a storage failure.
    pub fn create_template(
        &mut self,
        name: &str,
        exercises: &[String],
        assigned_days: &[Weekday],
        rest_time: Option<u32>,
    ) -> Result<String> {
        let now_millis = self.clock.now().timestamp_millis();
        let rest_time = rest_time.unwrap_or(self.config.default_rest_secs);
        self.update_session(|session, _, _| {
            let mut template = Template {
                id: template::next_template_id(&session.templates, now_millis),
                name: name.trim().to_string(),
                exercises: exercises
                    .iter()
                    .map(|e| TemplateExercise::new(e.trim()))
                    .collect(),
                assigned_days: Vec::new(),
                rest_time,
            };
            for day in assigned_days {
                if !template.is_assigned_to(*day) {
                    template.toggle_day(*day);
                }
            }
            template.validate()?;
            let id = template.id.clone();
            tracing::info!("Created template '{}' ({})", template.name, id);
            session.templates.insert(id.clone(), template);
            Ok::<_, anyhow::Error>(id)
        })
    }

    /// Edits a template found by id or name.
    /// # Errors
    /// Unknown template, `ValidationError` if the result is unusable, or a storage failure.
    pub fn edit_template(&mut self, identifier: &str, params: EditTemplateParams) -> Result<Template> {
        self.update_session(|session, _, _| {
            let id = template::find_template(&session.templates, identifier)
                .map(|t| t.id.clone())
                .with_context(|| format!("Template '{identifier}' not found"))?;
            let mut edited = session.templates[&id].clone();
            if let Some(name) = params.new_name {
                edited.name = name.trim().to_string();
            }
            if let Some(exercises) = params.new_exercises {
                edited.exercises = exercises
                    .iter()
                    .map(|e| TemplateExercise::new(e.trim()))
                    .collect();
            }
            for day in params.toggle_days {
                edited.toggle_day(day);
            }
            if let Some(rest) = params.new_rest_time {
                edited.rest_time = rest;
            }
            edited.validate()?;
            session.templates.insert(id, edited.clone());
            Ok::<_, anyhow::Error>(edited)
        })
    }

    /// Appends an exercise to a template.
    /// # Errors
    /// Unknown template, blank name, or a storage failure.
    pub fn add_template_exercise(&mut self, identifier: &str, exercise: &str) -> Result<Template> {
        self.modify_template(identifier, |t| {
            if exercise.trim().is_empty() {
                bail!(ValidationError::EmptyField("exercise name"));
            }
            t.add_exercise(exercise.trim());
            Ok(())
        })
    }

    /// Removes the exercise at `index` (0-based) from a template.
    /// # Errors
    /// Unknown template, index out of range, removing the last exercise, or a storage failure.
    pub fn remove_template_exercise(&mut self, identifier: &str, index: usize) -> Result<Template> {
        self.modify_template(identifier, |t| {
            t.remove_exercise(index)
                .with_context(|| format!("No exercise #{} in template '{}'", index + 1, t.name))?;
            Ok(())
        })
    }

    /// Moves a template exercise from `from` to `to` (0-based).
    /// # Errors
    /// Unknown template, index out of range, or a storage failure.
    pub fn move_template_exercise(
        &mut self,
        identifier: &str,
        from: usize,
        to: usize,
    ) -> Result<Template> {
        self.modify_template(identifier, |t| {
            if !t.move_exercise(from, to) {
                bail!("Exercise positions out of range for template '{}'", t.name);
            }
            Ok(())
        })
    }

    fn modify_template(
        &mut self,
        identifier: &str,
        change: impl FnOnce(&mut Template) -> Result<()>,
    ) -> Result<Template> {
        self.update_session(|session, _, _| {
            let id = template::find_template(&session.templates, identifier)
                .map(|t| t.id.clone())
                .with_context(|| format!("Template '{identifier}' not found"))?;
            let mut edited = session.templates[&id].clone();
            change(&mut edited)?;
            edited.validate()?;
            session.templates.insert(id, edited.clone());
            Ok::<_, anyhow::Error>(edited)
        })
    }

    /// Deletes a template. Days it was applied to keep their entries.
    /// # Errors
    /// Unknown template, or a storage failure.
    pub fn delete_template(&mut self, identifier: &str) -> Result<Template> {
        self.update_session(|session, _, _| {
            let id = template::find_template(&session.templates, identifier)
                .map(|t| t.id.clone())
                .with_context(|| format!("Template '{identifier}' not found"))?;
            let removed = session
                .templates
                .remove(&id)
                .with_context(|| format!("Template '{identifier}' not found"))?;
            tracing::info!("Deleted template '{}' ({})", removed.name, id);
            Ok::<_, anyhow::Error>(removed)
        })
    }

    /// Asks the generator for a template and stores it with no assigned days.
    /// # Errors
    /// `ValidationError` for the request, `GenerationError` from the generator,
    /// `AuthError::NotLoggedIn`, or a storage failure.
    pub async fn generate_template(
        &mut self,
        generator: &dyn TemplateGenerator,
        request: &GenerateRequest,
    ) -> Result<Template> {
        request.validate()?;
        self.require_user()?;
        let generated = generator
            .generate(request)
            .await
            .context("Template generation failed. Please try again.")?;
        generated
            .validate()
            .context("The generated template was not usable. Please try again.")?;
        let now_millis = self.clock.now().timestamp_millis();
        self.update_session(|session, _, _| {
            let id = template::next_template_id(&session.templates, now_millis);
            let template = generated.into_template(id.clone());
            session.templates.insert(id, template.clone());
            Ok::<_, anyhow::Error>(template)
        })
    }

    // --- Daily workouts ---

    /// The entries and status of one day.
    /// # Errors
    /// `AuthError::NotLoggedIn`, or a storage failure.
    pub fn day(&self, date: NaiveDate) -> Result<DayView> {
        let session = self.open_session()?;
        Ok(self.view_of(&session, date))
    }

    fn view_of(&self, session: &Session, date: NaiveDate) -> DayView {
        let today = self.today();
        DayView {
            date,
            status: DayStatus::of(date, today),
            entries: session.log.day(date).to_vec(),
            finished: session.log.is_finished(date),
            completed: session.log.is_completed(date),
            editable: session.log.is_editable(date, today),
            unit: session.unit,
        }
    }

    /// `days` consecutive calendar cells starting at `start`.
    /// # Errors
    /// `AuthError::NotLoggedIn`, or a storage failure.
    pub fn calendar(&self, start: NaiveDate, days: u32) -> Result<Vec<CalendarDay>> {
        let session = self.open_session()?;
        let today = self.today();
        Ok(start
            .iter_days()
            .take(days as usize)
            .map(|date| CalendarDay {
                date,
                has_workout: !session.log.day(date).is_empty(),
                completed: session.log.is_completed(date),
                finished: session.log.is_finished(date),
                is_today: date == today,
            })
            .collect())
    }

    /// Dates where every set of every exercise is logged.
    /// # Errors
    /// `AuthError::NotLoggedIn`, or a storage failure.
    pub fn completed_dates(&self) -> Result<Vec<NaiveDate>> {
        Ok(self.open_session()?.log.completed().iter().copied().collect())
    }

    /// Fills `date` from a template, carrying weights forward from earlier days.
    /// # Errors
    /// Unknown template, `DayError` guards, or a storage failure.
    pub fn apply_template(&mut self, identifier: &str, date: NaiveDate) -> Result<DayView> {
        let mut session = self.open_session()?;
        let template = template::find_template(&session.templates, identifier)
            .cloned()
            .with_context(|| format!("Template '{identifier}' not found"))?;
        let today = self.today();
        session
            .log
            .apply_template(&template, date, today, self.config.carry_forward)?;
        self.save_session(&session)?;
        tracing::info!("Applied template '{}' to {}", template.name, date);
        Ok(self.view_of(&session, date))
    }

    /// Appends one exercise to a day. Returns its 0-based index.
    /// # Errors
    /// `DayError` guards, blank name, or a storage failure.
    pub fn add_exercise(&mut self, date: NaiveDate, name: &str) -> Result<usize> {
        self.update_session(|s, today, config| {
            s.log.add_exercise(date, today, name, config.carry_forward)
        })
    }

    /// Toggles a set on today's workout.
    /// # Errors
    /// `DayError::NotToday`, index errors, or a storage failure.
    pub fn log_set(
        &mut self,
        date: NaiveDate,
        exercise_index: usize,
        set_index: usize,
    ) -> Result<SetToggle> {
        self.update_session(|s, today, _| s.log.log_set(date, today, exercise_index, set_index))
    }

    /// # Errors
    /// `DayError` guards, or a storage failure.
    pub fn add_set(&mut self, date: NaiveDate, exercise_index: usize) -> Result<u32> {
        self.update_session(|s, today, _| s.log.add_set(date, today, exercise_index))
    }

    /// # Errors
    /// `DayError` guards, or a storage failure.
    pub fn remove_set(
        &mut self,
        date: NaiveDate,
        exercise_index: usize,
        set_index: usize,
    ) -> Result<u32> {
        self.update_session(|s, today, _| s.log.remove_set(date, today, exercise_index, set_index))
    }

    /// Sets the weight, given in the user's unit. Returns the stored pounds.
    /// # Errors
    /// `DayError` guards, invalid weight, or a storage failure.
    pub fn set_weight(&mut self, date: NaiveDate, exercise_index: usize, value: f64) -> Result<f64> {
        self.update_session(|s, today, _| {
            let unit = s.unit;
            s.log.set_weight(date, today, exercise_index, value, unit)
        })
    }

    /// # Errors
    /// `DayError` guards, zero reps, or a storage failure.
    pub fn set_reps(&mut self, date: NaiveDate, exercise_index: usize, reps: u32) -> Result<()> {
        self.update_session(|s, today, _| s.log.set_reps(date, today, exercise_index, reps))
    }

    /// # Errors
    /// `DayError` guards, or a storage failure.
    pub fn set_color(
        &mut self,
        date: NaiveDate,
        exercise_index: usize,
        color: Option<StandardColor>,
    ) -> Result<()> {
        self.update_session(|s, today, _| s.log.set_color(date, today, exercise_index, color))
    }

    /// # Errors
    /// `DayError` guards, or a storage failure.
    pub fn move_exercise(&mut self, date: NaiveDate, from: usize, to: usize) -> Result<()> {
        self.update_session(|s, today, _| s.log.move_exercise(date, today, from, to))
    }

    /// Marks today's workout as finished.
    /// # Errors
    /// `DayError::NotToday`, `DayError::Finished`, or a storage failure.
    pub fn finish_workout(&mut self, date: NaiveDate) -> Result<DayView> {
        let mut session = self.open_session()?;
        session.log.finish(date, self.today())?;
        self.save_session(&session)?;
        tracing::info!("Finished workout for {}", date);
        Ok(self.view_of(&session, date))
    }

    /// Every set of every day in `[start, end]`, oldest first, weights in the user's unit.
    /// # Errors
    /// `AuthError::NotLoggedIn`, or a storage failure.
    pub fn history(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<HistoryRow>> {
        let session = self.open_session()?;
        let unit = session.unit;
        let rows = session
            .log
            .workouts()
            .iter()
            .filter(|(date, _)| start.map_or(true, |s| **date >= s))
            .filter(|(date, _)| end.map_or(true, |e| **date <= e))
            .flat_map(|(date, entries)| {
                entries.iter().flat_map(move |entry| {
                    (0..entry.sets).map(move |set| HistoryRow {
                        date: *date,
                        exercise: entry.name.clone(),
                        set_number: set + 1,
                        reps: entry.reps,
                        weight: unit.from_canonical(entry.weight),
                        logged: entry.is_set_logged(set as usize),
                    })
                })
            })
            .collect();
        Ok(rows)
    }
}
