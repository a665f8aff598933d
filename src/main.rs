// src/main.rs
mod cli; // Keep cli module for parsing args

use anyhow::{bail, Context, Result};
use chrono::{Duration, NaiveDate};
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use std::io::{self, stdout, Write};

use revup_lib::rest::format_countdown;
use revup_lib::{
    AppService, CalendarDay, CarryForward, DayStatus, DayView, EditTemplateParams,
    GenerateRequest, Goal, HistoryRow, HttpTemplateGenerator, Level, RestTimer, SetToggle,
    Template, WeightUnit,
};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    // --- Check for completion generation request FIRST ---
    let cli_args = cli::parse_args(); // Parse arguments once
    let export_csv = cli_args.export_csv;

    if let cli::Commands::GenerateCompletion { shell } = cli_args.command {
        let mut cmd = cli::build_cli_command(); // Get the command structure
        let bin_name = cmd.get_name().to_string(); // Get the binary name

        eprintln!("Generating completion script for {shell}..."); // Print to stderr
        clap_complete::generate(shell, &mut cmd, bin_name, &mut stdout()); // Print script to stdout
        return Ok(()); // Exit after generating script
    }

    // Initialize the application service (loads config, opens the store)
    let mut service =
        AppService::initialize().context("Failed to initialize application service")?;
    let header_color = Color::from(service.config.header_color());

    match cli_args.command {
        cli::Commands::GenerateCompletion { .. } => {
            unreachable!("Completion generation should have exited already");
        }

        // --- Account Commands ---
        cli::Commands::Signup {
            email,
            password,
            confirm,
        } => match service.sign_up(&email, &password, &confirm) {
            Ok(uid) => {
                println!("Account created! Signed in as {} (user {uid}).", email.trim());
                println!("Create your first template with 'template create' or 'template generate'.");
            }
            Err(e) => bail!("Signup failed: {}", e),
        },
        cli::Commands::Login { email, password } => match service.login(&email, &password) {
            Ok(_) => {
                println!("Signed in as {}.", email.trim());
                if service.list_templates()?.is_empty() {
                    println!("You have no templates yet. Create one with 'template create'.");
                }
            }
            Err(e) => bail!("Login failed: {}", e),
        },
        cli::Commands::Logout => {
            service.logout()?;
            println!("Signed out.");
        }
        cli::Commands::Whoami => match service.current_user() {
            Some(uid) => println!("Signed in as user {uid}"),
            None => println!("Not signed in."),
        },
        cli::Commands::DeleteAccount { yes } => {
            if !yes {
                bail!("This permanently deletes your account and all workout data. Re-run with --yes to confirm.");
            }
            match service.delete_account() {
                Ok(uid) => println!("Account {uid} and all its data were deleted."),
                Err(e) => bail!("Deletion failed: {}", e),
            }
        }

        // --- Settings ---
        cli::Commands::Unit { unit } => {
            let current = match unit {
                None => service.get_unit()?,
                Some(cli::UnitCli::Toggle) => service.toggle_unit()?,
                Some(cli::UnitCli::Lbs) => {
                    service.set_unit(WeightUnit::Lbs)?;
                    WeightUnit::Lbs
                }
                Some(cli::UnitCli::Kgs) => {
                    service.set_unit(WeightUnit::Kgs)?;
                    WeightUnit::Kgs
                }
            };
            println!("Weights are shown in {current}.");
        }
        cli::Commands::SetHeaderColor { color } => match service.set_header_color(&color) {
            Ok(()) => println!("Header color set to {color}. Config updated."),
            Err(e) => bail!("Error setting header color: {}", e),
        },
        cli::Commands::SetCarryForward { policy } => {
            let policy = match policy {
                cli::CarryForwardCli::AnyRecorded => CarryForward::AnyRecorded,
                cli::CarryForwardCli::AnyCompleted => CarryForward::AnyCompleted,
            };
            service.set_carry_forward(policy)?;
            println!("Carry-forward policy set to {policy:?}. Config updated.");
        }
        cli::Commands::ConfigPath => println!("{}", service.get_config_path().display()),
        cli::Commands::DbPath => println!("{}", service.get_db_path().display()),

        // --- Templates ---
        cli::Commands::Template(command) => {
            run_template_command(&mut service, command, header_color, export_csv).await?;
        }

        // --- Daily Workouts ---
        cli::Commands::Show { date } => {
            let view = service.day(date)?;
            if export_csv {
                print_day_csv(&view)?;
            } else {
                print_day(&view, header_color);
                if view.entries.is_empty() && view.editable {
                    let suggestions = service.templates_for_date(date)?;
                    if !suggestions.is_empty() {
                        let names: Vec<&str> = suggestions.iter().map(|t| t.name.as_str()).collect();
                        println!("Templates for {}: {}", date.format("%A"), names.join(", "));
                    }
                }
            }
        }
        cli::Commands::Calendar { start, days } => {
            let start = start.unwrap_or_else(|| service.today() - Duration::days(3));
            let cells = service.calendar(start, days)?;
            print_calendar(&cells, header_color);
        }
        cli::Commands::Completed => {
            let dates = service.completed_dates()?;
            if dates.is_empty() {
                println!("No completed workouts yet.");
            }
            for date in dates {
                println!("{}", date.format("%Y-%m-%d (%a)"));
            }
        }
        cli::Commands::Apply { template, date } => match service.apply_template(&template, date) {
            Ok(view) => print_day(&view, header_color),
            Err(e) => bail!("Error applying template: {}", e),
        },
        cli::Commands::AddExercise { name, date } => match service.add_exercise(date, &name) {
            Ok(index) => println!("Added '{}' as exercise #{}.", name.trim(), index + 1),
            Err(e) => bail!("Error adding exercise: {}", e),
        },
        cli::Commands::Log {
            exercise,
            set,
            no_rest,
        } => {
            let today = service.today();
            match service.log_set(today, exercise - 1, set - 1) {
                Ok(SetToggle::Logged { rest_secs }) => {
                    println!("Set {set} of exercise #{exercise} logged.");
                    if !no_rest {
                        run_rest_countdown(today, exercise - 1, set - 1, rest_secs).await?;
                    }
                }
                Ok(SetToggle::Unlogged) => println!("Set {set} of exercise #{exercise} un-logged."),
                Err(e) => bail!("Error logging set: {}", e),
            }
        }
        cli::Commands::AddSet { exercise, date } => match service.add_set(date, exercise - 1) {
            Ok(sets) => println!("Exercise #{exercise} now has {sets} sets."),
            Err(e) => bail!("Error adding set: {}", e),
        },
        cli::Commands::RemoveSet {
            exercise,
            set,
            date,
        } => match service.remove_set(date, exercise - 1, set - 1) {
            Ok(1) => println!("Exercise #{exercise} has 1 set (an exercise keeps at least one)."),
            Ok(sets) => println!("Exercise #{exercise} now has {sets} sets."),
            Err(e) => bail!("Error removing set: {}", e),
        },
        cli::Commands::SetWeight {
            exercise,
            weight,
            date,
        } => {
            let value = revup_lib::validation::parse_weight(&weight)?;
            let unit = service.get_unit()?;
            match service.set_weight(date, exercise - 1, value) {
                Ok(_) => println!("Exercise #{exercise} weight set to {value:.1} {unit}."),
                Err(e) => bail!("Error setting weight: {}", e),
            }
        }
        cli::Commands::SetReps {
            exercise,
            reps,
            date,
        } => match service.set_reps(date, exercise - 1, reps) {
            Ok(()) => println!("Exercise #{exercise} reps set to {reps}."),
            Err(e) => bail!("Error setting reps: {}", e),
        },
        cli::Commands::SetColor {
            exercise,
            color,
            date,
        } => {
            let parsed = if color.trim().eq_ignore_ascii_case("none") {
                None
            } else {
                Some(revup_lib::parse_color(&color)?)
            };
            match service.set_color(date, exercise - 1, parsed) {
                Ok(()) => println!("Exercise #{exercise} color updated."),
                Err(e) => bail!("Error setting color: {}", e),
            }
        }
        cli::Commands::Move { from, to, date } => {
            match service.move_exercise(date, from - 1, to - 1) {
                Ok(()) => println!("Moved exercise #{from} to position {to}."),
                Err(e) => bail!("Error moving exercise: {}", e),
            }
        }
        cli::Commands::Rest { secs } => {
            let secs = secs.unwrap_or(service.config.default_rest_secs);
            run_rest_countdown(service.today(), 0, 0, secs).await?;
        }
        cli::Commands::Finish => {
            let today = service.today();
            match service.finish_workout(today) {
                Ok(view) => println!(
                    "Workout saved! Your progress for {} has been recorded{}.",
                    today.format("%B %-d"),
                    if view.completed { " (every set logged)" } else { "" }
                ),
                Err(e) => bail!("Error finishing workout: {}", e),
            }
        }
        cli::Commands::History { start, end } => {
            let rows = service.history(start, end)?;
            let unit = service.get_unit()?;
            print_history_csv(&rows, unit)?;
        }
    }

    Ok(())
}

// --- CLI Specific Helper Functions ---

/// Logging goes to stderr; `REVUP_LOG` (or `RUST_LOG`) sets the filter.
fn init_logging() {
    let log_env = std::env::var("REVUP_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "warn".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_new(&log_env)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .compact()
        .with_writer(io::stderr)
        .with_target(false)
        .with_env_filter(env_filter)
        .init();
}

async fn run_template_command(
    service: &mut AppService,
    command: cli::TemplateCommands,
    header_color: Color,
    export_csv: bool,
) -> Result<()> {
    match command {
        cli::TemplateCommands::List => {
            let templates = service.list_templates()?;
            if templates.is_empty() {
                println!("No templates yet. Create one with 'template create'.");
            } else if export_csv {
                print_templates_csv(&templates)?;
            } else {
                print_template_table(&templates, header_color);
            }
        }
        cli::TemplateCommands::Show { template } => match service.get_template(&template)? {
            Some(t) => print_template_detail(&t, header_color),
            None => bail!("Template '{}' not found", template),
        },
        cli::TemplateCommands::Create {
            name,
            exercises,
            days,
            rest,
        } => {
            let exercises = split_list(&exercises);
            let days = parse_days(days.as_deref())?;
            match service.create_template(&name, &exercises, &days, rest) {
                Ok(id) => println!("Created template '{}' (ID: {id}).", name.trim()),
                Err(e) => bail!("Error creating template: {}", e),
            }
        }
        cli::TemplateCommands::Edit {
            template,
            name,
            exercises,
            toggle_days,
            rest,
        } => {
            let params = EditTemplateParams {
                new_name: name,
                new_exercises: exercises.as_deref().map(split_list),
                toggle_days: parse_days(toggle_days.as_deref())?,
                new_rest_time: rest,
            };
            match service.edit_template(&template, params) {
                Ok(t) => print_template_detail(&t, header_color),
                Err(e) => bail!("Error editing template: {}", e),
            }
        }
        cli::TemplateCommands::AddExercise { template, name } => {
            let t = service.add_template_exercise(&template, &name)?;
            print_template_detail(&t, header_color);
        }
        cli::TemplateCommands::RemoveExercise { template, position } => {
            let t = service.remove_template_exercise(&template, position - 1)?;
            print_template_detail(&t, header_color);
        }
        cli::TemplateCommands::MoveExercise { template, from, to } => {
            let t = service.move_template_exercise(&template, from - 1, to - 1)?;
            print_template_detail(&t, header_color);
        }
        cli::TemplateCommands::Delete { template } => match service.delete_template(&template) {
            Ok(t) => println!("Deleted template '{}'.", t.name),
            Err(e) => bail!("Error deleting template: {}", e),
        },
        cli::TemplateCommands::Generate {
            focus,
            level,
            goal,
            notes,
        } => {
            let gen_config = service.config.generator.clone();
            let api_key = std::env::var(&gen_config.api_key_env).map_err(|_| {
                revup_lib::GenerationError::MissingApiKey(gen_config.api_key_env.clone())
            })?;
            let generator = HttpTemplateGenerator::new(
                &gen_config.endpoint,
                gen_config.model,
                api_key,
                std::time::Duration::from_secs(gen_config.timeout_secs),
            )?;
            let request = GenerateRequest {
                focus,
                level: match level {
                    cli::LevelCli::Beginner => Level::Beginner,
                    cli::LevelCli::Intermediate => Level::Intermediate,
                    cli::LevelCli::Advanced => Level::Advanced,
                },
                goal: match goal {
                    cli::GoalCli::Bulking => Goal::Bulking,
                    cli::GoalCli::Cutting => Goal::Cutting,
                    cli::GoalCli::Maintenance => Goal::Maintenance,
                },
                notes,
            };
            println!("Generating...");
            match service.generate_template(&generator, &request).await {
                Ok(t) => {
                    print_template_detail(&t, header_color);
                    println!("Assign days with 'template edit {} --toggle-days Mon,Thu'.", t.id);
                }
                Err(e) => bail!("{:#}", e),
            }
        }
    }
    Ok(())
}

/// Counts the rest down once per second. Ctrl-C skips it.
async fn run_rest_countdown(
    date: NaiveDate,
    exercise_index: usize,
    set_index: usize,
    secs: u32,
) -> Result<()> {
    let mut timer = RestTimer::Idle;
    timer.start(date, exercise_index, set_index, secs);
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(1));
    interval.tick().await; // First tick completes immediately

    while let Some(remaining) = timer.remaining_secs() {
        print!("\rResting... {}  (Ctrl-C to skip) ", format_countdown(remaining));
        stdout().flush()?;
        tokio::select! {
            _ = interval.tick() => {
                if timer.tick() {
                    println!("\rRest over. Time for the next set!        ");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                timer.skip();
                println!("\rRest skipped.                            ");
            }
        }
    }
    Ok(())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_days(raw: Option<&str>) -> Result<Vec<chrono::Weekday>> {
    let Some(list) = raw else {
        return Ok(Vec::new());
    };
    let days = split_list(list)
        .iter()
        .map(|d| revup_lib::template::parse_weekday(d))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(days)
}

fn status_label(view: &DayView) -> &'static str {
    match (view.status, view.finished, view.completed) {
        (_, _, true) => "completed",
        (_, true, false) => "finished",
        (DayStatus::Past, _, _) => "past (read-only)",
        (DayStatus::Today, _, _) => "today",
        (DayStatus::Future, _, _) => "planned",
    }
}

fn logged_marks(entry: &revup_lib::ExerciseEntry) -> String {
    (0..entry.sets as usize)
        .map(|i| if entry.is_set_logged(i) { "✔" } else { "·" })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Prints one day's exercises in a formatted table.
fn print_day(view: &DayView, header_color: Color) {
    println!(
        "{} [{}]",
        view.date.format("%A, %B %-d"),
        status_label(view)
    );
    if view.entries.is_empty() {
        println!("No workout scheduled. Choose a template with 'apply <template>'.");
        return;
    }

    let unit = view.unit;
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("#").fg(header_color),
            Cell::new("Exercise").fg(header_color),
            Cell::new("Sets x Reps").fg(header_color),
            Cell::new(format!("Weight ({unit})")).fg(header_color),
            Cell::new("vs Last").fg(header_color),
            Cell::new("Logged").fg(header_color),
            Cell::new("Rest").fg(header_color),
        ]);

    for (i, entry) in view.entries.iter().enumerate() {
        let mut name_cell = Cell::new(&entry.name);
        if let Some(color) = entry.color {
            name_cell = name_cell.fg(Color::from(color)).add_attribute(Attribute::Bold);
        }
        let weight = unit.from_canonical(entry.weight);
        let diff = unit.from_canonical(entry.weight_delta());
        let diff_cell = if diff >= 0.0 {
            Cell::new(format!("↑ {:.1}", diff.abs())).fg(Color::Green)
        } else {
            Cell::new(format!("↓ {:.1}", diff.abs())).fg(Color::Red)
        };
        table.add_row(vec![
            Cell::new(i + 1),
            name_cell,
            Cell::new(format!("{} x {}", entry.sets, entry.reps)),
            Cell::new(format!("{weight:.1}")),
            diff_cell,
            Cell::new(logged_marks(entry)),
            Cell::new(format_countdown(entry.rest_time)),
        ]);
    }
    println!("{table}");
}

fn print_day_csv(view: &DayView) -> Result<()> {
    let mut writer = csv::Writer::from_writer(io::stdout());
    let unit = view.unit;
    writer.write_record([
        "Date".to_string(),
        "Exercise".to_string(),
        "Sets".to_string(),
        "Reps".to_string(),
        format!("Weight_{unit}"),
        format!("Last_Weight_{unit}"),
        "Logged_Sets".to_string(),
        "Rest_s".to_string(),
    ])?;
    for entry in &view.entries {
        writer.write_record([
            view.date.format("%Y-%m-%d").to_string(),
            entry.name.clone(),
            entry.sets.to_string(),
            entry.reps.to_string(),
            format!("{:.2}", unit.from_canonical(entry.weight)),
            format!("{:.2}", unit.from_canonical(entry.last_weight)),
            entry.logged_count().to_string(),
            entry.rest_time.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn print_calendar(cells: &[CalendarDay], header_color: Color) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            cells
                .iter()
                .map(|c| {
                    let cell = Cell::new(c.date.format("%a %-d")).fg(header_color);
                    if c.is_today {
                        cell.add_attribute(Attribute::Bold)
                    } else {
                        cell
                    }
                })
                .collect::<Vec<_>>(),
        );
    table.add_row(
        cells
            .iter()
            .map(|c| match (c.has_workout, c.completed, c.finished) {
                (_, true, _) => Cell::new("●").fg(Color::Green),
                (true, false, true) => Cell::new("◐").fg(Color::Yellow),
                (true, false, false) => Cell::new("○"),
                (false, _, _) => Cell::new(""),
            })
            .collect::<Vec<_>>(),
    );
    println!("{table}");
    println!("● completed  ◐ finished  ○ scheduled");
}

/// Prints templates in a formatted table.
fn print_template_table(templates: &[Template], header_color: Color) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("ID").fg(header_color),
            Cell::new("Name").fg(header_color),
            Cell::new("Exercises").fg(header_color),
            Cell::new("Days").fg(header_color),
            Cell::new("Rest").fg(header_color),
        ]);
    for t in templates {
        table.add_row(vec![
            Cell::new(&t.id),
            Cell::new(&t.name),
            Cell::new(t.exercises.len()),
            Cell::new(days_label(t)),
            Cell::new(format_countdown(t.rest_time)),
        ]);
    }
    println!("{table}");
}

fn print_template_detail(t: &Template, header_color: Color) {
    println!(
        "{} (ID: {}), rest {}, days: {}",
        t.name,
        t.id,
        format_countdown(t.rest_time),
        days_label(t)
    );
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec![
            Cell::new("#").fg(header_color),
            Cell::new("Exercise").fg(header_color),
        ]);
    for (i, ex) in t.exercises.iter().enumerate() {
        table.add_row(vec![Cell::new(i + 1), Cell::new(&ex.name)]);
    }
    println!("{table}");
}

fn days_label(t: &Template) -> String {
    if t.assigned_days.is_empty() {
        "-".to_string()
    } else {
        t.assigned_days
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn print_templates_csv(templates: &[Template]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(io::stdout());
    writer.write_record(["ID", "Name", "Exercises", "Days", "Rest_s"])?;
    for t in templates {
        let exercises: Vec<&str> = t.exercises.iter().map(|e| e.name.as_str()).collect();
        writer.write_record([
            t.id.clone(),
            t.name.clone(),
            exercises.join(";"),
            days_label(t),
            t.rest_time.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn print_history_csv(rows: &[HistoryRow], unit: WeightUnit) -> Result<()> {
    let mut writer = csv::Writer::from_writer(io::stdout());
    writer.write_record([
        "Date".to_string(),
        "Exercise".to_string(),
        "Set".to_string(),
        "Reps".to_string(),
        format!("Weight_{unit}"),
        "Logged".to_string(),
    ])?;
    for row in rows {
        writer.write_record([
            row.date.format("%Y-%m-%d").to_string(),
            row.exercise.clone(),
            row.set_number.to_string(),
            row.reps.to_string(),
            format!("{:.2}", row.weight),
            row.logged.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
