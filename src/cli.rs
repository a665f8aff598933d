// src/cli.rs
use chrono::{Duration, Local, NaiveDate};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

#[derive(Parser, Debug)]
#[command(author, version, about = "Plan workouts from templates and log your sets", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
    #[arg(long, global = true)]
    pub export_csv: bool,
}

// Custom parser for date strings and shorthands
pub fn parse_date_shorthand(s: &str) -> Result<NaiveDate, String> {
    let today = Local::now().date_naive();
    match s.to_lowercase().as_str() {
        "today" => Ok(today),
        "yesterday" => Ok(today - Duration::days(1)),
        "tomorrow" => Ok(today + Duration::days(1)),
        _ => {
            // Try parsing YYYY-MM-DD first
            if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                Ok(date)
            }
            // Try parsing DD.MM.YYYY next
            else if let Ok(date) = NaiveDate::parse_from_str(s, "%d.%m.%Y") {
                Ok(date)
            } else {
                Err(format!(
                    "Invalid date format: '{s}'. Use 'today', 'yesterday', 'tomorrow', YYYY-MM-DD or DD.MM.YYYY."
                ))
            }
        }
    }
}

// Positions are shown 1-based on screen
fn parse_position(s: &str) -> Result<usize, String> {
    match s.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(format!("Invalid position '{s}': use 1, 2, 3...")),
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitCli {
    Lbs,
    Kgs,
    Toggle,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LevelCli {
    Beginner,
    Intermediate,
    Advanced,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum GoalCli {
    Bulking,
    Cutting,
    Maintenance,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CarryForwardCli {
    /// Any earlier entry with a set recorded, logged or not
    AnyRecorded,
    /// Only earlier entries with at least one logged set
    AnyCompleted,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create an account and sign in
    Signup {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
        /// Repeat the password
        #[arg(short, long)]
        confirm: String,
    },
    /// Sign in to an existing account
    Login {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
    },
    /// Sign out
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Permanently delete the account and all its workout data
    DeleteAccount {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
    /// Show or change the weight unit
    Unit {
        #[arg(value_enum)]
        unit: Option<UnitCli>,
    },
    /// Manage workout templates
    #[command(subcommand)]
    Template(TemplateCommands),
    /// Show the workout of a day
    Show {
        #[arg(long, value_parser = parse_date_shorthand, default_value = "today")]
        date: NaiveDate,
    },
    /// Show a strip of days with their workout status
    Calendar {
        /// First day shown (defaults to three days before today)
        #[arg(long, value_parser = parse_date_shorthand)]
        start: Option<NaiveDate>,
        #[arg(long, default_value_t = 7)]
        days: u32,
    },
    /// List the dates where every set was logged
    Completed,
    /// Fill a day from a template, carrying weights forward
    Apply {
        /// Template id or name
        template: String,
        #[arg(long, value_parser = parse_date_shorthand, default_value = "today")]
        date: NaiveDate,
    },
    /// Add a single exercise to a day
    AddExercise {
        name: String,
        #[arg(long, value_parser = parse_date_shorthand, default_value = "today")]
        date: NaiveDate,
    },
    /// Log (or un-log) a set of today's workout and start the rest timer
    Log {
        #[arg(value_parser = parse_position)]
        exercise: usize,
        #[arg(value_parser = parse_position)]
        set: usize,
        /// Don't run the rest countdown
        #[arg(long)]
        no_rest: bool,
    },
    /// Add a set to an exercise
    AddSet {
        #[arg(value_parser = parse_position)]
        exercise: usize,
        #[arg(long, value_parser = parse_date_shorthand, default_value = "today")]
        date: NaiveDate,
    },
    /// Remove a set from an exercise (an exercise keeps at least one set)
    RemoveSet {
        #[arg(value_parser = parse_position)]
        exercise: usize,
        #[arg(value_parser = parse_position)]
        set: usize,
        #[arg(long, value_parser = parse_date_shorthand, default_value = "today")]
        date: NaiveDate,
    },
    /// Set the working weight of an exercise, in your unit
    SetWeight {
        #[arg(value_parser = parse_position)]
        exercise: usize,
        weight: String,
        #[arg(long, value_parser = parse_date_shorthand, default_value = "today")]
        date: NaiveDate,
    },
    /// Set the reps per set of an exercise
    SetReps {
        #[arg(value_parser = parse_position)]
        exercise: usize,
        reps: u32,
        #[arg(long, value_parser = parse_date_shorthand, default_value = "today")]
        date: NaiveDate,
    },
    /// Tag an exercise with a color ('none' clears it)
    SetColor {
        #[arg(value_parser = parse_position)]
        exercise: usize,
        color: String,
        #[arg(long, value_parser = parse_date_shorthand, default_value = "today")]
        date: NaiveDate,
    },
    /// Reorder the exercises of a day
    Move {
        #[arg(value_parser = parse_position)]
        from: usize,
        #[arg(value_parser = parse_position)]
        to: usize,
        #[arg(long, value_parser = parse_date_shorthand, default_value = "today")]
        date: NaiveDate,
    },
    /// Run a rest countdown without logging a set
    Rest {
        /// Seconds to rest (defaults to the configured rest time)
        secs: Option<u32>,
    },
    /// Mark today's workout as finished
    Finish,
    /// Print every set in a date range as CSV
    History {
        #[arg(long, value_parser = parse_date_shorthand)]
        start: Option<NaiveDate>,
        #[arg(long, value_parser = parse_date_shorthand)]
        end: Option<NaiveDate>,
    },
    /// Set the table header color
    SetHeaderColor { color: String },
    /// Choose which earlier entries supply carried-forward weights
    SetCarryForward {
        #[arg(value_enum)]
        policy: CarryForwardCli,
    },
    /// Show the path to the config file
    ConfigPath,
    /// Show the path to the database file
    DbPath,
    /// Generate shell completion scripts
    GenerateCompletion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum TemplateCommands {
    /// List templates
    List,
    /// Show the exercises of a template
    Show { template: String },
    /// Create a template
    Create {
        #[arg(short, long)]
        name: String,
        /// Comma-separated exercise names (e.g., "Bench Press,Overhead Press")
        #[arg(short, long)]
        exercises: String,
        /// Comma-separated weekdays (e.g., "Mon,Thu")
        #[arg(short, long)]
        days: Option<String>,
        /// Rest between sets in seconds
        #[arg(short, long)]
        rest: Option<u32>,
    },
    /// Change a template
    Edit {
        template: String,
        #[arg(short, long)]
        name: Option<String>,
        /// Replace the exercise list (comma-separated)
        #[arg(short, long)]
        exercises: Option<String>,
        /// Comma-separated weekdays to switch on or off
        #[arg(short, long)]
        toggle_days: Option<String>,
        #[arg(short, long)]
        rest: Option<u32>,
    },
    /// Append an exercise to a template
    AddExercise { template: String, name: String },
    /// Remove an exercise from a template
    RemoveExercise {
        template: String,
        #[arg(value_parser = parse_position)]
        position: usize,
    },
    /// Reorder the exercises of a template
    MoveExercise {
        template: String,
        #[arg(value_parser = parse_position)]
        from: usize,
        #[arg(value_parser = parse_position)]
        to: usize,
    },
    /// Delete a template
    Delete { template: String },
    /// Ask the language model for a template
    Generate {
        /// What the workout should focus on (e.g., "Upper Body Strength")
        #[arg(short, long)]
        focus: String,
        #[arg(short, long, value_enum, default_value = "intermediate")]
        level: LevelCli,
        #[arg(short, long, value_enum, default_value = "maintenance")]
        goal: GoalCli,
        /// Extra constraints, such as equipment or exercises to avoid
        #[arg(short, long)]
        notes: Option<String>,
    },
}

// Function to parse CLI arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

pub fn build_cli_command() -> clap::Command {
    Cli::command()
}
