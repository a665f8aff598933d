// src/validation.rs
use thiserror::Error;

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MIN_FOCUS_LEN: usize = 3;

/// Malformed user input, rejected before anything is changed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("The {0} cannot be empty.")]
    EmptyField(&'static str),
    #[error("The {0} must be a positive number.")]
    NonPositive(&'static str),
    #[error("Invalid number for {field}: '{value}'")]
    InvalidNumber { field: &'static str, value: String },
    #[error("A template needs at least one exercise.")]
    NoExercises,
    #[error("Exercise #{0} has no name.")]
    EmptyExerciseName(usize),
    #[error("Invalid weekday: '{0}'. Use Sun, Mon, Tue, Wed, Thu, Fri or Sat.")]
    InvalidWeekday(String),
    #[error("Invalid unit: '{0}'. Use 'lbs' or 'kgs'.")]
    InvalidUnit(String),
    #[error("Invalid email address: '{0}'")]
    InvalidEmail(String),
    #[error("Passwords don't match.")]
    PasswordMismatch,
    #[error("Password must be at least {} characters.", MIN_PASSWORD_LEN)]
    PasswordTooShort,
    #[error("Please describe the focus of your workout in at least {} characters.", MIN_FOCUS_LEN)]
    FocusTooShort,
}

/// Checks the sign-up form: a plausible e-mail and a confirmed, long enough password.
/// # Errors
/// Returns the first problem found.
pub fn check_sign_up(email: &str, password: &str, confirm: &str) -> Result<(), Error> {
    let email = email.trim();
    if email.is_empty() {
        return Err(Error::EmptyField("email"));
    }
    if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
        return Err(Error::InvalidEmail(email.to_string()));
    }
    if password != confirm {
        return Err(Error::PasswordMismatch);
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(Error::PasswordTooShort);
    }
    Ok(())
}

/// Parses a user-typed weight, which must be finite and not negative.
/// # Errors
/// `InvalidNumber` when unparsable or negative.
pub fn parse_weight(input: &str) -> Result<f64, Error> {
    let invalid = || Error::InvalidNumber {
        field: "weight",
        value: input.to_string(),
    };
    let value: f64 = input.trim().parse().map_err(|_| invalid())?;
    if !value.is_finite() || value < 0.0 {
        return Err(invalid());
    }
    Ok(value)
}
