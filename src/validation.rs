use crate::errors::FieldErrors;
use crate::models::{AccountUpdate, RegisterRequest};
use crate::zones::{find_country, Country};
use once_cell::sync::Lazy;
use regex::Regex;

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MIN_GOAL: u32 = 1;
pub const MAX_GOAL: u32 = 20;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern"));

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email.trim())
}

/// A registration form that passed every check.
#[derive(Debug)]
pub struct ValidRegistration {
    pub name: String,
    pub surname: String,
    pub email: String,
    pub country: &'static Country,
    pub goal: u32,
}

pub fn validate_registration(
    req: &RegisterRequest,
    default_goal: u32,
) -> Result<ValidRegistration, FieldErrors> {
    let mut errors = FieldErrors::new();
    let name = req.name.trim();
    let surname = req.surname.trim();
    let email = req.email.trim();

    if name.is_empty() {
        errors.insert("name", "Name is required".into());
    }
    if surname.is_empty() {
        errors.insert("surname", "Surname is required".into());
    }
    if email.is_empty() {
        errors.insert("email", "Email is required".into());
    } else if !is_valid_email(email) {
        errors.insert("email", "The email address is not valid (name@example.com)".into());
    }

    let country = find_country(&req.country);
    if country.is_none() {
        errors.insert("country", "Choose your country".into());
    }

    let goal = req.goal.unwrap_or(default_goal);
    if let Err(message) = check_goal(goal) {
        errors.insert("goal", message);
    }

    if let Err(message) = check_password(&req.password, &[name, surname]) {
        errors.insert("password", message);
    }
    if req.password != req.password_confirm {
        errors.insert("password_confirm", "Passwords do not match".into());
    }

    match country {
        Some(country) if errors.is_empty() => Ok(ValidRegistration {
            name: name.to_string(),
            surname: surname.to_string(),
            email: email.to_string(),
            country,
            goal,
        }),
        _ => Err(errors),
    }
}

/// Length rule always applies; `personal` holds words the password may not equal.
pub fn check_password(password: &str, personal: &[&str]) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!("Password must be at least {MIN_PASSWORD_LEN} characters"));
    }
    let lowered = password.to_lowercase();
    if personal
        .iter()
        .any(|word| !word.is_empty() && word.to_lowercase() == lowered)
    {
        return Err("Password cannot be your name or surname".into());
    }
    Ok(())
}

pub fn check_goal(goal: u32) -> Result<(), String> {
    if (MIN_GOAL..=MAX_GOAL).contains(&goal) {
        Ok(())
    } else {
        Err(format!("Goal must be between {MIN_GOAL} and {MAX_GOAL} glasses"))
    }
}

pub fn validate_account_update(update: &AccountUpdate) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    if update.name.trim().is_empty() || update.surname.trim().is_empty() || update.email.trim().is_empty() {
        errors.insert("form", "Fill in all fields".into());
    } else if !is_valid_email(&update.email) {
        errors.insert("email", "The email address is not valid (name@example.com)".into());
    }
    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
