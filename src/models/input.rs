// Input coercion and validation shared by the managers.
// Clients send loosely typed JSON (ratings as "4", coordinates as strings),
// so every rule here takes a serde_json::Value and returns a typed result.

use chrono::{DateTime, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::{AppError, AppResult};

pub const MIN_TITLE_LEN: usize = 3;
pub const MIN_CONTENT_LEN: usize = 10;
pub const MIN_COMMENT_LEN: usize = 2;
pub const MIN_USERNAME_LEN: usize = 3;
pub const MIN_PASSWORD_LEN: usize = 6;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid email regex")
});

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("valid username regex"));

const RATING_MESSAGE: &str = "Rating must be an integer between 1 and 5";

/// Rating in `1..=5`. Integers and integer strings are accepted; floats and booleans are not.
pub fn coerce_rating(value: &Value) -> AppResult<i64> {
    let rating = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
    .ok_or_else(|| AppError::validation(RATING_MESSAGE))?;

    if !(1..=5).contains(&rating) {
        return Err(AppError::validation(RATING_MESSAGE));
    }
    Ok(rating)
}

/// Optional coordinate. `null`, a missing field and `""` all mean "not given".
pub fn coerce_coordinate(value: &Value, field: &str) -> AppResult<Option<f64>> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| AppError::validation(format!("Invalid {}", field))),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| AppError::validation(format!("Invalid {}", field))),
        _ => Err(AppError::validation(format!("Invalid {}", field))),
    }
}

/// Coordinates are valid only as a pair and only inside the usual ranges.
pub fn validate_coordinates(latitude: Option<f64>, longitude: Option<f64>) -> AppResult<()> {
    match (latitude, longitude) {
        (None, None) => Ok(()),
        (Some(lat), Some(lon)) => {
            if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
                return Err(AppError::validation("Latitude must be between -90 and 90"));
            }
            if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
                return Err(AppError::validation("Longitude must be between -180 and 180"));
            }
            Ok(())
        }
        _ => Err(AppError::validation(
            "Latitude and longitude must be provided together",
        )),
    }
}

/// ISO `YYYY-MM-DD`, or an RFC 3339 timestamp reduced to its date.
pub fn parse_visit_date(value: &Value) -> AppResult<Option<NaiveDate>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => {
            let raw = s.trim();
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|ts| ts.date_naive()))
                .map(Some)
                .map_err(|_| AppError::validation("Invalid visit_date format. Use YYYY-MM-DD"))
        }
        _ => Err(AppError::validation("Invalid visit_date format. Use YYYY-MM-DD")),
    }
}

fn min_trimmed(raw: &str, min: usize, message: &str) -> AppResult<String> {
    let trimmed = raw.trim();
    if trimmed.chars().count() < min {
        return Err(AppError::validation(message));
    }
    Ok(trimmed.to_string())
}

pub fn validate_title(raw: &str) -> AppResult<String> {
    min_trimmed(raw, MIN_TITLE_LEN, "Title must be at least 3 characters long")
}

pub fn validate_content(raw: &str) -> AppResult<String> {
    min_trimmed(raw, MIN_CONTENT_LEN, "Content must be at least 10 characters long")
}

pub fn validate_comment(raw: &str) -> AppResult<String> {
    min_trimmed(raw, MIN_COMMENT_LEN, "Comment must be at least 2 characters long")
}

pub fn validate_email(raw: &str) -> AppResult<String> {
    let email = raw.trim().to_lowercase();
    if !EMAIL_RE.is_match(&email) {
        return Err(AppError::validation("Invalid email format"));
    }
    Ok(email)
}

pub fn validate_username(raw: &str) -> AppResult<String> {
    let username = raw.trim();
    if username.chars().count() < MIN_USERNAME_LEN {
        return Err(AppError::validation("Username must be at least 3 characters long"));
    }
    if !USERNAME_RE.is_match(username) {
        return Err(AppError::validation(
            "Username can only contain letters, numbers and underscores",
        ));
    }
    Ok(username.to_string())
}

pub fn validate_password(raw: &str) -> AppResult<()> {
    if raw.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation("Password must be at least 6 characters long"));
    }
    Ok(())
}

/// Required non-blank place field (name, city, country).
pub fn required_field(raw: Option<&str>, field: &str) -> AppResult<String> {
    match raw.map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => Err(AppError::validation(format!("{} is required", field))),
    }
}

/// A string field in a patch body. Anything but a string is rejected.
pub fn expect_str<'a>(value: &'a Value, field: &str) -> AppResult<&'a str> {
    value
        .as_str()
        .ok_or_else(|| AppError::validation(format!("{} must be a string", field)))
}

/// Optional text: `null` or blank clears the field, anything else is trimmed.
pub fn optional_text(value: &Value, field: &str) -> AppResult<Option<String>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => {
            let trimmed = s.trim();
            Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
        }
        _ => Err(AppError::validation(format!("{} must be a string", field))),
    }
}

/// `%term%` for a case-insensitive LIKE, with LIKE wildcards escaped by `\`.
pub fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for ch in term.trim().to_lowercase().chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

/// Lower-cased extension of an uploaded file name, if it is in the allow-list.
pub fn allowed_extension<'a, I>(filename: &str, allowed: I) -> Option<String>
where
    I: IntoIterator<Item = &'a String>,
{
    let (_, ext) = filename.rsplit_once('.')?;
    let ext = ext.to_lowercase();
    allowed.into_iter().any(|a| *a == ext).then_some(ext)
}
