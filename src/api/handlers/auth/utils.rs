//! Small helpers for signup validation.

use regex::Regex;

/// Normalize an email for lookup/uniqueness checks.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(crate) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// Username shape check: letters, digits and `@ . + - _`, at most 150 chars.
pub(crate) fn valid_username(username: &str) -> bool {
    if username.is_empty() || username.len() > 150 {
        return false;
    }
    Regex::new(r"^[\w.@+-]+$").is_ok_and(|regex| regex.is_match(username))
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}
