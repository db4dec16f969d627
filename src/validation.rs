//! Registration field validation.
//!
//! Every rule is checked independently and all violations are reported,
//! one [`FieldError`] per violated rule.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const MIN_NAME_CHARS: usize = 2;
pub const MAX_NAME_CHARS: usize = 100;
pub const MAX_EMAIL_CHARS: usize = 255;

pub const FIELD_FULL_NAME: &str = "fullName";
pub const FIELD_EMAIL: &str = "email";

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)+$"#,
    )
    .expect("email pattern is valid")
});

/// A single violated rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

/// Submitted fields after trimming and email normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRegistration {
    pub full_name: String,
    pub email: String,
}

/// Trimmed, lowercased form used for uniqueness comparison.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn is_valid_name_char(c: char) -> bool {
    c.is_alphabetic() || c.is_whitespace() || c == '\'' || c == '-'
}

pub fn validate_registration(
    full_name: &str,
    email: &str,
) -> Result<NormalizedRegistration, Vec<FieldError>> {
    let mut errors = Vec::new();

    let name = full_name.trim();
    if name.is_empty() {
        errors.push(FieldError::new(FIELD_FULL_NAME, "Full name is required"));
    }
    let name_chars = name.chars().count();
    if !(MIN_NAME_CHARS..=MAX_NAME_CHARS).contains(&name_chars) {
        errors.push(FieldError::new(
            FIELD_FULL_NAME,
            "Name must be 2-100 characters",
        ));
    }
    if name.is_empty() || !name.chars().all(is_valid_name_char) {
        errors.push(FieldError::new(
            FIELD_FULL_NAME,
            "Name contains invalid characters",
        ));
    }

    let email = normalize_email(email);
    if email.is_empty() {
        errors.push(FieldError::new(FIELD_EMAIL, "Email is required"));
    }
    if !EMAIL_PATTERN.is_match(&email) {
        errors.push(FieldError::new(FIELD_EMAIL, "Invalid email format"));
    }
    if email.chars().count() > MAX_EMAIL_CHARS {
        errors.push(FieldError::new(FIELD_EMAIL, "Email too long"));
    }

    if errors.is_empty() {
        Ok(NormalizedRegistration {
            full_name: name.to_string(),
            email,
        })
    } else {
        Err(errors)
    }
}
