//! Per-field validation for preview input
//!
//! Checks run in a fixed order and the first failure is reported. Length,
//! email and password rules apply to the value's text form, including the
//! empty string, so an optional field with `minLength` still fails when left
//! blank.

use crate::derivation::FormValues;
use crate::domain::{is_blank, value_text, FieldDefinition, FieldId, FieldValue};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

pub const REQUIRED_MESSAGE: &str = "This field is required";
pub const NOT_EMPTY_MESSAGE: &str = "This field cannot be empty";
pub const EMAIL_MESSAGE: &str = "Invalid email format";
pub const PASSWORD_MESSAGE: &str = "Password must be minimum 8 characters and contain a number";

const PASSWORD_MIN_CHARS: usize = 8;

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"))
}

/// Validate one value against its field. `None` means valid.
pub fn validate(field: &FieldDefinition, value: &FieldValue) -> Option<String> {
    if field.is_derived() {
        return None;
    }

    if field.required && is_blank(value) {
        return Some(REQUIRED_MESSAGE.to_string());
    }

    let rules = field.validation_rules.as_ref()?;
    if rules.not_empty && is_blank(value) {
        return Some(NOT_EMPTY_MESSAGE.to_string());
    }

    let text = value_text(value);
    let length = text.chars().count();

    // Zero limits can still arrive through stored forms; they mean no limit.
    if let Some(min) = rules.min_length.filter(|&min| length < min) {
        return Some(format!("Minimum length is {min}"));
    }
    if let Some(max) = rules.max_length.filter(|&max| max > 0 && length > max) {
        return Some(format!("Maximum length is {max}"));
    }
    if rules.email && !email_pattern().is_match(&text) {
        return Some(EMAIL_MESSAGE.to_string());
    }
    if rules.password_rule && !is_acceptable_password(&text) {
        return Some(PASSWORD_MESSAGE.to_string());
    }

    None
}

/// Validate every non-derived field, returning only the failures.
///
/// Fields missing from `values` are checked as empty text.
pub fn validate_all(fields: &[FieldDefinition], values: &FormValues) -> BTreeMap<FieldId, String> {
    let empty = FieldValue::String(String::new());
    fields
        .iter()
        .filter(|field| !field.is_derived())
        .filter_map(|field| {
            let value = values.get(&field.id).unwrap_or(&empty);
            validate(field, value).map(|message| (field.id.clone(), message))
        })
        .collect()
}

fn is_acceptable_password(text: &str) -> bool {
    text.chars().count() >= PASSWORD_MIN_CHARS && text.chars().any(|c| c.is_ascii_digit())
}
