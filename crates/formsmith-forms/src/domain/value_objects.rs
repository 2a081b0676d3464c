//! Value Objects - Immutable domain primitives for form schemas
//!
//! Value Objects are:
//! - Immutable
//! - Comparable by value (not identity)
//! - Self-validating where a rule exists
//! - Serialized in the persisted `savedForms` layout

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A value held by a field during a preview session.
///
/// Text inputs hold strings, checkboxes hold booleans, derived fields hold
/// whatever their formula produced. `Null` means "never entered".
pub type FieldValue = serde_json::Value;

/// Field identifier (Value Object)
///
/// # Invariants
/// - Generated once at creation and never changed
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldId(String);

impl FieldId {
    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FieldId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for FieldId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Saved form identifier (Value Object)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormId(String);

impl FormId {
    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FormId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for FormId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for FormId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Input widget kind of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Text,
    Number,
    Textarea,
    Select,
    Radio,
    Checkbox,
    Date,
}

impl FieldType {
    pub const ALL: [FieldType; 7] = [
        FieldType::Text,
        FieldType::Number,
        FieldType::Textarea,
        FieldType::Select,
        FieldType::Radio,
        FieldType::Checkbox,
        FieldType::Date,
    ];

    /// Text rules (length, email, password) only make sense for free text.
    pub fn supports_validation_rules(&self) -> bool {
        matches!(self, FieldType::Text | FieldType::Textarea)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Number => "number",
            FieldType::Textarea => "textarea",
            FieldType::Select => "select",
            FieldType::Radio => "radio",
            FieldType::Checkbox => "checkbox",
            FieldType::Date => "date",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        FieldType::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| DomainError::UnknownFieldType(s.to_string()))
    }
}

/// Seed value shown when a preview session starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DefaultValue {
    Number(f64),
    Text(String),
}

impl DefaultValue {
    /// Blank text seeds behave like no seed at all.
    pub fn is_blank(&self) -> bool {
        matches!(self, DefaultValue::Text(s) if s.is_empty())
    }

    pub fn to_field_value(&self) -> FieldValue {
        match self {
            DefaultValue::Number(n) => number_value(*n),
            DefaultValue::Text(s) => FieldValue::String(s.clone()),
        }
    }
}

impl From<&str> for DefaultValue {
    fn from(s: &str) -> Self {
        DefaultValue::Text(s.to_string())
    }
}

impl From<f64> for DefaultValue {
    fn from(n: f64) -> Self {
        DefaultValue::Number(n)
    }
}

/// Constraints checked against text input on every change
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRules {
    #[serde(default)]
    pub not_empty: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    /// Value must look like `local@domain.tld`
    #[serde(default)]
    pub email: bool,
    /// At least 8 characters including one digit
    #[serde(default)]
    pub password_rule: bool,
}

impl ValidationRules {
    /// True when no rule is switched on.
    pub fn is_empty(&self) -> bool {
        !self.not_empty
            && self.min_length.is_none()
            && self.max_length.is_none()
            && !self.email
            && !self.password_rule
    }

    /// A length limit of zero means no limit.
    pub fn normalized(mut self) -> Self {
        self.min_length = self.min_length.filter(|&n| n > 0);
        self.max_length = self.max_length.filter(|&n| n > 0);
        self
    }
}

/// Computation recipe of a derived field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Derivation {
    /// Fields whose changes trigger recomputation
    #[serde(rename = "parents")]
    pub parent_field_ids: Vec<FieldId>,
    /// Expression referencing other fields by alias
    pub formula: String,
}

impl Derivation {
    pub fn new(parent_field_ids: Vec<FieldId>, formula: impl Into<String>) -> Self {
        Self {
            parent_field_ids,
            formula: formula.into(),
        }
    }

    pub fn depends_on(&self, field_id: &FieldId) -> bool {
        self.parent_field_ids.contains(field_id)
    }
}

/// Domain errors raised by value object construction
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    #[error("unknown field type `{0}` (expected one of text, number, textarea, select, radio, checkbox, date)")]
    UnknownFieldType(String),
}

/// Whether a value counts as "nothing entered".
///
/// Null, whitespace-only text and an unchecked checkbox are blank; numbers
/// never are, including zero.
pub fn is_blank(value: &FieldValue) -> bool {
    match value {
        FieldValue::Null => true,
        FieldValue::String(s) => s.trim().is_empty(),
        FieldValue::Bool(checked) => !checked,
        FieldValue::Number(_) => false,
        FieldValue::Array(items) => items.is_empty(),
        FieldValue::Object(map) => map.is_empty(),
    }
}

/// Text form of a value, used for length and pattern rules.
pub fn value_text(value: &FieldValue) -> String {
    match value {
        FieldValue::Null => String::new(),
        FieldValue::String(s) => s.clone(),
        FieldValue::Bool(b) => b.to_string(),
        FieldValue::Number(n) => n
            .as_f64()
            .map(format_number)
            .unwrap_or_else(|| n.to_string()),
        other => other.to_string(),
    }
}

/// Wrap an `f64` as a field value, keeping integral results integral.
pub fn number_value(n: f64) -> FieldValue {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        FieldValue::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(FieldValue::Number)
            .unwrap_or(FieldValue::Null)
    }
}

/// Render a number the way a user would type it (`30`, not `30.0`).
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}
