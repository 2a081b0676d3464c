//! Aggregates - Consistency boundaries for form schemas
//!
//! [`FormDraft`] is the only mutable aggregate: fields are added, edited,
//! removed and reordered there, and every invariant of a field list is
//! enforced at that boundary. Saving a draft produces an immutable
//! [`FormDefinition`].

use super::events::DraftEvent;
use super::value_objects::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One field of a form schema
///
/// # Invariants
/// - `label` and `alias` are non-empty
/// - `alias` is unique within the owning form
/// - `validation_rules` only present on text/textarea fields
/// - `derivation`, when present, has parents and a formula
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    pub id: FieldId,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub label: String,
    #[serde(default)]
    pub alias: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<DefaultValue>,
    #[serde(rename = "validation", default, skip_serializing_if = "Option::is_none")]
    pub validation_rules: Option<ValidationRules>,
    #[serde(rename = "derived", default, skip_serializing_if = "Option::is_none")]
    pub derivation: Option<Derivation>,
}

impl FieldDefinition {
    pub fn is_derived(&self) -> bool {
        self.derivation.is_some()
    }

    /// Name this field goes by inside formulas.
    ///
    /// Records written before aliases were mandatory fall back to the id.
    pub fn formula_alias(&self) -> &str {
        if self.alias.is_empty() {
            self.id.as_str()
        } else {
            &self.alias
        }
    }

    /// Value a preview session starts from.
    pub fn initial_value(&self) -> FieldValue {
        if self.is_derived() {
            return FieldValue::String(String::new());
        }
        match &self.default_value {
            Some(default) if !default.is_blank() => default.to_field_value(),
            _ => FieldValue::String(String::new()),
        }
    }
}

/// User input for creating or editing a draft field
///
/// `id` is `None` for a new field and the edited field's id otherwise.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FieldInput {
    pub id: Option<FieldId>,
    pub field_type: FieldType,
    pub label: String,
    pub alias: String,
    pub required: bool,
    pub default_value: Option<DefaultValue>,
    pub validation_rules: Option<ValidationRules>,
    pub derivation: Option<Derivation>,
}

impl FieldInput {
    pub fn new(field_type: FieldType, label: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            field_type,
            label: label.into(),
            alias: alias.into(),
            ..Default::default()
        }
    }

    pub fn editing(mut self, id: FieldId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<DefaultValue>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn with_rules(mut self, rules: ValidationRules) -> Self {
        self.validation_rules = Some(rules);
        self
    }

    pub fn derived(mut self, parents: Vec<FieldId>, formula: impl Into<String>) -> Self {
        self.derivation = Some(Derivation::new(parents, formula));
        self
    }
}

impl From<FieldDefinition> for FieldInput {
    fn from(field: FieldDefinition) -> Self {
        Self {
            id: Some(field.id),
            field_type: field.field_type,
            label: field.label,
            alias: field.alias,
            required: field.required,
            default_value: field.default_value,
            validation_rules: field.validation_rules,
            derivation: field.derivation,
        }
    }
}

/// Rejections of a field definition; the draft is left untouched
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("label must not be empty")]
    LabelRequired,

    #[error("a derived field needs at least one parent field")]
    DerivationParentsRequired,

    #[error("a derived field needs a formula")]
    DerivationFormulaRequired,

    #[error("alias must not be empty")]
    AliasRequired,

    #[error("alias `{0}` is already used by another field")]
    DuplicateAlias(String),

    #[error("min length ({min}) cannot be greater than max length ({max})")]
    MinLengthExceedsMax { min: usize, max: usize },
}

/// Rejections of a save request
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DraftError {
    #[error("form name must not be empty")]
    EmptyName,

    #[error("form has no fields")]
    NoFields,
}

/// A saved, immutable form schema
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormDefinition {
    id: FormId,
    name: String,
    fields: Vec<FieldDefinition>,
    created_at: DateTime<Utc>,
}

impl FormDefinition {
    pub fn id(&self) -> &FormId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn field(&self, id: &FieldId) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| &f.id == id)
    }

    pub fn field_by_alias(&self, alias: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.alias == alias)
    }
}

/// The in-progress form being built
///
/// # Invariants
/// - Aliases are unique across `fields`
/// - A failed edit leaves `fields` exactly as it was
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormDraft {
    #[serde(default)]
    name: String,
    #[serde(default)]
    fields: Vec<FieldDefinition>,
    #[serde(skip)]
    events: Vec<DraftEvent>,
}

impl FormDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    pub fn field(&self, id: &FieldId) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| &f.id == id)
    }

    pub fn field_by_alias(&self, alias: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.alias == alias)
    }

    /// Add a new field, or replace the field named by `input.id` in place.
    ///
    /// An id that is not part of the draft is appended under that id.
    pub fn add_or_update_field(&mut self, input: FieldInput) -> Result<FieldDefinition, ValidationError> {
        let field = self.check_input(input)?;

        match self.fields.iter().position(|f| f.id == field.id) {
            Some(index) => {
                debug!(field_id = %field.id, alias = %field.alias, "updating draft field");
                self.fields[index] = field.clone();
                self.events.push(DraftEvent::FieldUpdated {
                    field_id: field.id.clone(),
                });
            }
            None => {
                debug!(field_id = %field.id, alias = %field.alias, "adding draft field");
                self.fields.push(field.clone());
                self.events.push(DraftEvent::FieldAdded {
                    field_id: field.id.clone(),
                });
            }
        }
        Ok(field)
    }

    /// Remove a field. Other fields keep any parent reference to it.
    pub fn remove_field(&mut self, id: &FieldId) {
        let before = self.fields.len();
        self.fields.retain(|f| &f.id != id);
        if self.fields.len() != before {
            debug!(field_id = %id, "removed draft field");
            self.events.push(DraftEvent::FieldRemoved { field_id: id.clone() });
        }
    }

    /// Move the field at `from` to `to`. Out of range indexes are ignored.
    pub fn reorder(&mut self, from: usize, to: usize) {
        let len = self.fields.len();
        if from >= len || to >= len {
            return;
        }
        let moved = self.fields.remove(from);
        self.fields.insert(to, moved);
        self.events.push(DraftEvent::FieldsReordered { from, to });
    }

    pub fn move_up(&mut self, index: usize) {
        if index > 0 {
            self.reorder(index, index - 1);
        }
    }

    pub fn move_down(&mut self, index: usize) {
        self.reorder(index, index + 1);
    }

    /// Clear name and fields.
    pub fn reset(&mut self) {
        self.name.clear();
        self.fields.clear();
    }

    /// Turn the draft into a saved form and reset it.
    pub fn save(&mut self) -> Result<FormDefinition, DraftError> {
        let form = self.to_form_definition(Utc::now())?;
        self.mark_saved(&form);
        Ok(form)
    }

    /// Build the form a save would produce without touching the draft.
    pub fn to_form_definition(&self, created_at: DateTime<Utc>) -> Result<FormDefinition, DraftError> {
        if self.name.trim().is_empty() {
            return Err(DraftError::EmptyName);
        }
        if self.fields.is_empty() {
            return Err(DraftError::NoFields);
        }
        Ok(FormDefinition {
            id: FormId::generate(),
            name: self.name.clone(),
            fields: self.fields.clone(),
            created_at,
        })
    }

    /// Record that `form` was persisted and start over with an empty draft.
    pub fn mark_saved(&mut self, form: &FormDefinition) {
        debug!(form_id = %form.id, fields = form.fields.len(), "draft saved");
        self.events.push(DraftEvent::FormSaved {
            form_id: form.id.clone(),
            field_count: form.fields.len(),
        });
        self.reset();
    }

    pub fn take_events(&mut self) -> Vec<DraftEvent> {
        std::mem::take(&mut self.events)
    }

    fn check_input(&self, input: FieldInput) -> Result<FieldDefinition, ValidationError> {
        if input.label.trim().is_empty() {
            return Err(ValidationError::LabelRequired);
        }

        let derivation = match input.derivation {
            Some(derivation) => {
                if derivation.parent_field_ids.is_empty() {
                    return Err(ValidationError::DerivationParentsRequired);
                }
                let formula = derivation.formula.trim();
                if formula.is_empty() {
                    return Err(ValidationError::DerivationFormulaRequired);
                }
                Some(Derivation::new(derivation.parent_field_ids, formula))
            }
            None => None,
        };

        let alias = input.alias.trim();
        if alias.is_empty() {
            return Err(ValidationError::AliasRequired);
        }
        let editing = input.id.as_ref();
        if self
            .fields
            .iter()
            .any(|f| f.alias == alias && Some(&f.id) != editing)
        {
            return Err(ValidationError::DuplicateAlias(alias.to_string()));
        }

        let rules = input.validation_rules.map(ValidationRules::normalized);
        if let Some(rules) = &rules {
            if let (Some(min), Some(max)) = (rules.min_length, rules.max_length) {
                if min > max {
                    return Err(ValidationError::MinLengthExceedsMax { min, max });
                }
            }
        }

        let validation_rules = if input.field_type.supports_validation_rules() {
            rules
        } else {
            None
        };

        Ok(FieldDefinition {
            id: input.id.unwrap_or_else(FieldId::generate),
            field_type: input.field_type,
            label: input.label,
            alias: alias.to_string(),
            required: input.required,
            default_value: input.default_value,
            validation_rules,
            derivation,
        })
    }
}
