//! Interactive preview of a saved form
//!
//! A [`PreviewSession`] holds the values a user has typed into one form,
//! keeps derived fields up to date, and tracks the validation message of
//! each field that has been touched.

use crate::clock::{Clock, SystemClock};
use crate::derivation::{DerivationEngine, FormValues};
use crate::domain::{FieldId, FieldValue, FormDefinition};
use crate::validation::{validate, validate_all};
use crate::{FormsError, Result};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct PreviewSession<C = SystemClock> {
    form: FormDefinition,
    engine: DerivationEngine<C>,
    values: FormValues,
    errors: BTreeMap<FieldId, String>,
}

impl PreviewSession {
    pub fn new(form: FormDefinition) -> Self {
        Self::with_clock(form, SystemClock)
    }
}

impl<C: Clock> PreviewSession<C> {
    /// Start a session with every field at its initial value.
    pub fn with_clock(form: FormDefinition, clock: C) -> Self {
        let values = form
            .fields()
            .iter()
            .map(|field| (field.id.clone(), field.initial_value()))
            .collect();
        Self {
            form,
            engine: DerivationEngine::with_clock(clock),
            values,
            errors: BTreeMap::new(),
        }
    }

    pub fn form(&self) -> &FormDefinition {
        &self.form
    }

    /// Record user input for a field.
    ///
    /// Dependents are recomputed and the field's own error is refreshed.
    /// Derived fields are read-only.
    pub fn set_value(&mut self, field_id: &FieldId, value: FieldValue) -> Result<()> {
        let field = self
            .form
            .field(field_id)
            .ok_or_else(|| FormsError::FieldNotFound(field_id.clone()))?;
        if field.is_derived() {
            return Err(FormsError::DerivedField(field_id.clone()));
        }

        match validate(field, &value) {
            Some(message) => {
                debug!(field_id = %field_id, %message, "preview value rejected");
                self.errors.insert(field_id.clone(), message);
            }
            None => {
                self.errors.remove(field_id);
            }
        }

        let values = std::mem::take(&mut self.values);
        self.values = self
            .engine
            .on_field_change(field_id, value, self.form.fields(), values);
        Ok(())
    }

    /// Set a field by alias, falling back to id.
    pub fn set_value_by_name(&mut self, name: &str, value: FieldValue) -> Result<FieldId> {
        let id = match self.form.field_by_alias(name) {
            Some(field) => field.id.clone(),
            None => FieldId::from(name),
        };
        self.set_value(&id, value)?;
        Ok(id)
    }

    pub fn value(&self, field_id: &FieldId) -> Option<&FieldValue> {
        self.values.get(field_id)
    }

    pub fn values(&self) -> &FormValues {
        &self.values
    }

    pub fn error(&self, field_id: &FieldId) -> Option<&str> {
        self.errors.get(field_id).map(String::as_str)
    }

    pub fn errors(&self) -> &BTreeMap<FieldId, String> {
        &self.errors
    }

    /// Validate every non-derived field, as a submit would.
    ///
    /// Replaces the stored errors and returns them; empty means the form is
    /// valid.
    pub fn validate_all(&mut self) -> &BTreeMap<FieldId, String> {
        self.errors = validate_all(self.form.fields(), &self.values);
        debug!(form_id = %self.form.id(), failures = self.errors.len(), "preview validated");
        &self.errors
    }
}
