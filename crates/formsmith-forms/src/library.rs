//! Saved form library
//!
//! The set of saved forms is loaded once when the library is opened and kept
//! in memory; every save appends to the repository before the in-memory list
//! changes.

use crate::clock::{Clock, SystemClock};
use crate::domain::{FormDefinition, FormDraft, FormId, FormRepository};
use crate::preview::PreviewSession;
use crate::{FormsError, Result};
use tracing::info;

pub struct FormLibrary<R, C = SystemClock> {
    repository: R,
    clock: C,
    forms: Vec<FormDefinition>,
}

impl<R: FormRepository> FormLibrary<R> {
    /// Load every saved form from `repository`.
    pub fn open(repository: R) -> Result<Self> {
        Self::open_with_clock(repository, SystemClock)
    }
}

impl<R: FormRepository, C: Clock + Clone> FormLibrary<R, C> {
    pub fn open_with_clock(repository: R, clock: C) -> Result<Self> {
        let forms = repository.load_all()?;
        info!(count = forms.len(), "form library opened");
        Ok(Self {
            repository,
            clock,
            forms,
        })
    }

    /// Saved forms, oldest first
    pub fn forms(&self) -> &[FormDefinition] {
        &self.forms
    }

    pub fn get(&self, id: &FormId) -> Option<&FormDefinition> {
        self.forms.iter().find(|form| form.id() == id)
    }

    /// Save the draft as a new form.
    ///
    /// On success the draft is reset. If persisting fails the draft is left
    /// untouched and the library is unchanged.
    pub fn save_draft(&mut self, draft: &mut FormDraft) -> Result<FormDefinition> {
        let form = draft.to_form_definition(self.clock.now())?;
        self.repository.append_and_persist(&form)?;
        info!(form_id = %form.id(), name = %form.name(), fields = form.fields().len(), "form saved");
        draft.mark_saved(&form);
        self.forms.push(form.clone());
        Ok(form)
    }

    /// Open a preview session for a saved form.
    pub fn preview(&self, id: &FormId) -> Result<PreviewSession<C>> {
        let form = self
            .get(id)
            .ok_or_else(|| FormsError::FormNotFound(id.clone()))?;
        Ok(PreviewSession::with_clock(form.clone(), self.clock.clone()))
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn into_repository(self) -> R {
        self.repository
    }
}
