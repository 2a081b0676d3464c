//! Draft events
//!
//! Recorded by [`FormDraft`](super::aggregates::FormDraft) as the in-progress
//! form changes, and drained with `take_events`.

use super::value_objects::{FieldId, FormId};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DraftEvent {
    FieldAdded { field_id: FieldId },
    FieldUpdated { field_id: FieldId },
    FieldRemoved { field_id: FieldId },
    FieldsReordered { from: usize, to: usize },
    FormSaved { form_id: FormId, field_count: usize },
}

impl DraftEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            DraftEvent::FieldAdded { .. } => "draft.field_added",
            DraftEvent::FieldUpdated { .. } => "draft.field_updated",
            DraftEvent::FieldRemoved { .. } => "draft.field_removed",
            DraftEvent::FieldsReordered { .. } => "draft.fields_reordered",
            DraftEvent::FormSaved { .. } => "draft.form_saved",
        }
    }
}
