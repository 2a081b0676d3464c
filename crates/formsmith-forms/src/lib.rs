//! Formsmith - Form schema builder
//!
//! Build a form out of typed fields, save it, then fill it in with live
//! validation and computed fields.
//!
//! ## Features
//! - Draft editor with alias uniqueness and rule checks
//! - Derived fields computed from a sandboxed formula language
//! - Per-field validation (required, length, email, password)
//! - Saved form collection in a local key-value store
//!
//! ```
//! use formsmith_forms::{FieldInput, FieldType, FormDraft, FormLibrary, MemoryStore, StoreFormRepository};
//! use serde_json::json;
//!
//! let mut library = FormLibrary::open(StoreFormRepository::new(MemoryStore::new())).unwrap();
//!
//! let mut draft = FormDraft::new();
//! let width = draft.add_or_update_field(FieldInput::new(FieldType::Number, "Width", "w")).unwrap();
//! let height = draft.add_or_update_field(FieldInput::new(FieldType::Number, "Height", "h")).unwrap();
//! draft
//!     .add_or_update_field(
//!         FieldInput::new(FieldType::Number, "Area", "area").derived(vec![width.id.clone(), height.id.clone()], "w * h"),
//!     )
//!     .unwrap();
//! draft.set_name("Rectangle");
//! let form = library.save_draft(&mut draft).unwrap();
//!
//! let mut preview = library.preview(form.id()).unwrap();
//! preview.set_value_by_name("w", json!(3)).unwrap();
//! preview.set_value_by_name("h", json!(4)).unwrap();
//! let area = form.field_by_alias("area").unwrap();
//! assert_eq!(preview.value(&area.id), Some(&json!(12)));
//! ```

#![warn(clippy::all)]

pub mod clock;
pub mod derivation;
pub mod domain;
pub mod formula;
pub mod library;
pub mod preview;
pub mod validation;

pub use clock::{Clock, FixedClock, SystemClock};
pub use derivation::{DerivationEngine, FormValues};
pub use domain::*;
pub use formula::FormulaError;
pub use library::FormLibrary;
pub use preview::PreviewSession;

use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum FormsError {
    #[error("form `{0}` not found")]
    FormNotFound(FormId),

    #[error("field `{0}` not found")]
    FieldNotFound(FieldId),

    #[error("field `{0}` is computed and cannot be edited")]
    DerivedField(FieldId),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("invalid field: {0}")]
    Validation(#[from] ValidationError),

    #[error("cannot save form: {0}")]
    Draft(#[from] DraftError),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, FormsError>;
