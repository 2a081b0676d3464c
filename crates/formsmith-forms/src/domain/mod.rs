//! Formsmith Domain Model
//!
//! - **Value Objects**: FieldId, FormId, FieldType, ValidationRules, Derivation
//! - **Aggregates**: FormDraft (mutable, enforces field-list invariants) and
//!   FormDefinition (immutable once saved)
//! - **Domain Events**: DraftEvent
//! - **Repositories**: FormRepository over a KeyValueStore

pub mod value_objects;
pub mod aggregates;
pub mod events;
pub mod repositories;

pub use value_objects::*;
pub use aggregates::*;
pub use events::*;
pub use repositories::*;
