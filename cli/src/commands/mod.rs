//! CLI Commands

pub mod config;
pub mod draft;
pub mod forms;
pub mod preview;

use formsmith_forms::{
    FieldDefinition, FileStore, FormDraft, FormId, FormLibrary, KeyValueStore, StoreFormRepository,
};
use serde::Serialize;
use std::path::PathBuf;
use tabled::Tabled;

/// Store key of the in-progress draft
pub const DRAFT_KEY: &str = "draft";

pub type Library = FormLibrary<StoreFormRepository<FileStore>>;

/// Local store shared by every command
pub struct Workspace {
    store_dir: PathBuf,
}

impl Workspace {
    pub fn new(store_dir: PathBuf) -> Self {
        Self { store_dir }
    }

    fn store(&self) -> FileStore {
        FileStore::new(&self.store_dir)
    }

    pub fn load_draft(&self) -> Result<FormDraft, String> {
        let draft = self
            .store()
            .load::<FormDraft>(DRAFT_KEY)
            .map_err(|e| e.to_string())?;
        Ok(draft.unwrap_or_default())
    }

    pub fn save_draft(&self, draft: &mut FormDraft) -> Result<(), String> {
        for event in draft.take_events() {
            tracing::debug!(event = event.event_type(), ?event, "draft changed");
        }
        self.store()
            .store(DRAFT_KEY, &*draft)
            .map_err(|e| e.to_string())
    }

    pub fn library(&self) -> Result<Library, String> {
        FormLibrary::open(StoreFormRepository::new(self.store())).map_err(|e| e.to_string())
    }
}

pub fn parse_form_id(raw: &str) -> FormId {
    FormId::from(raw.trim())
}

/// One line per field in `draft show` and `forms show`
#[derive(Debug, Tabled, Serialize)]
pub struct FieldRow {
    #[tabled(rename = "#")]
    pub index: usize,
    pub id: String,
    pub alias: String,
    pub label: String,
    #[tabled(rename = "type")]
    pub field_type: String,
    pub required: String,
    pub default: String,
    pub rules: String,
    pub derived: String,
}

impl FieldRow {
    pub fn from_fields(fields: &[FieldDefinition]) -> Vec<Self> {
        fields
            .iter()
            .enumerate()
            .map(|(index, field)| Self::new(index, field, fields))
            .collect()
    }

    fn new(index: usize, field: &FieldDefinition, all: &[FieldDefinition]) -> Self {
        let rules = field
            .validation_rules
            .as_ref()
            .map(|rules| {
                let mut parts = Vec::new();
                if rules.not_empty {
                    parts.push("not-empty".to_string());
                }
                if let Some(min) = rules.min_length {
                    parts.push(format!("min {}", min));
                }
                if let Some(max) = rules.max_length {
                    parts.push(format!("max {}", max));
                }
                if rules.email {
                    parts.push("email".to_string());
                }
                if rules.password_rule {
                    parts.push("password".to_string());
                }
                parts.join(", ")
            })
            .unwrap_or_default();

        let derived = field
            .derivation
            .as_ref()
            .map(|derivation| {
                let parents: Vec<&str> = derivation
                    .parent_field_ids
                    .iter()
                    .map(|id| {
                        all.iter()
                            .find(|f| &f.id == id)
                            .map(|f| f.formula_alias())
                            .unwrap_or(id.as_str())
                    })
                    .collect();
                format!("{} <- {}", derivation.formula, parents.join(", "))
            })
            .unwrap_or_default();

        Self {
            index,
            id: field.id.to_string(),
            alias: field.alias.clone(),
            label: field.label.clone(),
            field_type: field.field_type.to_string(),
            required: if field.required { "yes".into() } else { String::new() },
            default: field
                .default_value
                .as_ref()
                .map(|d| formsmith_forms::value_text(&d.to_field_value()))
                .unwrap_or_default(),
            rules,
            derived,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formsmith_forms::{FieldInput, FieldType, ValidationRules};

    #[test]
    fn test_draft_round_trips_through_store() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::new(dir.path().to_path_buf());
        assert!(workspace.load_draft().unwrap().fields().is_empty());

        let mut draft = FormDraft::new();
        draft.set_name("Survey");
        draft
            .add_or_update_field(FieldInput::new(FieldType::Text, "Name", "name"))
            .unwrap();
        workspace.save_draft(&mut draft).unwrap();
        assert!(draft.take_events().is_empty());

        let loaded = workspace.load_draft().unwrap();
        assert_eq!(loaded.name(), "Survey");
        assert_eq!(loaded.fields(), draft.fields());
        assert!(dir.path().join("draft.json").exists());
    }

    #[test]
    fn test_field_rows_describe_rules_and_parents() {
        let mut draft = FormDraft::new();
        let email = draft
            .add_or_update_field(
                FieldInput::new(FieldType::Text, "Email", "email")
                    .required()
                    .with_rules(ValidationRules {
                        email: true,
                        max_length: Some(64),
                        ..Default::default()
                    }),
            )
            .unwrap();
        draft
            .add_or_update_field(
                FieldInput::new(FieldType::Text, "Domain", "domain").derived(vec![email.id.clone()], "email + '!'"),
            )
            .unwrap();

        let rows = FieldRow::from_fields(draft.fields());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].required, "yes");
        assert_eq!(rows[0].rules, "max 64, email");
        assert_eq!(rows[1].index, 1);
        assert_eq!(rows[1].derived, "email + '!' <- email");
    }
}
