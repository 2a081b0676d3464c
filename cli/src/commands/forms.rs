//! Saved form commands

use super::{parse_form_id, FieldRow, Workspace};
use crate::{output::OutputFormat, FormCommands};
use colored::Colorize;
use formsmith_forms::FormDefinition;
use serde::Serialize;
use tabled::Tabled;

#[derive(Debug, Tabled, Serialize)]
pub struct FormRow {
    pub id: String,
    pub name: String,
    pub fields: usize,
    pub created: String,
}

impl From<&FormDefinition> for FormRow {
    fn from(form: &FormDefinition) -> Self {
        Self {
            id: form.id().to_string(),
            name: form.name().to_string(),
            fields: form.fields().len(),
            created: form.created_at().format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

pub fn handle(action: FormCommands, workspace: &Workspace, format: OutputFormat) -> Result<(), String> {
    let library = workspace.library()?;

    match action {
        FormCommands::List => {
            if format.is_table() {
                format.print_rows(library.forms().iter().map(FormRow::from).collect());
            } else {
                format.print(&library.forms());
            }
        }
        FormCommands::Show { id } => {
            let form = library
                .get(&parse_form_id(&id))
                .ok_or_else(|| format!("Form not found: {}", id))?;
            if format.is_table() {
                println!("{} ({})", form.name().bold(), form.id());
                format.print_rows(FieldRow::from_fields(form.fields()));
            } else {
                format.print(form);
            }
        }
    }
    Ok(())
}
