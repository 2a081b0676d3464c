//! Preview command

use super::{parse_form_id, Workspace};
use crate::output::OutputFormat;
use colored::Colorize;
use formsmith_forms::{value_text, FieldDefinition, FieldType, FieldValue, PreviewSession};
use serde::Serialize;
use std::collections::BTreeMap;
use tabled::Tabled;

#[derive(Debug, Tabled, Serialize)]
pub struct ValueRow {
    pub alias: String,
    pub label: String,
    pub value: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
struct PreviewReport {
    form: String,
    values: BTreeMap<String, FieldValue>,
    errors: BTreeMap<String, String>,
    valid: bool,
}

pub fn handle(
    form_id: &str,
    assignments: &[String],
    submit: bool,
    workspace: &Workspace,
    format: OutputFormat,
) -> Result<(), String> {
    let library = workspace.library()?;
    let mut session = library.preview(&parse_form_id(form_id)).map_err(|e| e.to_string())?;

    for assignment in assignments {
        let (name, raw) = assignment
            .split_once('=')
            .ok_or_else(|| format!("Expected ALIAS_OR_ID=VALUE, got `{}`", assignment))?;
        let name = name.trim();
        let value = match lookup(&session, name) {
            Some(field) => parse_input_value(field, raw),
            None => FieldValue::String(raw.to_string()),
        };
        session.set_value_by_name(name, value).map_err(|e| e.to_string())?;
    }

    if submit {
        session.validate_all();
    }

    print_session(&session, submit, format);
    Ok(())
}

fn lookup<'a>(session: &'a PreviewSession, name: &str) -> Option<&'a FieldDefinition> {
    let form = session.form();
    form.field_by_alias(name).or_else(|| form.field(&name.into()))
}

/// Typed value for raw command-line text.
///
/// Numbers stay numbers on number fields and checkboxes take true/false;
/// everything else is text.
fn parse_input_value(field: &FieldDefinition, raw: &str) -> FieldValue {
    match field.field_type {
        FieldType::Number => match raw.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => formsmith_forms::number_value(n),
            _ => FieldValue::String(raw.to_string()),
        },
        FieldType::Checkbox => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => FieldValue::Bool(true),
            "false" | "no" | "off" | "0" | "" => FieldValue::Bool(false),
            _ => FieldValue::String(raw.to_string()),
        },
        _ => FieldValue::String(raw.to_string()),
    }
}

fn print_session(session: &PreviewSession, submit: bool, format: OutputFormat) {
    let form = session.form();
    let empty = FieldValue::String(String::new());

    if !format.is_table() {
        let report = PreviewReport {
            form: form.id().to_string(),
            values: form
                .fields()
                .iter()
                .map(|f| {
                    let value = session.value(&f.id).unwrap_or(&empty).clone();
                    (f.formula_alias().to_string(), value)
                })
                .collect(),
            errors: form
                .fields()
                .iter()
                .filter_map(|f| {
                    session
                        .error(&f.id)
                        .map(|message| (f.formula_alias().to_string(), message.to_string()))
                })
                .collect(),
            valid: session.errors().is_empty(),
        };
        format.print(&report);
        return;
    }

    println!("{} ({})", form.name().bold(), form.id());
    let rows = form
        .fields()
        .iter()
        .map(|f| ValueRow {
            alias: f.formula_alias().to_string(),
            label: if f.required { format!("{} *", f.label) } else { f.label.clone() },
            value: value_text(session.value(&f.id).unwrap_or(&empty)),
            error: session.error(&f.id).unwrap_or_default().to_string(),
        })
        .collect();
    format.print_rows(rows);

    if submit {
        if session.errors().is_empty() {
            println!("{}", "Form is valid".green());
        } else {
            println!("{}", format!("{} field(s) need attention", session.errors().len()).red());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formsmith_forms::FieldId;
    use serde_json::json;

    fn field(field_type: FieldType) -> FieldDefinition {
        FieldDefinition {
            id: FieldId::from("f"),
            field_type,
            label: "F".into(),
            alias: "f".into(),
            required: false,
            default_value: None,
            validation_rules: None,
            derivation: None,
        }
    }

    #[test]
    fn test_number_fields_take_numbers() {
        let number = field(FieldType::Number);
        assert_eq!(parse_input_value(&number, "42"), json!(42));
        assert_eq!(parse_input_value(&number, " 1.5 "), json!(1.5));
        assert_eq!(parse_input_value(&number, "abc"), json!("abc"));
        assert_eq!(parse_input_value(&number, ""), json!(""));
    }

    #[test]
    fn test_checkbox_and_text() {
        let checkbox = field(FieldType::Checkbox);
        assert_eq!(parse_input_value(&checkbox, "yes"), json!(true));
        assert_eq!(parse_input_value(&checkbox, "off"), json!(false));
        let text = field(FieldType::Text);
        assert_eq!(parse_input_value(&text, "42"), json!("42"));
    }
}
