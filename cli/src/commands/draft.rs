//! Draft commands

use super::{FieldRow, Workspace};
use crate::{output::OutputFormat, DraftCommands, FieldArgs};
use colored::Colorize;
use formsmith_forms::{
    DefaultValue, Derivation, FieldDefinition, FieldId, FieldInput, FieldType, FormDefinition, FormDraft,
    ValidationRules,
};

pub fn handle(action: DraftCommands, workspace: &Workspace, format: OutputFormat) -> Result<(), String> {
    let mut draft = workspace.load_draft()?;

    match action {
        DraftCommands::Show => {
            if format.is_table() {
                let name = if draft.name().is_empty() { "(unnamed)" } else { draft.name() };
                println!("Draft: {}", name.bold());
                format.print_rows(FieldRow::from_fields(draft.fields()));
            } else {
                format.print(&draft);
            }
            return Ok(());
        }
        DraftCommands::Name { name } => {
            draft.set_name(name.trim());
            println!("Draft renamed to {}", draft.name());
        }
        DraftCommands::Add(args) => {
            let input = build_input(&draft, FieldInput::default(), args)?;
            let field = draft.add_or_update_field(input).map_err(|e| e.to_string())?;
            println!("Added field {} ({})", field.alias, field.id);
        }
        DraftCommands::Update { id, field } => {
            let existing = find_field(&draft, &id)?.clone();
            let input = build_input(&draft, FieldInput::from(existing), field)?;
            let field = draft.add_or_update_field(input).map_err(|e| e.to_string())?;
            println!("Updated field {} ({})", field.alias, field.id);
        }
        DraftCommands::Remove { id } => {
            let field_id = find_field(&draft, &id)?.id.clone();
            draft.remove_field(&field_id);
            println!("Removed field {}", field_id);
        }
        DraftCommands::Move { from, to } => {
            let len = draft.fields().len();
            if from >= len || to >= len {
                return Err(format!("Position out of range (draft has {} fields)", len));
            }
            draft.reorder(from, to);
            println!("Moved field {} to {}", from, to);
        }
        DraftCommands::Save => {
            let form = save_form(workspace, &mut draft)?;
            println!(
                "{}",
                format!("Saved form {} ({} fields) as {}", form.name(), form.fields().len(), form.id()).green()
            );
            return Ok(());
        }
        DraftCommands::Reset => {
            draft.reset();
            println!("Draft cleared");
        }
    }

    workspace.save_draft(&mut draft)
}

/// Save the draft as a form, then persist the cleared draft.
///
/// The form is already in the library when the draft write fails, so the
/// error names it and tells the user to reset instead of saving again.
fn save_form(workspace: &Workspace, draft: &mut FormDraft) -> Result<FormDefinition, String> {
    let mut library = workspace.library()?;
    let form = library.save_draft(draft).map_err(|e| e.to_string())?;
    workspace.save_draft(draft).map_err(|e| {
        format!(
            "Form {} was saved but the draft could not be cleared ({}); run `formsmith draft reset` before saving again",
            form.id(),
            e
        )
    })?;
    Ok(form)
}

/// Look a field up by id, then by alias.
fn find_field<'a>(draft: &'a FormDraft, reference: &str) -> Result<&'a FieldDefinition, String> {
    draft
        .field(&FieldId::from(reference))
        .or_else(|| draft.field_by_alias(reference))
        .ok_or_else(|| format!("Field not found: {}", reference))
}

/// Overlay command-line flags on `base`.
///
/// Parents may be given by alias or id; names that match no field are kept
/// as ids. An empty `--formula` with no `--parent` makes the field plain.
fn build_input(draft: &FormDraft, base: FieldInput, args: FieldArgs) -> Result<FieldInput, String> {
    let mut input = base;

    if let Some(label) = args.label {
        input.label = label;
    }
    if let Some(alias) = args.alias {
        input.alias = alias;
    }
    if let Some(raw) = args.field_type {
        input.field_type = raw.parse::<FieldType>().map_err(|e| e.to_string())?;
    }
    if let Some(required) = args.required {
        input.required = required;
    }

    let mut rules = input.validation_rules.take().unwrap_or_default();
    if let Some(not_empty) = args.not_empty {
        rules.not_empty = not_empty;
    }
    if args.min_length.is_some() {
        rules.min_length = args.min_length.filter(|&n| n > 0);
    }
    if args.max_length.is_some() {
        rules.max_length = args.max_length.filter(|&n| n > 0);
    }
    if let Some(email) = args.email {
        rules.email = email;
    }
    if let Some(password_rule) = args.password_rule {
        rules.password_rule = password_rule;
    }
    input.validation_rules = if rules == ValidationRules::default() { None } else { Some(rules) };

    if let Some(raw) = args.default {
        input.default_value = parse_default(input.field_type, &raw);
    }

    let clears_derivation = args.parents.is_empty() && args.formula.as_deref().is_some_and(|f| f.trim().is_empty());
    if clears_derivation {
        input.derivation = None;
    } else if !args.parents.is_empty() || args.formula.is_some() {
        let existing = input.derivation.take();
        let parents = if args.parents.is_empty() {
            existing.as_ref().map(|d| d.parent_field_ids.clone()).unwrap_or_default()
        } else {
            args.parents.iter().map(|p| resolve_parent(draft, p)).collect()
        };
        let formula = args
            .formula
            .or_else(|| existing.map(|d| d.formula))
            .unwrap_or_default();
        input.derivation = Some(Derivation::new(parents, formula));
    }

    Ok(input)
}

fn resolve_parent(draft: &FormDraft, reference: &str) -> FieldId {
    match draft.field_by_alias(reference) {
        Some(field) => field.id.clone(),
        None => FieldId::from(reference),
    }
}

fn parse_default(field_type: FieldType, raw: &str) -> Option<DefaultValue> {
    if raw.is_empty() {
        return None;
    }
    match (field_type, raw.trim().parse::<f64>()) {
        (FieldType::Number, Ok(n)) if n.is_finite() => Some(DefaultValue::Number(n)),
        _ => Some(DefaultValue::Text(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft_with_price() -> FormDraft {
        let mut draft = FormDraft::new();
        draft
            .add_or_update_field(FieldInput::new(FieldType::Number, "Price", "price"))
            .unwrap();
        draft
    }

    #[test]
    fn test_add_input_from_flags() {
        let draft = draft_with_price();
        let args = FieldArgs {
            label: Some("Total".into()),
            alias: Some("total".into()),
            field_type: Some("number".into()),
            required: Some(true),
            default: Some("5".into()),
            parents: vec!["price".into(), "legacy-id".into()],
            formula: Some("price * 2".into()),
            ..Default::default()
        };

        let input = build_input(&draft, FieldInput::default(), args).unwrap();
        let price_id = draft.field_by_alias("price").unwrap().id.clone();

        assert_eq!(input.field_type, FieldType::Number);
        assert!(input.required);
        assert_eq!(input.default_value, Some(DefaultValue::Number(5.0)));
        assert_eq!(input.validation_rules, None);
        let derivation = input.derivation.unwrap();
        assert_eq!(derivation.parent_field_ids, vec![price_id, FieldId::from("legacy-id")]);
        assert_eq!(derivation.formula, "price * 2");
    }

    #[test]
    fn test_update_keeps_unset_values() {
        let mut draft = draft_with_price();
        let field = draft
            .add_or_update_field(
                FieldInput::new(FieldType::Text, "Code", "code").with_rules(ValidationRules {
                    min_length: Some(3),
                    ..Default::default()
                }),
            )
            .unwrap();

        let args = FieldArgs {
            max_length: Some(6),
            required: Some(true),
            ..Default::default()
        };
        let input = build_input(&draft, FieldInput::from(field.clone()), args).unwrap();
        assert_eq!(input.id, Some(field.id));
        assert_eq!(input.label, "Code");
        assert!(input.required);
        let rules = input.validation_rules.unwrap();
        assert_eq!(rules.min_length, Some(3));
        assert_eq!(rules.max_length, Some(6));
    }

    #[test]
    fn test_formula_only_update_keeps_parents() {
        let mut draft = draft_with_price();
        let price_id = draft.field_by_alias("price").unwrap().id.clone();
        let total = draft
            .add_or_update_field(
                FieldInput::new(FieldType::Number, "Total", "total").derived(vec![price_id.clone()], "price"),
            )
            .unwrap();

        let args = FieldArgs {
            formula: Some("price * 1.2".into()),
            ..Default::default()
        };
        let input = build_input(&draft, FieldInput::from(total.clone()), args).unwrap();
        assert_eq!(
            input.derivation,
            Some(Derivation::new(vec![price_id], "price * 1.2"))
        );

        let cleared = FieldArgs {
            formula: Some(String::new()),
            ..Default::default()
        };
        let input = build_input(&draft, FieldInput::from(total), cleared).unwrap();
        assert_eq!(input.derivation, None);
    }

    #[test]
    fn test_bad_type_is_reported() {
        let args = FieldArgs {
            field_type: Some("slider".into()),
            ..Default::default()
        };
        let err = build_input(&FormDraft::new(), FieldInput::default(), args).unwrap_err();
        assert!(err.contains("slider"));
    }

    #[test]
    fn test_find_field_by_id_or_alias() {
        let draft = draft_with_price();
        let price = draft.field_by_alias("price").unwrap();
        assert_eq!(find_field(&draft, price.id.as_str()).unwrap().alias, "price");
        assert_eq!(find_field(&draft, "price").unwrap().id, price.id);
        assert!(find_field(&draft, "missing").is_err());
    }

    #[test]
    fn test_save_clears_stored_draft() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::new(dir.path().to_path_buf());
        let mut draft = draft_with_price();
        draft.set_name("Quote");

        let form = save_form(&workspace, &mut draft).unwrap();
        assert_eq!(form.name(), "Quote");
        assert!(workspace.load_draft().unwrap().fields().is_empty());
        assert_eq!(workspace.library().unwrap().forms().len(), 1);
    }

    #[test]
    fn test_failed_draft_write_reports_saved_form() {
        let dir = tempfile::tempdir().unwrap();
        // A non-empty directory where the draft file goes makes the final rename fail.
        let blocker = dir.path().join("draft.json");
        std::fs::create_dir(&blocker).unwrap();
        std::fs::write(blocker.join("keep"), "x").unwrap();
        let workspace = Workspace::new(dir.path().to_path_buf());
        let mut draft = draft_with_price();
        draft.set_name("Quote");

        let err = save_form(&workspace, &mut draft).unwrap_err();
        let library = workspace.library().unwrap();
        assert_eq!(library.forms().len(), 1);
        assert!(err.contains(library.forms()[0].id().as_str()));
        assert!(err.contains("draft reset"));
    }

    #[test]
    fn test_parse_default_by_type() {
        assert_eq!(parse_default(FieldType::Number, "2.5"), Some(DefaultValue::Number(2.5)));
        assert_eq!(
            parse_default(FieldType::Text, "2.5"),
            Some(DefaultValue::Text("2.5".into()))
        );
        assert_eq!(parse_default(FieldType::Number, ""), None);
    }
}
