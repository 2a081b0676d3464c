//! Derived-field evaluation engine
//!
//! When a field changes, every field that lists it as a direct parent is
//! recomputed from its formula. The pass is a single walk over the field list
//! in form order:
//!
//! - a derived field whose parent is itself derived sees that parent's new
//!   value only if the parent comes earlier in the list;
//! - there is no dependency graph and no cycle detection, and the pass never
//!   loops, so a cyclic chain just leaves stale values behind.
//!
//! Formulas reference fields by alias. Aliases are replaced by plain text
//! substitution (every occurrence, no word boundaries) before the formula is
//! parsed, so an alias that is a substring of another name in the formula is
//! replaced there too.

use crate::clock::{Clock, SystemClock};
use crate::domain::{format_number, FieldDefinition, FieldId, FieldValue};
use crate::formula;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Current value of every field in a preview session, keyed by field id
pub type FormValues = HashMap<FieldId, FieldValue>;

/// Recomputes derived fields after a change
#[derive(Debug, Default, Clone)]
pub struct DerivationEngine<C = SystemClock> {
    clock: C,
}

impl DerivationEngine {
    pub fn new() -> Self {
        Self { clock: SystemClock }
    }
}

impl<C: Clock> DerivationEngine<C> {
    pub fn with_clock(clock: C) -> Self {
        Self { clock }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Store `new_value` for `changed_id` and recompute its direct dependents.
    pub fn on_field_change(
        &self,
        changed_id: &FieldId,
        new_value: FieldValue,
        fields: &[FieldDefinition],
        mut values: FormValues,
    ) -> FormValues {
        values.insert(changed_id.clone(), new_value);

        for field in fields {
            let Some(derivation) = &field.derivation else {
                continue;
            };
            if derivation.formula.is_empty() || !derivation.depends_on(changed_id) {
                continue;
            }
            let value = self.compute(&derivation.formula, fields, &values);
            debug!(field_id = %field.id, alias = %field.alias, %value, "derived field recomputed");
            values.insert(field.id.clone(), value);
        }

        values
    }

    /// Evaluate one formula against the current values.
    ///
    /// Failures are logged and yield an empty value.
    pub fn compute(&self, formula: &str, fields: &[FieldDefinition], values: &FormValues) -> FieldValue {
        let expression = substitute_aliases(formula, fields, values);
        match formula::evaluate(&expression, &self.clock) {
            Ok(value) => value,
            Err(err) => {
                warn!(%formula, %expression, error = %err, "formula evaluation failed");
                FieldValue::String(String::new())
            }
        }
    }
}

/// Replace every alias in `formula` with its field's current value.
///
/// Fields are applied in list order, each over the text produced by the
/// previous replacement.
pub fn substitute_aliases(formula: &str, fields: &[FieldDefinition], values: &FormValues) -> String {
    let mut expression = formula.to_string();
    for field in fields {
        let alias = field.formula_alias();
        if alias.is_empty() || !expression.contains(alias) {
            continue;
        }
        let literal = formula_literal(values.get(&field.id));
        expression = expression.replace(alias, &literal);
    }
    expression
}

/// Formula text standing for a field value.
///
/// Missing or empty values stand for `0`; numeric text is inserted as a
/// number; any other text becomes a quoted string literal.
pub fn formula_literal(value: Option<&FieldValue>) -> String {
    match value {
        None | Some(FieldValue::Null) => "0".to_string(),
        Some(FieldValue::Bool(b)) => b.to_string(),
        Some(FieldValue::Number(n)) => n
            .as_f64()
            .map(format_number)
            .unwrap_or_else(|| n.to_string()),
        Some(FieldValue::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return "0".to_string();
            }
            match trimmed.parse::<f64>() {
                Ok(n) if n.is_finite() => format_number(n),
                _ => quote(s),
            }
        }
        Some(other) => quote(&other.to_string()),
    }
}

fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::domain::{Derivation, FieldType};
    use chrono::{Duration, TimeZone, Utc};
    use proptest::prelude::*;
    use serde_json::json;

    fn field(id: &str, alias: &str) -> FieldDefinition {
        FieldDefinition {
            id: FieldId::from(id),
            field_type: FieldType::Number,
            label: alias.to_uppercase(),
            alias: alias.to_string(),
            required: false,
            default_value: None,
            validation_rules: None,
            derivation: None,
        }
    }

    fn derived(id: &str, alias: &str, parents: &[&str], formula: &str) -> FieldDefinition {
        FieldDefinition {
            derivation: Some(Derivation::new(
                parents.iter().map(|p| FieldId::from(*p)).collect(),
                formula,
            )),
            ..field(id, alias)
        }
    }

    fn engine() -> DerivationEngine<FixedClock> {
        DerivationEngine::with_clock(FixedClock(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()))
    }

    fn id(s: &str) -> FieldId {
        FieldId::from(s)
    }

    #[test]
    fn test_parent_change_recomputes_dependent() {
        let fields = vec![
            field("1", "price"),
            field("2", "qty"),
            derived("3", "total", &["1", "2"], "price * qty"),
        ];
        let values = engine().on_field_change(&id("1"), json!("2.5"), &fields, FormValues::new());
        assert_eq!(values[&id("3")], json!(0));

        let values = engine().on_field_change(&id("2"), json!(4), &fields, values);
        assert_eq!(values[&id("1")], json!("2.5"));
        assert_eq!(values[&id("3")], json!(10));
    }

    #[test]
    fn test_non_parent_change_leaves_dependent_alone() {
        let fields = vec![
            field("1", "a"),
            field("2", "b"),
            derived("3", "c", &["1"], "a + b"),
        ];
        let values = engine().on_field_change(&id("1"), json!(1), &fields, FormValues::new());
        assert_eq!(values[&id("3")], json!(1));

        let values = engine().on_field_change(&id("2"), json!(100), &fields, values);
        assert_eq!(values[&id("3")], json!(1));
    }

    #[test]
    fn test_chain_follows_field_order() {
        // "double" comes before "quad": one change updates both.
        let ordered = vec![
            field("1", "base"),
            derived("2", "double", &["1"], "base * 2"),
            derived("3", "quad", &["1", "2"], "double * 2"),
        ];
        let values = engine().on_field_change(&id("1"), json!(3), &ordered, FormValues::new());
        assert_eq!(values[&id("2")], json!(6));
        assert_eq!(values[&id("3")], json!(12));

        // Reversed, "quad" reads the old "double" value first.
        let reversed = vec![
            field("1", "base"),
            derived("3", "quad", &["1", "2"], "double * 2"),
            derived("2", "double", &["1"], "base * 2"),
        ];
        let values = engine().on_field_change(&id("1"), json!(3), &reversed, FormValues::new());
        assert_eq!(values[&id("3")], json!(0));
        assert_eq!(values[&id("2")], json!(6));
        let values = engine().on_field_change(&id("1"), json!(5), &reversed, values);
        assert_eq!(values[&id("3")], json!(12));
        assert_eq!(values[&id("2")], json!(10));
    }

    #[test]
    fn test_cycle_terminates() {
        let fields = vec![
            field("0", "seed"),
            derived("1", "ping", &["0", "2"], "pong + 1"),
            derived("2", "pong", &["0", "1"], "ping + 1"),
        ];
        let values = engine().on_field_change(&id("0"), json!(1), &fields, FormValues::new());
        assert_eq!(values[&id("1")], json!(1));
        assert_eq!(values[&id("2")], json!(2));
    }

    #[test]
    fn test_failed_formula_yields_empty_value() {
        let fields = vec![
            field("1", "a"),
            derived("2", "broken", &["1"], "a / 0"),
            derived("3", "fine", &["1"], "a + 1"),
        ];
        let values = engine().on_field_change(&id("1"), json!(2), &fields, FormValues::new());
        assert_eq!(values[&id("2")], json!(""));
        assert_eq!(values[&id("3")], json!(3));
    }

    #[test]
    fn test_dangling_parent_reads_as_zero() {
        let fields = vec![derived("2", "total", &["gone", "1"], "1 + 1"), field("1", "a")];
        let values = engine().on_field_change(&id("1"), json!(5), &fields, FormValues::new());
        assert_eq!(values[&id("2")], json!(2));
    }

    #[test]
    fn test_substitution_is_unanchored() {
        let fields = vec![field("1", "a"), field("2", "ab")];
        let mut values = FormValues::new();
        values.insert(id("1"), json!(1));
        values.insert(id("2"), json!(2));
        // "a" is replaced inside "ab" before "ab" gets a chance.
        assert_eq!(substitute_aliases("ab + a", &fields, &values), "1b + 1");
    }

    #[test]
    fn test_substitution_literals() {
        assert_eq!(formula_literal(None), "0");
        assert_eq!(formula_literal(Some(&json!(""))), "0");
        assert_eq!(formula_literal(Some(&json!("  "))), "0");
        assert_eq!(formula_literal(Some(&FieldValue::Null)), "0");
        assert_eq!(formula_literal(Some(&json!(" 12 "))), "12");
        assert_eq!(formula_literal(Some(&json!(1.5))), "1.5");
        assert_eq!(formula_literal(Some(&json!(true))), "true");
        assert_eq!(formula_literal(Some(&json!("1990-05-01"))), "\"1990-05-01\"");
        assert_eq!(formula_literal(Some(&json!("say \"hi\""))), r#""say \"hi\"""#);
    }

    #[test]
    fn test_age_from_date_of_birth() {
        let engine = engine();
        let fields = vec![
            FieldDefinition {
                field_type: FieldType::Date,
                ..field("dob-id", "dob")
            },
            derived(
                "age-id",
                "age",
                &["dob-id"],
                "Math.floor((new Date() - new Date(dob)) / (1000*60*60*24*365.25))",
            ),
        ];
        let thirty_years_ago = (engine.clock().0 - Duration::days(30 * 365 + 8))
            .format("%Y-%m-%d")
            .to_string();
        let values = engine.on_field_change(&id("dob-id"), json!(thirty_years_ago), &fields, FormValues::new());
        assert_eq!(values[&id("age-id")], json!(30));
    }

    #[test]
    fn test_text_concatenation() {
        let fields = vec![
            field("1", "first"),
            field("2", "last"),
            derived("3", "full", &["1", "2"], "first + ' ' + last"),
        ];
        let mut values = FormValues::new();
        values.insert(id("1"), json!("Ada"));
        let values = engine().on_field_change(&id("2"), json!("Lovelace"), &fields, values);
        assert_eq!(values[&id("3")], json!("Ada Lovelace"));
    }

    proptest! {
        #[test]
        fn prop_sum_tracks_parents(a in -10_000i64..10_000, b in -10_000i64..10_000) {
            let fields = vec![
                field("1", "x"),
                field("2", "y"),
                derived("3", "sum", &["1", "2"], "x + y"),
            ];
            let values = engine().on_field_change(&id("1"), json!(a), &fields, FormValues::new());
            let values = engine().on_field_change(&id("2"), json!(b), &fields, values);
            prop_assert_eq!(&values[&id("3")], &json!(a + b));
        }

        #[test]
        fn prop_unrelated_changes_never_touch_derived(v in any::<i32>(), w in any::<i32>()) {
            let fields = vec![
                field("1", "x"),
                field("2", "y"),
                derived("3", "twice", &["1"], "x * 2"),
            ];
            let values = engine().on_field_change(&id("1"), json!(v), &fields, FormValues::new());
            let before = values[&id("3")].clone();
            let values = engine().on_field_change(&id("2"), json!(w), &fields, values);
            prop_assert_eq!(&values[&id("3")], &before);
        }
    }
}
