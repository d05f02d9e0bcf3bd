//! Declarative rule files.
//!
//! Loading is two-staged: the JSON document is first deserialized into plain
//! structs that mirror its shape exactly (unknown or missing keys are
//! rejected), then every entry is turned into a validated domain object. Any
//! invalid entry rejects the whole document.

use crate::action::Action;
use crate::error::{Error, Result};
use crate::predicate::{Composition, Field, Predicate};
use crate::rule::{CompositeRule, FieldRule};
use serde::Deserialize;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleFile {
    predicate: String,
    rules: Vec<RuleEntry>,
    actions: Vec<ActionEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleEntry {
    predicate: String,
    field: String,
    value: RuleValue,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RuleValue {
    Days(i64),
    Text(String),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ActionEntry {
    action: String,
    value: String,
}

/// Parses a rule document into a composite rule.
pub fn create_composite_rule(document: &str) -> Result<CompositeRule> {
    let file: RuleFile = serde_json::from_str(document)?;

    // Resolve every name before building any field rule.
    let predicate: Composition = file.predicate.parse()?;
    let mut parsed = Vec::with_capacity(file.rules.len());
    for entry in &file.rules {
        let predicate: Predicate = entry.predicate.parse()?;
        let field: Field = entry.field.parse()?;
        parsed.push((predicate, field, &entry.value));
    }

    let mut actions = Vec::with_capacity(file.actions.len());
    for entry in &file.actions {
        let action = Action::new(&entry.action, Some(&entry.value))?;
        if !matches!(action, Action::Move(_)) && !entry.value.is_empty() {
            warn!(
                "Ignoring value '{}' given to action {}",
                entry.value, entry.action
            );
        }
        actions.push(action);
    }

    let mut rules = Vec::with_capacity(parsed.len());
    for (predicate, field, value) in parsed {
        rules.push(field_rule(predicate, field, value)?);
    }

    CompositeRule::new(rules, predicate, actions)
}

/// Reads and parses a rule file from disk.
pub fn load_rule_file<P: AsRef<Path>>(path: P) -> Result<CompositeRule> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.display().to_string(),
        source,
    })?;
    create_composite_rule(&content)
}

/// `date` goes to the date rule constructor, every other field to the string one.
fn field_rule(predicate: Predicate, field: Field, value: &RuleValue) -> Result<FieldRule> {
    match (field, value) {
        (Field::Date, RuleValue::Days(days)) => FieldRule::date(predicate, field, *days),
        (Field::Date, RuleValue::Text(_)) => Err(Error::ValueType {
            field: field.to_string(),
            expected: "an integer",
        }),
        (_, RuleValue::Text(text)) => FieldRule::string(predicate, field, text.as_str()),
        (_, RuleValue::Days(_)) => Err(Error::ValueType {
            field: field.to_string(),
            expected: "a string",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::FieldValue;
    use crate::rule::RuleKind;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "predicate": "any",
        "rules": [
            { "predicate": "contains", "field": "recv_from", "value": "newsletter" },
            { "predicate": "notequals", "field": "subject", "value": "Keep" },
            { "predicate": "ltndays", "field": "date", "value": 30 }
        ],
        "actions": [
            { "action": "mark_as_read", "value": "" },
            { "action": "move", "value": "Label_12" }
        ]
    }"#;

    #[test]
    fn test_round_trip_counts() {
        let rule = create_composite_rule(SAMPLE).unwrap();
        assert_eq!(rule.rules().len(), 3);
        assert_eq!(rule.predicate(), Composition::Any);
        assert_eq!(rule.actions().len(), 2);
        assert_eq!(rule.actions()[1], Action::Move("Label_12".to_string()));
    }

    #[test]
    fn test_date_field_routed_to_date_rule() {
        let rule = create_composite_rule(SAMPLE).unwrap();
        let date = &rule.rules()[2];
        assert_eq!(date.kind(), RuleKind::Date);
        assert_eq!(date.predicate(), Predicate::LessThan);
        assert!(matches!(date.value(), FieldValue::Millis(_)));
        assert_eq!(rule.rules()[0].kind(), RuleKind::String);
    }

    #[test]
    fn test_missing_top_level_keys() {
        for missing in [
            r#"{ "rules": [], "actions": [] }"#,
            r#"{ "predicate": "all", "actions": [] }"#,
            r#"{ "predicate": "all", "rules": [] }"#,
        ] {
            let err = create_composite_rule(missing).unwrap_err();
            assert!(matches!(err, Error::RuleFile(_)), "{}", missing);
            assert!(err.is_configuration());
        }
    }

    #[test]
    fn test_extra_keys_rejected_at_every_level() {
        let top = r#"{ "predicate": "all", "rules": [
            { "predicate": "contains", "field": "subject", "value": "x" }
        ], "actions": [], "name": "extra" }"#;
        let rule = r#"{ "predicate": "all", "rules": [
            { "predicate": "contains", "field": "subject", "value": "x", "case": "ignore" }
        ], "actions": [] }"#;
        let action = r#"{ "predicate": "all", "rules": [
            { "predicate": "contains", "field": "subject", "value": "x" }
        ], "actions": [ { "action": "mark_as_read", "value": "", "when": "now" } ] }"#;
        for doc in [top, rule, action] {
            assert!(matches!(
                create_composite_rule(doc),
                Err(Error::RuleFile(_))
            ));
        }
    }

    #[test]
    fn test_action_value_key_required() {
        let doc = r#"{ "predicate": "all", "rules": [
            { "predicate": "contains", "field": "subject", "value": "x" }
        ], "actions": [ { "action": "mark_as_read" } ] }"#;
        assert!(matches!(create_composite_rule(doc), Err(Error::RuleFile(_))));
    }

    #[test]
    fn test_unknown_names() {
        let predicate = r#"{ "predicate": "all", "rules": [
            { "predicate": "resembles", "field": "subject", "value": "x" }
        ], "actions": [] }"#;
        assert!(matches!(
            create_composite_rule(predicate),
            Err(Error::UnknownPredicate(_))
        ));

        let field = r#"{ "predicate": "all", "rules": [
            { "predicate": "contains", "field": "cc", "value": "x" }
        ], "actions": [] }"#;
        assert!(matches!(
            create_composite_rule(field),
            Err(Error::UnknownField(_))
        ));

        let action = r#"{ "predicate": "all", "rules": [
            { "predicate": "contains", "field": "subject", "value": "x" }
        ], "actions": [ { "action": "delete", "value": "" } ] }"#;
        assert!(matches!(
            create_composite_rule(action),
            Err(Error::UnknownAction(_))
        ));
    }

    #[test]
    fn test_unknown_action_reported_before_rule_errors() {
        let doc = r#"{ "predicate": "all", "rules": [
            { "predicate": "ltndays", "field": "date", "value": "soon" }
        ], "actions": [ { "action": "archive", "value": "" } ] }"#;
        assert!(matches!(
            create_composite_rule(doc),
            Err(Error::UnknownAction(_))
        ));
    }

    #[test]
    fn test_huge_day_count_rejected() {
        let doc = r#"{ "predicate": "all", "rules": [
            { "predicate": "ltndays", "field": "date", "value": 200000000000000 }
        ], "actions": [] }"#;
        let err = create_composite_rule(doc).unwrap_err();
        assert!(matches!(err, Error::DaysOutOfRange(200_000_000_000_000)));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_leaf_predicate_at_top_level() {
        let doc = r#"{ "predicate": "contains", "rules": [
            { "predicate": "contains", "field": "subject", "value": "x" }
        ], "actions": [] }"#;
        assert!(matches!(
            create_composite_rule(doc),
            Err(Error::NotComposition(_))
        ));
    }

    #[test]
    fn test_value_type_mismatch() {
        let text_date = r#"{ "predicate": "all", "rules": [
            { "predicate": "ltndays", "field": "date", "value": "3" }
        ], "actions": [] }"#;
        assert!(matches!(
            create_composite_rule(text_date),
            Err(Error::ValueType { .. })
        ));

        let number_subject = r#"{ "predicate": "all", "rules": [
            { "predicate": "contains", "field": "subject", "value": 3 }
        ], "actions": [] }"#;
        assert!(matches!(
            create_composite_rule(number_subject),
            Err(Error::ValueType { .. })
        ));
    }

    #[test]
    fn test_predicate_not_allowed_for_field() {
        let doc = r#"{ "predicate": "all", "rules": [
            { "predicate": "contains", "field": "date", "value": 3 }
        ], "actions": [] }"#;
        assert!(matches!(
            create_composite_rule(doc),
            Err(Error::UnsupportedPredicate { .. })
        ));
    }

    #[test]
    fn test_move_without_destination() {
        let doc = r#"{ "predicate": "all", "rules": [
            { "predicate": "contains", "field": "subject", "value": "x" }
        ], "actions": [ { "action": "move", "value": "" } ] }"#;
        assert!(matches!(
            create_composite_rule(doc),
            Err(Error::MissingMoveDestination)
        ));
    }

    #[test]
    fn test_empty_rules() {
        let doc = r#"{ "predicate": "all", "rules": [], "actions": [] }"#;
        assert!(matches!(create_composite_rule(doc), Err(Error::EmptyRules)));
    }

    #[test]
    fn test_load_rule_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let rule = load_rule_file(file.path()).unwrap();
        assert_eq!(rule.rules().len(), 3);

        assert!(matches!(
            load_rule_file("/nonexistent/rules.json"),
            Err(Error::Io { .. })
        ));
    }

    #[test]
    fn test_demo_rules_load() {
        let rule = load_rule_file(concat!(env!("CARGO_MANIFEST_DIR"), "/demos/rules.json")).unwrap();
        assert_eq!(rule.rules().len(), 3);
        assert_eq!(rule.predicate(), Composition::All);
        assert_eq!(rule.actions().len(), 2);
    }
}
