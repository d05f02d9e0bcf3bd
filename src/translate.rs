use crate::predicate::Criterion;
use crate::rule::CompositeRule;

/// Turns a composite rule into one store criterion: each field rule becomes
/// a leaf in declaration order, joined by the rule's top-level operator.
pub fn translate(rule: &CompositeRule) -> Criterion {
    let leaves = rule
        .rules()
        .iter()
        .map(|r| r.predicate().apply(r.field(), r.value().clone()))
        .collect();
    rule.predicate().apply(leaves)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::{Composition, Field, FieldValue, Predicate};
    use crate::rule::FieldRule;

    #[test]
    fn test_translate_preserves_rule_order() {
        let rule = CompositeRule::new(
            vec![
                FieldRule::string(Predicate::NotContains, Field::Message, "unsubscribe").unwrap(),
                FieldRule::date_from(Predicate::GreaterThan, Field::Date, 1, 1_000_000_000).unwrap(),
                FieldRule::string(Predicate::Equals, Field::RecvFrom, "a@example.com").unwrap(),
            ],
            Composition::Any,
            vec![],
        )
        .unwrap();

        let expected = Criterion::Any(vec![
            Criterion::Compare {
                predicate: Predicate::NotContains,
                field: Field::Message,
                value: FieldValue::Text("unsubscribe".to_string()),
            },
            Criterion::Compare {
                predicate: Predicate::GreaterThan,
                field: Field::Date,
                value: FieldValue::Millis(1_000_000_000 - 86_400_000),
            },
            Criterion::Compare {
                predicate: Predicate::Equals,
                field: Field::RecvFrom,
                value: FieldValue::Text("a@example.com".to_string()),
            },
        ]);
        assert_eq!(translate(&rule), expected);
    }

    #[test]
    fn test_translate_single_rule_all() {
        let rule = CompositeRule::new(
            vec![FieldRule::string(Predicate::Contains, Field::Subject, "x").unwrap()],
            Composition::All,
            vec![],
        )
        .unwrap();
        assert!(matches!(translate(&rule), Criterion::All(ref c) if c.len() == 1));
    }
}
