//! Predicate catalog: named comparison and composition operators, and the
//! criterion tree they produce for the record store.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Record fields a rule may inspect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    RecvFrom,
    Subject,
    Message,
    Date,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::RecvFrom => "recv_from",
            Field::Subject => "subject",
            Field::Message => "message",
            Field::Date => "date",
        }
    }
}

impl FromStr for Field {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "recv_from" => Ok(Field::RecvFrom),
            "subject" => Ok(Field::Subject),
            "message" => Ok(Field::Message),
            "date" => Ok(Field::Date),
            _ => Err(Error::UnknownField(s.to_string())),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Leaf comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    Contains,
    NotContains,
    Equals,
    NotEquals,
    /// `ltndays`: the date is before the threshold (older than N days)
    LessThan,
    /// `gtndays`: the date is after the threshold (newer than N days)
    GreaterThan,
}

/// Top-level operators joining the leaf criteria of a composite rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Composition {
    All,
    Any,
}

/// Every predicate name accepted in a rule file.
pub const PREDICATE_NAMES: &[&str] = &[
    "contains",
    "notcontains",
    "equals",
    "notequals",
    "any",
    "all",
    "ltndays",
    "gtndays",
];

impl Predicate {
    pub fn as_str(&self) -> &'static str {
        match self {
            Predicate::Contains => "contains",
            Predicate::NotContains => "notcontains",
            Predicate::Equals => "equals",
            Predicate::NotEquals => "notequals",
            Predicate::LessThan => "ltndays",
            Predicate::GreaterThan => "gtndays",
        }
    }

    /// Builds the leaf criterion comparing `field` against `value`.
    pub fn apply(self, field: Field, value: FieldValue) -> Criterion {
        Criterion::Compare {
            predicate: self,
            field,
            value,
        }
    }
}

impl FromStr for Predicate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "contains" => Ok(Predicate::Contains),
            "notcontains" => Ok(Predicate::NotContains),
            "equals" => Ok(Predicate::Equals),
            "notequals" => Ok(Predicate::NotEquals),
            "ltndays" => Ok(Predicate::LessThan),
            "gtndays" => Ok(Predicate::GreaterThan),
            "all" | "any" => Err(Error::CompositionInFieldRule(s.to_string())),
            _ => Err(Error::UnknownPredicate(s.to_string())),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Composition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Composition::All => "all",
            Composition::Any => "any",
        }
    }

    /// Joins child criteria into one. Children are kept in order and are all
    /// part of the same query.
    pub fn apply(self, children: Vec<Criterion>) -> Criterion {
        match self {
            Composition::All => Criterion::All(children),
            Composition::Any => Criterion::Any(children),
        }
    }
}

impl FromStr for Composition {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "all" => Ok(Composition::All),
            "any" => Ok(Composition::Any),
            s if PREDICATE_NAMES.contains(&s) => Err(Error::NotComposition(s.to_string())),
            _ => Err(Error::UnknownPredicate(s.to_string())),
        }
    }
}

impl fmt::Display for Composition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operand stored in a field rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    /// Epoch milliseconds, same unit as the stored `date` column
    Millis(i64),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Millis(ms) => write!(f, "{}", ms),
        }
    }
}

/// Store-level filter expression. Rendered to SQL by [`crate::db::Database`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Criterion {
    Compare {
        predicate: Predicate,
        field: Field,
        value: FieldValue,
    },
    /// Conjunction; empty means "match everything"
    All(Vec<Criterion>),
    /// Disjunction; empty means "match nothing"
    Any(Vec<Criterion>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicate_names_parse() {
        for name in PREDICATE_NAMES {
            let leaf = name.parse::<Predicate>();
            let top = name.parse::<Composition>();
            assert!(leaf.is_ok() != top.is_ok(), "{} must be exactly one kind", name);
        }
    }

    #[test]
    fn test_composition_rejects_leaf_name() {
        assert!(matches!(
            "contains".parse::<Composition>(),
            Err(Error::NotComposition(_))
        ));
        assert!(matches!(
            "sometimes".parse::<Composition>(),
            Err(Error::UnknownPredicate(_))
        ));
    }

    #[test]
    fn test_leaf_rejects_composition_name() {
        assert!(matches!(
            "all".parse::<Predicate>(),
            Err(Error::CompositionInFieldRule(_))
        ));
        assert!(matches!(
            "startswith".parse::<Predicate>(),
            Err(Error::UnknownPredicate(_))
        ));
    }

    #[test]
    fn test_compose_keeps_order() {
        let a = Predicate::Contains.apply(Field::Subject, FieldValue::Text("a".into()));
        let b = Predicate::LessThan.apply(Field::Date, FieldValue::Millis(5));
        let joined = Composition::Any.apply(vec![a.clone(), b.clone()]);
        assert_eq!(joined, Criterion::Any(vec![a, b]));
    }

    #[test]
    fn test_unknown_field() {
        assert_eq!("recv_from".parse::<Field>().unwrap(), Field::RecvFrom);
        assert!(matches!("to".parse::<Field>(), Err(Error::UnknownField(_))));
    }
}
