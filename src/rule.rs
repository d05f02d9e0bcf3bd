//! Field rules, composite rules and their execution against the store.

use crate::action::Action;
use crate::db::Database;
use crate::dispatch::{ActionDispatcher, BulkModify, DispatchReport};
use crate::error::{Error, Result};
use crate::models::MatchedRecord;
use crate::predicate::{Composition, Field, FieldValue, Predicate};
use crate::translate;
use chrono::{Local, NaiveTime};
use tracing::{info, warn};

pub const MILLIS_PER_DAY: i64 = 86_400_000;

const STRING_PREDICATES: &[Predicate] = &[
    Predicate::Contains,
    Predicate::NotContains,
    Predicate::Equals,
    Predicate::NotEquals,
];
const STRING_FIELDS: &[Field] = &[Field::RecvFrom, Field::Subject, Field::Message];

const DATE_PREDICATES: &[Predicate] = &[Predicate::LessThan, Predicate::GreaterThan];
const DATE_FIELDS: &[Field] = &[Field::Date];

/// The two leaf rule kinds and their whitelists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    String,
    Date,
}

impl RuleKind {
    pub fn predicates(&self) -> &'static [Predicate] {
        match self {
            RuleKind::String => STRING_PREDICATES,
            RuleKind::Date => DATE_PREDICATES,
        }
    }

    pub fn fields(&self) -> &'static [Field] {
        match self {
            RuleKind::String => STRING_FIELDS,
            RuleKind::Date => DATE_FIELDS,
        }
    }

    fn check(&self, predicate: Predicate, field: Field) -> Result<()> {
        if !self.predicates().contains(&predicate) {
            return Err(Error::UnsupportedPredicate {
                predicate: predicate.to_string(),
                allowed: list(self.predicates()),
            });
        }
        if !self.fields().contains(&field) {
            return Err(Error::UnsupportedField {
                field: field.to_string(),
                allowed: list(self.fields()),
            });
        }
        Ok(())
    }
}

fn list<T: std::fmt::Display>(items: &[T]) -> String {
    let names: Vec<String> = items.iter().map(|i| i.to_string()).collect();
    format!("[{}]", names.join(", "))
}

/// One validated leaf condition. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRule {
    kind: RuleKind,
    predicate: Predicate,
    field: Field,
    value: FieldValue,
}

impl FieldRule {
    /// Condition on a text field.
    pub fn string(predicate: Predicate, field: Field, value: impl Into<String>) -> Result<Self> {
        RuleKind::String.check(predicate, field)?;
        Ok(Self {
            kind: RuleKind::String,
            predicate,
            field,
            value: FieldValue::Text(value.into()),
        })
    }

    /// Condition on the message date, `days` counted back from the start of
    /// today in local time.
    pub fn date(predicate: Predicate, field: Field, days: i64) -> Result<Self> {
        Self::date_from(predicate, field, days, local_midnight_millis())
    }

    /// Like [`FieldRule::date`] with an explicit "start of today".
    pub fn date_from(predicate: Predicate, field: Field, days: i64, midnight_ms: i64) -> Result<Self> {
        RuleKind::Date.check(predicate, field)?;
        if days < 0 {
            return Err(Error::ValueType {
                field: field.to_string(),
                expected: "a non-negative number of days",
            });
        }
        let threshold = days
            .checked_mul(MILLIS_PER_DAY)
            .and_then(|span| midnight_ms.checked_sub(span))
            .ok_or(Error::DaysOutOfRange(days))?;
        Ok(Self {
            kind: RuleKind::Date,
            predicate,
            field,
            value: FieldValue::Millis(threshold),
        })
    }

    pub fn kind(&self) -> RuleKind {
        self.kind
    }

    pub fn predicate(&self) -> Predicate {
        self.predicate
    }

    pub fn field(&self) -> Field {
        self.field
    }

    pub fn value(&self) -> &FieldValue {
        &self.value
    }
}

/// Epoch millis of today's local midnight.
pub fn local_midnight_millis() -> i64 {
    let today = Local::now().date_naive().and_time(NaiveTime::MIN);
    match today.and_local_timezone(Local).earliest() {
        Some(midnight) => midnight.timestamp_millis(),
        // Midnight skipped by a DST jump; fall back to reading it as UTC.
        None => today.and_utc().timestamp_millis(),
    }
}

/// Rules joined by one composition operator, plus the actions to run on
/// whatever they match.
#[derive(Debug, Clone)]
pub struct CompositeRule {
    rules: Vec<FieldRule>,
    predicate: Composition,
    actions: Vec<Action>,
}

impl CompositeRule {
    pub fn new(rules: Vec<FieldRule>, predicate: Composition, actions: Vec<Action>) -> Result<Self> {
        if rules.is_empty() {
            return Err(Error::EmptyRules);
        }
        Ok(Self {
            rules,
            predicate,
            actions,
        })
    }

    pub fn rules(&self) -> &[FieldRule] {
        &self.rules
    }

    pub fn predicate(&self) -> Composition {
        self.predicate
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Matching records, read-only.
    pub async fn execute(&self, db: &Database) -> Result<Vec<MatchedRecord>> {
        let criterion = translate::translate(self);
        db.find_matching(&criterion).await
    }

    /// Executes the rule, then runs every action in order over the full
    /// match list. Failed chunks are reported, not raised.
    pub async fn apply<C: BulkModify>(
        &self,
        db: &Database,
        dispatcher: &ActionDispatcher<C>,
    ) -> Result<ApplyReport> {
        let matched = self.execute(db).await?;
        let ids: Vec<String> = matched.into_iter().map(|m| m.email_id).collect();
        info!(
            "Rule matched {} message(s), running {} action(s)",
            ids.len(),
            self.actions.len()
        );

        let mut actions = Vec::with_capacity(self.actions.len());
        for action in &self.actions {
            let report = dispatcher.dispatch(action, &ids).await;
            if !report.is_success() {
                warn!(
                    "Action {} failed on {} of {} chunk(s)",
                    action,
                    report.failed_chunks().count(),
                    report.chunks.len()
                );
            }
            actions.push(report);
        }

        Ok(ApplyReport {
            matched: ids.len(),
            actions,
        })
    }
}

/// Outcome of [`CompositeRule::apply`].
#[derive(Debug, Clone)]
pub struct ApplyReport {
    pub matched: usize,
    pub actions: Vec<DispatchReport>,
}

impl ApplyReport {
    pub fn is_success(&self) -> bool {
        self.actions.iter().all(|a| a.is_success())
    }
}
