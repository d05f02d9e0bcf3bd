//! Rule-based Gmail triage: ingest message metadata into SQLite, match it
//! against declarative rules and apply bulk label changes to the matches.

pub mod action;
pub mod auth;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod gmail;
pub mod loader;
pub mod models;
pub mod predicate;
pub mod rule;
pub mod sync;
pub mod translate;

pub use action::Action;
pub use dispatch::{ActionDispatcher, BulkModify, DispatchReport};
pub use error::{Error, Result};
pub use loader::{create_composite_rule, load_rule_file};
pub use rule::{ApplyReport, CompositeRule, FieldRule};
