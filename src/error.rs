use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid rule file: {0}")]
    RuleFile(#[from] serde_json::Error),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unknown predicate '{0}'")]
    UnknownPredicate(String),

    #[error("Unknown field '{0}'")]
    UnknownField(String),

    #[error("Unknown action '{0}'")]
    UnknownAction(String),

    #[error("Predicate '{predicate}' must be one of {allowed}")]
    UnsupportedPredicate {
        predicate: String,
        allowed: String,
    },

    #[error("Field '{field}' must be one of {allowed}")]
    UnsupportedField { field: String, allowed: String },

    #[error("Field '{field}' expects {expected} value")]
    ValueType {
        field: String,
        expected: &'static str,
    },

    #[error("Day count {0} is out of range")]
    DaysOutOfRange(i64),

    #[error("Composite rule predicate must be 'all' or 'any', got '{0}'")]
    NotComposition(String),

    #[error("'{0}' combines rules and cannot be used inside a field rule")]
    CompositionInFieldRule(String),

    #[error("Composite rule needs at least one rule")]
    EmptyRules,

    #[error("Pass a valid label to move email to")]
    MissingMoveDestination,

    #[error("Chunk size must be between 1 and {max}, got {got}")]
    ChunkSize { got: usize, max: usize },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Error {
    /// True for errors raised while loading or constructing rules, before
    /// any query or network call.
    pub fn is_configuration(&self) -> bool {
        !matches!(self, Error::Database(_))
    }
}
