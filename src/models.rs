#[derive(Debug, Clone)]
pub struct Record {
    pub email_id: String,
    pub recv_from: String,
    pub subject: String,
    pub message: String,
    pub date: i64, // epoch millis, Gmail's internalDate
}

/// One row matched by a rule: Gmail message id plus the store's own id.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct MatchedRecord {
    pub email_id: String,
    pub id: i64,
}
