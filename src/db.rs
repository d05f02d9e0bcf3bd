use crate::error::Result;
use crate::models;
use crate::predicate::{Criterion, Field, FieldValue, Predicate};
use sqlx::{QueryBuilder, Row, Sqlite, sqlite::SqlitePool};

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
        use std::str::FromStr;

        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        // A single long-lived connection: one caller per run, and in-memory
        // databases live only as long as their connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<()> {
        let schema = include_str!("../schema.sql");
        sqlx::query(schema).execute(&self.pool).await?;
        Ok(())
    }

    /// Stores a record unless one with the same Gmail id exists. Returns
    /// whether a row was inserted.
    pub async fn insert_record(&self, record: &models::Record) -> Result<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO emails
             (email_id, recv_from, subject, message, date,
              recv_from_folded, subject_folded, message_folded)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.email_id)
        .bind(&record.recv_from)
        .bind(&record.subject)
        .bind(&record.message)
        .bind(record.date)
        .bind(record.recv_from.to_lowercase())
        .bind(record.subject.to_lowercase())
        .bind(record.message.to_lowercase())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn record_exists(&self, email_id: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM emails WHERE email_id = ?")
            .bind(email_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn count_records(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) FROM emails")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get(0))
    }

    /// Runs `criterion` as a single query and returns the matching rows in
    /// ascending store id order.
    pub async fn find_matching(&self, criterion: &Criterion) -> Result<Vec<models::MatchedRecord>> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT email_id, id FROM emails WHERE ");
        push_criterion(&mut query, criterion);
        query.push(" ORDER BY id ASC");

        let matched = query
            .build_query_as::<models::MatchedRecord>()
            .fetch_all(&self.pool)
            .await?;
        Ok(matched)
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

fn push_criterion(query: &mut QueryBuilder<'_, Sqlite>, criterion: &Criterion) {
    match criterion {
        Criterion::Compare {
            predicate,
            field,
            value,
        } => {
            let column = field.as_str();
            match predicate {
                Predicate::Contains | Predicate::NotContains => {
                    query.push(folded_column(*field));
                    if *predicate == Predicate::NotContains {
                        query.push(" NOT");
                    }
                    query.push(" LIKE ");
                    query.push_bind(like_pattern(&value.to_string().to_lowercase()));
                    query.push(" ESCAPE '\\'");
                }
                Predicate::Equals => {
                    query.push(column).push(" = ");
                    push_value(query, value);
                }
                Predicate::NotEquals => {
                    query.push("NOT (").push(column).push(" = ");
                    push_value(query, value);
                    query.push(")");
                }
                Predicate::LessThan => {
                    query.push(column).push(" < ");
                    push_value(query, value);
                }
                Predicate::GreaterThan => {
                    query.push(column).push(" > ");
                    push_value(query, value);
                }
            }
        }
        Criterion::All(children) => push_joined(query, children, " AND ", "1 = 1"),
        Criterion::Any(children) => push_joined(query, children, " OR ", "1 = 0"),
    }
}

fn push_joined(
    query: &mut QueryBuilder<'_, Sqlite>,
    children: &[Criterion],
    separator: &str,
    empty: &str,
) {
    if children.is_empty() {
        query.push(empty);
        return;
    }
    query.push("(");
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            query.push(separator);
        }
        push_criterion(query, child);
    }
    query.push(")");
}

fn push_value(query: &mut QueryBuilder<'_, Sqlite>, value: &FieldValue) {
    match value {
        FieldValue::Text(text) => {
            query.push_bind(text.clone());
        }
        FieldValue::Millis(ms) => {
            query.push_bind(*ms);
        }
    }
}

/// Lowercased copy of a text column, filled at insert.
fn folded_column(field: Field) -> &'static str {
    match field {
        Field::RecvFrom => "recv_from_folded",
        Field::Subject => "subject_folded",
        Field::Message => "message_folded",
        Field::Date => "date",
    }
}

/// `%value%` with LIKE wildcards in `value` matched literally.
fn like_pattern(value: &str) -> String {
    let mut pattern = String::with_capacity(value.len() + 2);
    pattern.push('%');
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
