//! `PostgreSQL` implementation of the `DeadLetterStore` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use skillforge_core::dead_letter::{DeadLetterEntry, DeadLetterQuery, DeadLetterStatus, DeadLetterStore};
use skillforge_core::error::DomainError;
use skillforge_core::event::{DomainEvent, EventType};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

const SELECT_COLUMNS: &str = "id, event_type, event, handler_name, correlation_id, error_message, \
     failed_at, status, retry_count, last_retry_at, resolved_at";

/// PostgreSQL-backed dead-letter store over the `dead_letter_entries` table.
#[derive(Debug, Clone)]
pub struct PgDeadLetterStore {
    pool: PgPool,
}

impl PgDeadLetterStore {
    /// Creates a new `PgDeadLetterStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_error(op: &str, err: &sqlx::Error) -> DomainError {
    DomainError::infrastructure(format!("dead letter {op} failed: {err}"))
}

fn i64_from(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn entry_from_row(row: &PgRow) -> Result<DeadLetterEntry, DomainError> {
    let decode = |e: sqlx::Error| db_error("decode", &e);

    let event_type: String = row.try_get("event_type").map_err(decode)?;
    let status: String = row.try_get("status").map_err(decode)?;
    let Json(event): Json<DomainEvent> = row.try_get("event").map_err(decode)?;
    let retry_count: i32 = row.try_get("retry_count").map_err(decode)?;

    Ok(DeadLetterEntry {
        id: row.try_get("id").map_err(decode)?,
        event_type: event_type.parse::<EventType>()?,
        event,
        handler_name: row.try_get("handler_name").map_err(decode)?,
        correlation_id: row.try_get("correlation_id").map_err(decode)?,
        error_message: row.try_get("error_message").map_err(decode)?,
        failed_at: row.try_get::<DateTime<Utc>, _>("failed_at").map_err(decode)?,
        status: status.parse::<DeadLetterStatus>()?,
        retry_count: u32::try_from(retry_count).unwrap_or_default(),
        last_retry_at: row.try_get("last_retry_at").map_err(decode)?,
        resolved_at: row.try_get("resolved_at").map_err(decode)?,
    })
}

#[async_trait]
impl DeadLetterStore for PgDeadLetterStore {
    async fn insert(&self, entry: &DeadLetterEntry) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO dead_letter_entries \
             (id, event_type, event, handler_name, correlation_id, error_message, \
              failed_at, status, retry_count, last_retry_at, resolved_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(entry.id)
        .bind(entry.event_type.as_str())
        .bind(Json(&entry.event))
        .bind(&entry.handler_name)
        .bind(&entry.correlation_id)
        .bind(&entry.error_message)
        .bind(entry.failed_at)
        .bind(entry.status.as_str())
        .bind(i32::try_from(entry.retry_count).unwrap_or(i32::MAX))
        .bind(entry.last_retry_at)
        .bind(entry.resolved_at)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("insert", &e))?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<DeadLetterEntry>, DomainError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM dead_letter_entries WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("get", &e))?;
        row.as_ref().map(entry_from_row).transpose()
    }

    async fn list(&self, query: &DeadLetterQuery) -> Result<Vec<DeadLetterEntry>, DomainError> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM dead_letter_entries \
             WHERE ($1::TEXT IS NULL OR status = $1) \
               AND ($2::TEXT IS NULL OR event_type = $2) \
             ORDER BY failed_at DESC, id \
             LIMIT $3 OFFSET $4"
        ))
        .bind(query.status.map(DeadLetterStatus::as_str))
        .bind(query.event_type.map(EventType::as_str))
        .bind(i64_from(query.limit))
        .bind(i64_from(query.offset))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list", &e))?;
        rows.iter().map(entry_from_row).collect()
    }

    async fn update(&self, entry: &DeadLetterEntry) -> Result<bool, DomainError> {
        let result = sqlx::query(
            "UPDATE dead_letter_entries \
             SET error_message = $2, status = $3, retry_count = $4, \
                 last_retry_at = $5, resolved_at = $6 \
             WHERE id = $1",
        )
        .bind(entry.id)
        .bind(&entry.error_message)
        .bind(entry.status.as_str())
        .bind(i32::try_from(entry.retry_count).unwrap_or(i32::MAX))
        .bind(entry.last_retry_at)
        .bind(entry.resolved_at)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("update", &e))?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DomainError> {
        let result = sqlx::query("DELETE FROM dead_letter_entries WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("delete", &e))?;
        Ok(result.rows_affected() == 1)
    }

    async fn count_by_status(&self) -> Result<Vec<(DeadLetterStatus, u64)>, DomainError> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS total FROM dead_letter_entries GROUP BY status")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("count", &e))?;

        rows.iter()
            .map(|row| -> Result<(DeadLetterStatus, u64), DomainError> {
                let status: String = row.try_get("status").map_err(|e| db_error("decode", &e))?;
                let total: i64 = row.try_get("total").map_err(|e| db_error("decode", &e))?;
                Ok((status.parse::<DeadLetterStatus>()?, u64::try_from(total).unwrap_or_default()))
            })
            .collect()
    }
}
