use super::AuditSink;
use crate::domain::error::{AppError, Result};
use crate::domain::query::QueryRecord;
use async_trait::async_trait;
use sqlx::postgres::PgPool;
use tracing::info;

/// Audit log stored in the `query_logs` table of the queried database
pub struct PostgresAuditLog {
    pool: PgPool,
}

impl PostgresAuditLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn init(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS query_logs (
                id SERIAL PRIMARY KEY,
                question TEXT NOT NULL,
                generated_sql TEXT,
                status VARCHAR(50) NOT NULL,
                error_message TEXT,
                execution_time_ms INTEGER,
                created_at TIMESTAMPTZ DEFAULT now()
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to create query_logs table: {}", e)))?;

        info!("Query logs table initialized");
        Ok(())
    }
}

#[async_trait]
impl AuditSink for PostgresAuditLog {
    async fn record(&self, record: &QueryRecord) -> Result<()> {
        // Durations beyond i32 milliseconds are stored as NULL.
        let execution_time_ms = record
            .execution_time_ms
            .and_then(|ms| i32::try_from(ms).ok());

        sqlx::query(
            "INSERT INTO query_logs
                (question, generated_sql, status, error_message, execution_time_ms, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&record.question)
        .bind(&record.final_sql)
        .bind(record.status.as_str())
        .bind(&record.error_message)
        .bind(execution_time_ms)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::AuditWriteError(format!("Failed to insert query log: {}", e)))?;

        Ok(())
    }
}
