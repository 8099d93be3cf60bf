//! PostgreSQL execution backend
//!
//! Runs admitted statements and describes the schema for the oracle.
//! - Every statement runs inside a `READ ONLY` transaction that is rolled back
//! - The server aborts statements that outlive the execution timeout
//! - Column values are converted to JSON by probing the common Postgres types
//! - Column names are reported even when no rows come back

use super::{QueryExecutor, SchemaDescriber};
use crate::domain::error::{AppError, Result};
use crate::domain::query::QueryResult;
use crate::infrastructure::config::DatabaseSettings;
use async_trait::async_trait;
use bigdecimal::{BigDecimal, ToPrimitive};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Column, Executor, Row, Statement};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::{error, info, warn};

const SCHEMA_QUERY: &str = r#"
    SELECT
        c.table_name::text AS table_name,
        c.column_name::text AS column_name,
        c.data_type::text AS data_type
    FROM information_schema.columns c
    JOIN information_schema.tables t
        ON t.table_schema = c.table_schema
        AND t.table_name = c.table_name
    WHERE c.table_schema = $1
        AND t.table_type IN ('BASE TABLE', 'VIEW')
    ORDER BY c.table_name, c.ordinal_position
"#;

/// Tables the schema description leaves out
#[derive(Debug, Clone, Default)]
pub struct SchemaFilter {
    pub excluded_tables: Vec<String>,
    pub excluded_prefixes: Vec<String>,
}

impl SchemaFilter {
    pub fn includes(&self, table: &str) -> bool {
        let table = table.to_lowercase();
        !self
            .excluded_tables
            .iter()
            .any(|t| t.eq_ignore_ascii_case(&table))
            && !self
                .excluded_prefixes
                .iter()
                .any(|p| table.starts_with(&p.to_lowercase()))
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct SchemaColumnEntity {
    table_name: String,
    column_name: String,
    data_type: String,
}

/// Open the shared connection pool
pub async fn connect_pool(settings: &DatabaseSettings) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(settings.idle_timeout_secs))
        .connect(&settings.url)
        .await
        .map_err(|e| {
            error!("Failed to connect to PostgreSQL: {}", e);
            AppError::DatabaseError(format!("Failed to connect to PostgreSQL: {}", e))
        })?;

    info!(
        max_connections = settings.max_connections,
        "Created PostgreSQL connection pool"
    );
    Ok(pool)
}

pub struct PostgresBackend {
    pool: PgPool,
    schema: String,
    filter: SchemaFilter,
    statement_timeout: Duration,
}

impl PostgresBackend {
    pub fn new(
        pool: PgPool,
        schema: impl Into<String>,
        filter: SchemaFilter,
        statement_timeout: Duration,
    ) -> Self {
        Self {
            pool,
            schema: schema.into(),
            filter,
            statement_timeout,
        }
    }

    pub async fn check_health(&self) -> bool {
        match sqlx::query("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => true,
            Err(e) => {
                error!("Database health check failed: {}", e);
                false
            }
        }
    }

    /// Extract a column value from a row as serde_json::Value
    fn extract_column_value(row: &PgRow, index: usize) -> serde_json::Value {
        if let Ok(v) = row.try_get::<Option<String>, _>(index) {
            return v
                .map(serde_json::Value::String)
                .unwrap_or(serde_json::Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
            return v
                .map(|n| serde_json::Value::Number(n.into()))
                .unwrap_or(serde_json::Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<i32>, _>(index) {
            return v
                .map(|n| serde_json::Value::Number(n.into()))
                .unwrap_or(serde_json::Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<i16>, _>(index) {
            return v
                .map(|n| serde_json::Value::Number(n.into()))
                .unwrap_or(serde_json::Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
            return v
                .and_then(serde_json::Number::from_f64)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<f32>, _>(index) {
            return v
                .and_then(|n| serde_json::Number::from_f64(n as f64))
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<BigDecimal>, _>(index) {
            // Fall back to text when the value does not fit an f64.
            return v
                .map(|d| {
                    d.to_f64()
                        .and_then(serde_json::Number::from_f64)
                        .map(serde_json::Value::Number)
                        .unwrap_or_else(|| serde_json::Value::String(d.to_string()))
                })
                .unwrap_or(serde_json::Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<bool>, _>(index) {
            return v
                .map(serde_json::Value::Bool)
                .unwrap_or(serde_json::Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(index) {
            return v
                .map(|dt| serde_json::Value::String(dt.to_rfc3339()))
                .unwrap_or(serde_json::Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<chrono::NaiveDateTime>, _>(index) {
            return v
                .map(|dt| serde_json::Value::String(dt.to_string()))
                .unwrap_or(serde_json::Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<chrono::NaiveDate>, _>(index) {
            return v
                .map(|d| serde_json::Value::String(d.to_string()))
                .unwrap_or(serde_json::Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<chrono::NaiveTime>, _>(index) {
            return v
                .map(|t| serde_json::Value::String(t.to_string()))
                .unwrap_or(serde_json::Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<uuid::Uuid>, _>(index) {
            return v
                .map(|id| serde_json::Value::String(id.to_string()))
                .unwrap_or(serde_json::Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<serde_json::Value>, _>(index) {
            return v.unwrap_or(serde_json::Value::Null);
        }

        // Default to null for unsupported types
        serde_json::Value::Null
    }
}

/// The database's own message, which is what the oracle needs to correct itself.
fn database_message(err: &sqlx::Error) -> String {
    match err {
        sqlx::Error::Database(db) => db.message().to_string(),
        other => other.to_string(),
    }
}

/// `SET LOCAL` takes no bind parameters. Zero would disable the timeout.
fn statement_timeout_sql(limit: Duration) -> String {
    format!("SET LOCAL statement_timeout = {}", limit.as_millis().max(1))
}

/// Render columns as `Table: <name>` blocks separated by blank lines.
fn format_schema<'a>(columns: impl IntoIterator<Item = (&'a str, &'a str, &'a str)>) -> String {
    let mut tables: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for (table, column, data_type) in columns {
        tables
            .entry(table)
            .or_default()
            .push(format!("  {} {}", column, data_type));
    }

    tables
        .into_iter()
        .map(|(table, cols)| format!("Table: {}\n{}", table, cols.join("\n")))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[async_trait]
impl QueryExecutor for PostgresBackend {
    async fn execute(&self, sql: &str) -> Result<QueryResult> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::ExecutionError(database_message(&e)))?;

        sqlx::query("SET TRANSACTION READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::ExecutionError(database_message(&e)))?;

        // Dropping the client future alone leaves the query running on the server.
        sqlx::query(&statement_timeout_sql(self.statement_timeout))
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::ExecutionError(database_message(&e)))?;

        // Dropping the transaction on an error path rolls it back.
        let rows = sqlx::query(sql)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| AppError::ExecutionError(database_message(&e)))?;

        let columns: Vec<String> = match rows.first() {
            Some(row) => row.columns().iter().map(|c| c.name().to_string()).collect(),
            None => {
                let statement = (&mut *tx)
                    .prepare(sql)
                    .await
                    .map_err(|e| AppError::ExecutionError(database_message(&e)))?;
                statement
                    .columns()
                    .iter()
                    .map(|c| c.name().to_string())
                    .collect()
            }
        };

        if let Err(e) = tx.rollback().await {
            warn!("Failed to roll back read-only transaction: {}", e);
        }

        let mut rows_json: Vec<HashMap<String, serde_json::Value>> = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut row_map = HashMap::new();
            for (i, column) in row.columns().iter().enumerate() {
                row_map.insert(column.name().to_string(), Self::extract_column_value(row, i));
            }
            rows_json.push(row_map);
        }

        info!(rows = rows_json.len(), "Query executed");

        Ok(QueryResult {
            columns,
            row_count: rows_json.len(),
            rows: rows_json,
        })
    }
}

#[async_trait]
impl SchemaDescriber for PostgresBackend {
    async fn describe_schema(&self) -> Result<String> {
        let columns = sqlx::query_as::<_, SchemaColumnEntity>(SCHEMA_QUERY)
            .bind(&self.schema)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to describe schema: {}", e)))?;

        let description = format_schema(
            columns
                .iter()
                .filter(|c| self.filter.includes(&c.table_name))
                .map(|c| {
                    (
                        c.table_name.as_str(),
                        c.column_name.as_str(),
                        c.data_type.as_str(),
                    )
                }),
        );

        if description.is_empty() {
            warn!(schema = %self.schema, "Schema description is empty");
        }
        Ok(description)
    }
}
