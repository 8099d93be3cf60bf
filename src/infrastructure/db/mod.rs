//! Data store seams used by the query orchestrator, with their Postgres adapters.

pub mod postgres;
pub mod query_logs;

use crate::domain::error::Result;
use crate::domain::query::{QueryRecord, QueryResult};
use async_trait::async_trait;

/// Runs admitted SQL.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, sql: &str) -> Result<QueryResult>;
}

/// Produces the schema text handed to the oracle.
#[async_trait]
pub trait SchemaDescriber: Send + Sync {
    async fn describe_schema(&self) -> Result<String>;
}

/// Append-only log of finished questions.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, record: &QueryRecord) -> Result<()>;
}
