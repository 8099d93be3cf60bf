use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::application::use_cases::query_orchestrator::QueryOrchestrator;
use crate::application::use_cases::sql_generator::LlmSqlOracle;
use crate::application::use_cases::sql_guard::SqlGuard;
use crate::domain::error::Result;
use crate::infrastructure::config::Settings;
use crate::infrastructure::db::postgres::{connect_pool, PostgresBackend, SchemaFilter};
use crate::infrastructure::db::query_logs::PostgresAuditLog;
use crate::infrastructure::llm_clients::{LLMClient, RouterClient};

/// Everything the interfaces need, wired once at startup.
pub struct AppContext {
    pub orchestrator: QueryOrchestrator,
    pub backend: Arc<PostgresBackend>,
}

pub async fn bootstrap(settings: &Settings) -> Result<AppContext> {
    let pool = connect_pool(&settings.database).await?;

    let audit_log = Arc::new(PostgresAuditLog::new(pool.clone()));
    // Questions can still be answered without the audit table.
    if let Err(err) = audit_log.init().await {
        error!(error = %err, "Failed to initialize query logs table");
    }

    let filter = SchemaFilter {
        excluded_tables: settings
            .guard
            .reserved_tables
            .iter()
            .cloned()
            .chain(std::iter::once("pg_stat_statements".to_string()))
            .collect(),
        excluded_prefixes: settings.guard.reserved_prefixes.clone(),
    };
    let backend = Arc::new(PostgresBackend::new(
        pool,
        settings.database.schema.clone(),
        filter,
        Duration::from_millis(settings.orchestrator.execution_timeout_ms),
    ));

    let guard = Arc::new(SqlGuard::new(&settings.guard)?);

    let llm_client: Arc<dyn LLMClient + Send + Sync> = Arc::new(RouterClient::new());
    let oracle = Arc::new(LlmSqlOracle::new(llm_client, settings.llm.clone()));

    let orchestrator = QueryOrchestrator::new(
        oracle,
        backend.clone(),
        backend.clone(),
        audit_log,
        guard.clone(),
        settings.orchestrator.clone(),
    );

    info!(
        model = %settings.llm.model,
        row_cap = guard.row_cap(),
        max_corrections = orchestrator.config().max_corrections,
        execution_timeout_ms = orchestrator.config().execution_timeout_ms,
        "GuardSQL ready"
    );

    Ok(AppContext {
        orchestrator,
        backend,
    })
}
