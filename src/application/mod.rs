pub mod use_cases;

pub use use_cases::audit_service::AuditService;
pub use use_cases::query_orchestrator::{OrchestratorConfig, QueryOrchestrator};
pub use use_cases::sql_generator::{LlmSqlOracle, SqlOracle};
pub use use_cases::sql_guard::{GuardConfig, SqlGuard};
