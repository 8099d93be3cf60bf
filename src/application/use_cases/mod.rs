pub mod audit_service;
pub mod query_orchestrator;
pub mod sql_generator;
pub mod sql_guard;
