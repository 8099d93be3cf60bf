use crate::domain::query::{GuardRejection, Stage};
use serde::Serialize;

/// How an error should be presented to whoever asked the question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    /// The request itself was unacceptable (bad input, policy violation).
    ClientInput,
    /// An upstream dependency (the LLM) is unavailable.
    ServiceUnavailable,
    /// The database or this service failed.
    ServerFault,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("LLM error: {0}")]
    LLMError(String),
    #[error("Guard rejection: {0}")]
    GuardRejection(GuardRejection),
    #[error("Query execution failed: {0}")]
    ExecutionError(String),
    #[error("Audit write failed: {0}")]
    AuditWriteError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Cancelled during {0}")]
    Cancelled(Stage),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            AppError::GuardRejection(_) | AppError::ValidationError(_) => {
                ErrorSeverity::ClientInput
            }
            AppError::LLMError(_) => ErrorSeverity::ServiceUnavailable,
            AppError::ExecutionError(_)
            | AppError::AuditWriteError(_)
            | AppError::DatabaseError(_)
            | AppError::ConfigError(_)
            | AppError::Cancelled(_)
            | AppError::Internal(_) => ErrorSeverity::ServerFault,
        }
    }

    /// HTTP-style status code for an outer transport layer.
    pub fn status_code(&self) -> u16 {
        match self {
            // Client closed request.
            AppError::Cancelled(_) => 499,
            _ => match self.severity() {
                ErrorSeverity::ClientInput => 400,
                ErrorSeverity::ServiceUnavailable => 503,
                ErrorSeverity::ServerFault => 500,
            },
        }
    }

    /// The message without the kind prefix added by `Display`.
    pub fn detail(&self) -> String {
        match self {
            AppError::LLMError(msg)
            | AppError::ExecutionError(msg)
            | AppError::AuditWriteError(msg)
            | AppError::ValidationError(msg)
            | AppError::DatabaseError(msg)
            | AppError::ConfigError(msg)
            | AppError::Internal(msg) => msg.clone(),
            AppError::GuardRejection(rejection) => rejection.to_string(),
            AppError::Cancelled(stage) => format!("cancelled during {}", stage),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
