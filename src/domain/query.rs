use crate::domain::error::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use validator::Validate;

/// Table the audit log writes to. Generated SQL may never read it.
pub const AUDIT_TABLE: &str = "query_logs";

/// A candidate that passed every admission check.
///
/// Only the guard constructs these, so holding one means the text is a single
/// read-only statement with an explicit row limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmittedStatement {
    sql: String,
    row_cap_applied: bool,
}

impl AdmittedStatement {
    pub(crate) fn new(sql: String, row_cap_applied: bool) -> Self {
        Self {
            sql,
            row_cap_applied,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Whether the guard appended the row cap itself.
    pub fn row_cap_applied(&self) -> bool {
        self.row_cap_applied
    }

    pub fn into_sql(self) -> String {
        self.sql
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum RejectionReason {
    MultipleStatements,
    ForbiddenKeyword(String),
    InvalidSyntax(String),
    NotReadOnly,
    SystemObjectAccess,
    UnboundedLimit,
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::MultipleStatements => write!(f, "multiple statements"),
            RejectionReason::ForbiddenKeyword(verb) => write!(f, "forbidden keyword: {}", verb),
            RejectionReason::InvalidSyntax(msg) => write!(f, "invalid syntax: {}", msg),
            RejectionReason::NotReadOnly => write!(f, "only read queries allowed"),
            RejectionReason::SystemObjectAccess => write!(f, "system object access denied"),
            RejectionReason::UnboundedLimit => write!(f, "unbounded row limit"),
        }
    }
}

/// Why a candidate was refused, plus the piece of text that triggered it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuardRejection {
    pub reason: RejectionReason,
    pub fragment: String,
}

impl GuardRejection {
    pub fn new(reason: RejectionReason, fragment: &str) -> Self {
        Self {
            reason,
            fragment: fragment.to_string(),
        }
    }
}

impl fmt::Display for GuardRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.reason.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardVerdict {
    Admitted(AdmittedStatement),
    Rejected(GuardRejection),
}

impl GuardVerdict {
    pub fn is_admitted(&self) -> bool {
        matches!(self, GuardVerdict::Admitted(_))
    }

    pub fn admitted(&self) -> Option<&AdmittedStatement> {
        match self {
            GuardVerdict::Admitted(statement) => Some(statement),
            GuardVerdict::Rejected(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<&GuardRejection> {
        match self {
            GuardVerdict::Admitted(_) => None,
            GuardVerdict::Rejected(rejection) => Some(rejection),
        }
    }
}

/// Rows returned by the execution backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<HashMap<String, serde_json::Value>>,
    pub row_count: usize,
}

/// Where in the flow a question was when something happened to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Schema,
    Generating,
    RetryGenerating,
    Guarding,
    RetryGuarding,
    Executing,
    RetryExecuting,
}

impl Stage {
    pub fn generating(attempt: u32) -> Self {
        if attempt == 0 {
            Stage::Generating
        } else {
            Stage::RetryGenerating
        }
    }

    pub fn guarding(attempt: u32) -> Self {
        if attempt == 0 {
            Stage::Guarding
        } else {
            Stage::RetryGuarding
        }
    }

    pub fn executing(attempt: u32) -> Self {
        if attempt == 0 {
            Stage::Executing
        } else {
            Stage::RetryExecuting
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Schema => "schema",
            Stage::Generating => "generating",
            Stage::RetryGenerating => "retry_generating",
            Stage::Guarding => "guarding",
            Stage::RetryGuarding => "retry_guarding",
            Stage::Executing => "executing",
            Stage::RetryExecuting => "retry_executing",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    Success,
    SuccessRetry,
    ValidationError,
    ExecutionError,
    LlmError,
    Error,
    Cancelled,
}

impl QueryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryStatus::Success => "success",
            QueryStatus::SuccessRetry => "success_retry",
            QueryStatus::ValidationError => "validation_error",
            QueryStatus::ExecutionError => "execution_error",
            QueryStatus::LlmError => "llm_error",
            QueryStatus::Error => "error",
            QueryStatus::Cancelled => "cancelled",
        }
    }
}

/// Terminal result of one question.
#[derive(Debug)]
pub enum AttemptOutcome {
    Success {
        sql: String,
        result: QueryResult,
        elapsed: Duration,
        attempts: u32,
    },
    RejectedByGuard {
        sql: String,
        rejection: GuardRejection,
    },
    ExecutionFailed {
        sql: String,
        error: AppError,
    },
    OracleFailed {
        error: AppError,
    },
    SchemaUnavailable {
        error: AppError,
    },
    Cancelled {
        stage: Stage,
        sql: Option<String>,
    },
}

impl AttemptOutcome {
    pub fn status(&self) -> QueryStatus {
        match self {
            AttemptOutcome::Success { attempts, .. } if *attempts > 1 => QueryStatus::SuccessRetry,
            AttemptOutcome::Success { .. } => QueryStatus::Success,
            AttemptOutcome::RejectedByGuard { .. } => QueryStatus::ValidationError,
            AttemptOutcome::ExecutionFailed { .. } => QueryStatus::ExecutionError,
            AttemptOutcome::OracleFailed { .. } => QueryStatus::LlmError,
            AttemptOutcome::SchemaUnavailable { .. } => QueryStatus::Error,
            AttemptOutcome::Cancelled { .. } => QueryStatus::Cancelled,
        }
    }

    /// The last SQL text the flow held, if any.
    pub fn sql(&self) -> Option<&str> {
        match self {
            AttemptOutcome::Success { sql, .. }
            | AttemptOutcome::RejectedByGuard { sql, .. }
            | AttemptOutcome::ExecutionFailed { sql, .. } => Some(sql),
            AttemptOutcome::Cancelled { sql, .. } => sql.as_deref(),
            AttemptOutcome::OracleFailed { .. } | AttemptOutcome::SchemaUnavailable { .. } => None,
        }
    }

    pub fn error_message(&self) -> Option<String> {
        match self {
            AttemptOutcome::Success { .. } => None,
            AttemptOutcome::RejectedByGuard { rejection, .. } => Some(rejection.to_string()),
            AttemptOutcome::ExecutionFailed { error, .. }
            | AttemptOutcome::OracleFailed { error }
            | AttemptOutcome::SchemaUnavailable { error } => Some(error.detail()),
            AttemptOutcome::Cancelled { stage, .. } => Some(format!("cancelled during {}", stage)),
        }
    }

    /// Converts the outcome into what a caller of the service gets back.
    pub fn into_response(self) -> Result<QueryResponse> {
        match self {
            AttemptOutcome::Success {
                sql,
                result,
                elapsed,
                ..
            } => Ok(QueryResponse {
                sql,
                results: result.rows,
                columns: result.columns,
                row_count: result.row_count,
                execution_time_ms: elapsed.as_millis() as u64,
            }),
            AttemptOutcome::RejectedByGuard { rejection, .. } => {
                Err(AppError::GuardRejection(rejection))
            }
            AttemptOutcome::ExecutionFailed { error, .. }
            | AttemptOutcome::OracleFailed { error }
            | AttemptOutcome::SchemaUnavailable { error } => Err(error),
            AttemptOutcome::Cancelled { stage, .. } => Err(AppError::Cancelled(stage)),
        }
    }
}

/// One row of the audit log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryRecord {
    pub question: String,
    pub final_sql: String,
    pub status: QueryStatus,
    pub error_message: Option<String>,
    pub execution_time_ms: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl QueryRecord {
    pub fn from_outcome(question: &str, outcome: &AttemptOutcome, elapsed: Option<Duration>) -> Self {
        Self {
            question: question.to_string(),
            final_sql: outcome.sql().unwrap_or_default().to_string(),
            status: outcome.status(),
            error_message: outcome.error_message(),
            execution_time_ms: elapsed.map(|d| d.as_millis() as i64),
            created_at: Utc::now(),
        }
    }

    /// Record for a question whose caller went away before it finished.
    pub fn abandoned(question: &str, last_sql: Option<&str>) -> Self {
        Self {
            question: question.to_string(),
            final_sql: last_sql.unwrap_or_default().to_string(),
            status: QueryStatus::Cancelled,
            error_message: Some("question abandoned by caller".to_string()),
            execution_time_ms: None,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QueryRequest {
    #[validate(length(min = 1, max = 500))]
    pub question: String,
}

impl QueryRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
        }
    }

    pub fn validated(self) -> Result<Self> {
        self.validate()
            .map_err(|e| AppError::ValidationError(e.to_string()))?;
        Ok(self)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub sql: String,
    pub results: Vec<HashMap<String, serde_json::Value>>,
    pub columns: Vec<String>,
    pub row_count: usize,
    pub execution_time_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success(attempts: u32) -> AttemptOutcome {
        AttemptOutcome::Success {
            sql: "SELECT 1 LIMIT 100".to_string(),
            result: QueryResult {
                columns: vec!["?column?".to_string()],
                rows: vec![HashMap::from([(
                    "?column?".to_string(),
                    serde_json::json!(1),
                )])],
                row_count: 1,
            },
            elapsed: Duration::from_millis(42),
            attempts,
        }
    }

    #[test]
    fn test_status_tags() {
        assert_eq!(success(1).status().as_str(), "success");
        assert_eq!(success(2).status().as_str(), "success_retry");
        let oracle = AttemptOutcome::OracleFailed {
            error: AppError::LLMError("LLM request timed out".to_string()),
        };
        assert_eq!(oracle.status().as_str(), "llm_error");
        let cancelled = AttemptOutcome::Cancelled {
            stage: Stage::RetryExecuting,
            sql: Some("SELECT 1".to_string()),
        };
        assert_eq!(cancelled.status().as_str(), "cancelled");
        assert_eq!(cancelled.sql(), Some("SELECT 1"));
    }

    #[test]
    fn test_record_from_rejection() {
        let outcome = AttemptOutcome::RejectedByGuard {
            sql: "DELETE FROM customers".to_string(),
            rejection: GuardRejection::new(
                RejectionReason::ForbiddenKeyword("DELETE".to_string()),
                "DELETE",
            ),
        };
        let record = QueryRecord::from_outcome("remove everyone", &outcome, Some(Duration::from_millis(7)));
        assert_eq!(record.status, QueryStatus::ValidationError);
        assert_eq!(record.final_sql, "DELETE FROM customers");
        assert_eq!(record.error_message.as_deref(), Some("forbidden keyword: DELETE"));
        assert_eq!(record.execution_time_ms, Some(7));
    }

    #[test]
    fn test_into_response_keeps_error_kind() {
        let response = success(1).into_response().unwrap();
        assert_eq!(response.row_count, 1);
        assert_eq!(response.execution_time_ms, 42);

        let failed = AttemptOutcome::ExecutionFailed {
            sql: "SELECT nme FROM customers LIMIT 100".to_string(),
            error: AppError::ExecutionError("column \"nme\" does not exist".to_string()),
        };
        assert!(matches!(
            failed.into_response(),
            Err(AppError::ExecutionError(_))
        ));
    }

    #[test]
    fn test_question_length_validation() {
        assert!(QueryRequest::new("How many customers?").validated().is_ok());
        assert!(matches!(
            QueryRequest::new("").validated(),
            Err(AppError::ValidationError(_))
        ));
        assert!(QueryRequest::new("x".repeat(501)).validated().is_err());
    }
}
