//! Query Orchestrator
//!
//! Drives one question through schema lookup, SQL generation, admission,
//! execution and at most `max_corrections` corrective retries, then writes
//! exactly one audit record for it.
//!
//! The flow is an explicit state machine advanced by [`QueryOrchestrator::step`].
//! Every wait on a collaborator carries its own timeout and can be cut short
//! by a [`CancellationToken`].


use crate::application::use_cases::audit_service::{AuditService, PendingAudit};
use crate::application::use_cases::sql_generator::SqlOracle;
use crate::application::use_cases::sql_guard::SqlGuard;
use crate::domain::error::{AppError, Result};
use crate::domain::query::{AdmittedStatement, AttemptOutcome, GuardVerdict, QueryRecord, Stage};
use crate::infrastructure::db::{AuditSink, QueryExecutor, SchemaDescriber};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;
use validator::Validate;

fn default_max_corrections() -> u32 {
    1
}

fn default_oracle_timeout_ms() -> u64 {
    60_000
}

fn default_execution_timeout_ms() -> u64 {
    30_000
}

fn default_schema_timeout_ms() -> u64 {
    10_000
}

fn default_audit_timeout_ms() -> u64 {
    5_000
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct OrchestratorConfig {
    /// Regenerations allowed after an execution failure
    #[serde(default = "default_max_corrections")]
    #[validate(range(max = 3))]
    pub max_corrections: u32,
    #[serde(default = "default_oracle_timeout_ms")]
    #[validate(range(min = 1, max = 600000))]
    pub oracle_timeout_ms: u64,
    #[serde(default = "default_execution_timeout_ms")]
    #[validate(range(min = 1, max = 600000))]
    pub execution_timeout_ms: u64,
    #[serde(default = "default_schema_timeout_ms")]
    #[validate(range(min = 1, max = 600000))]
    pub schema_timeout_ms: u64,
    #[serde(default = "default_audit_timeout_ms")]
    #[validate(range(min = 1, max = 600000))]
    pub audit_timeout_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_corrections: default_max_corrections(),
            oracle_timeout_ms: default_oracle_timeout_ms(),
            execution_timeout_ms: default_execution_timeout_ms(),
            schema_timeout_ms: default_schema_timeout_ms(),
            audit_timeout_ms: default_audit_timeout_ms(),
        }
    }
}

enum FlowState {
    Start,
    Generating {
        attempt: u32,
        error_context: Option<String>,
    },
    Guarding {
        attempt: u32,
        candidate: String,
    },
    Executing {
        attempt: u32,
        statement: AdmittedStatement,
    },
    Finished(AttemptOutcome),
}

/// Per-question scratch data that outlives individual states.
struct Flow<'a> {
    question: &'a str,
    schema: String,
    started: Option<Instant>,
}

impl Flow<'_> {
    /// Time since generation first began.
    fn elapsed(&self) -> Option<Duration> {
        self.started.map(|s| s.elapsed())
    }
}

enum StageError {
    Failed(AppError),
    Cancelled,
}

pub struct QueryOrchestrator {
    oracle: Arc<dyn SqlOracle>,
    executor: Arc<dyn QueryExecutor>,
    schema: Arc<dyn SchemaDescriber>,
    guard: Arc<SqlGuard>,
    audit: AuditService,
    config: OrchestratorConfig,
}

impl QueryOrchestrator {
    pub fn new(
        oracle: Arc<dyn SqlOracle>,
        executor: Arc<dyn QueryExecutor>,
        schema: Arc<dyn SchemaDescriber>,
        audit_sink: Arc<dyn AuditSink>,
        guard: Arc<SqlGuard>,
        config: OrchestratorConfig,
    ) -> Self {
        let audit = AuditService::new(audit_sink, Duration::from_millis(config.audit_timeout_ms));
        Self {
            oracle,
            executor,
            schema,
            guard,
            audit,
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Answer one question.
    pub async fn process(&self, question: &str) -> AttemptOutcome {
        self.process_with_cancellation(question, &CancellationToken::new())
            .await
    }

    /// Answer one question, giving up as soon as `cancel` fires.
    pub async fn process_with_cancellation(
        &self,
        question: &str,
        cancel: &CancellationToken,
    ) -> AttemptOutcome {
        let request_id = Uuid::new_v4();
        self.run(question, cancel)
            .instrument(info_span!("query", %request_id))
            .await
    }

    async fn run(&self, question: &str, cancel: &CancellationToken) -> AttemptOutcome {
        let mut pending = self.audit.begin(question);
        let mut flow = Flow {
            question,
            schema: String::new(),
            started: None,
        };

        let mut state = FlowState::Start;
        let outcome = loop {
            state = match state {
                FlowState::Finished(outcome) => break outcome,
                state => self.step(state, &mut flow, cancel, &mut pending).await,
            };
        };

        let record = QueryRecord::from_outcome(question, &outcome, flow.elapsed());
        info!(
            status = record.status.as_str(),
            elapsed_ms = record.execution_time_ms,
            "question finished"
        );
        pending.complete(record).await;
        outcome
    }

    /// Advance the flow by one transition.
    async fn step(
        &self,
        state: FlowState,
        flow: &mut Flow<'_>,
        cancel: &CancellationToken,
        pending: &mut PendingAudit,
    ) -> FlowState {
        match state {
            FlowState::Start => {
                let limit = Duration::from_millis(self.config.schema_timeout_ms);
                match bounded(cancel, limit, Stage::Schema, self.schema.describe_schema()).await {
                    Ok(schema) => {
                        flow.schema = schema;
                        flow.started = Some(Instant::now());
                        FlowState::Generating {
                            attempt: 0,
                            error_context: None,
                        }
                    }
                    Err(StageError::Cancelled) => FlowState::Finished(AttemptOutcome::Cancelled {
                        stage: Stage::Schema,
                        sql: None,
                    }),
                    Err(StageError::Failed(error)) => {
                        warn!(error = %error, "schema unavailable");
                        FlowState::Finished(AttemptOutcome::SchemaUnavailable { error })
                    }
                }
            }

            FlowState::Generating {
                attempt,
                error_context,
            } => {
                let stage = Stage::generating(attempt);
                info!(stage = stage.as_str(), attempt, "requesting SQL");
                let limit = Duration::from_millis(self.config.oracle_timeout_ms);
                let generated = bounded(
                    cancel,
                    limit,
                    stage,
                    self.oracle
                        .generate_sql(flow.question, &flow.schema, error_context.as_deref()),
                )
                .await;

                match generated {
                    Ok(candidate) => {
                        pending.note_sql(&candidate);
                        FlowState::Guarding { attempt, candidate }
                    }
                    Err(StageError::Cancelled) => FlowState::Finished(AttemptOutcome::Cancelled {
                        stage,
                        sql: pending.last_sql(),
                    }),
                    Err(StageError::Failed(error)) => {
                        warn!(stage = stage.as_str(), error = %error, "SQL generation failed");
                        FlowState::Finished(AttemptOutcome::OracleFailed { error })
                    }
                }
            }

            FlowState::Guarding { attempt, candidate } => match self.guard.admit(&candidate) {
                GuardVerdict::Admitted(statement) => {
                    pending.note_sql(statement.sql());
                    FlowState::Executing { attempt, statement }
                }
                GuardVerdict::Rejected(rejection) => {
                    warn!(
                        stage = Stage::guarding(attempt).as_str(),
                        reason = %rejection,
                        "candidate rejected"
                    );
                    FlowState::Finished(AttemptOutcome::RejectedByGuard {
                        sql: candidate,
                        rejection,
                    })
                }
            },

            FlowState::Executing { attempt, statement } => {
                let stage = Stage::executing(attempt);
                let limit = Duration::from_millis(self.config.execution_timeout_ms);
                let executed =
                    bounded(cancel, limit, stage, self.executor.execute(statement.sql())).await;

                match executed {
                    Ok(result) => FlowState::Finished(AttemptOutcome::Success {
                        sql: statement.into_sql(),
                        result,
                        elapsed: flow.elapsed().unwrap_or_default(),
                        attempts: attempt + 1,
                    }),
                    Err(StageError::Cancelled) => FlowState::Finished(AttemptOutcome::Cancelled {
                        stage,
                        sql: Some(statement.into_sql()),
                    }),
                    Err(StageError::Failed(error)) if attempt < self.config.max_corrections => {
                        warn!(
                            stage = stage.as_str(),
                            error = %error,
                            "execution failed, requesting a correction"
                        );
                        FlowState::Generating {
                            attempt: attempt + 1,
                            error_context: Some(error.detail()),
                        }
                    }
                    Err(StageError::Failed(error)) => {
                        warn!(stage = stage.as_str(), error = %error, "execution failed");
                        FlowState::Finished(AttemptOutcome::ExecutionFailed {
                            sql: statement.into_sql(),
                            error,
                        })
                    }
                }
            }

            FlowState::Finished(outcome) => FlowState::Finished(outcome),
        }
    }
}

/// Await `fut` under a timeout, abandoning it if `cancel` fires first.
async fn bounded<T>(
    cancel: &CancellationToken,
    limit: Duration,
    stage: Stage,
    fut: impl Future<Output = Result<T>>,
) -> std::result::Result<T, StageError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(StageError::Cancelled),
        res = tokio::time::timeout(limit, fut) => match res {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(error)) => Err(StageError::Failed(error)),
            Err(_) => Err(StageError::Failed(timeout_error(stage, limit))),
        },
    }
}

fn timeout_error(stage: Stage, limit: Duration) -> AppError {
    let ms = limit.as_millis();
    match stage {
        Stage::Generating | Stage::RetryGenerating => {
            AppError::LLMError(format!("LLM request timed out after {}ms", ms))
        }
        Stage::Executing | Stage::RetryExecuting => {
            AppError::ExecutionError(format!("Query timed out after {}ms", ms))
        }
        Stage::Schema => {
            AppError::DatabaseError(format!("Schema lookup timed out after {}ms", ms))
        }
        Stage::Guarding | Stage::RetryGuarding => {
            AppError::Internal(format!("{} timed out after {}ms", stage, ms))
        }
    }
}
