//! Audit Service
//!
//! Best-effort writer in front of an [`AuditSink`]. A failed or slow write is
//! logged and swallowed so it can never change what the caller gets back.
//! [`PendingAudit`] makes sure a question that is abandoned mid-flight still
//! leaves exactly one record behind.

use crate::domain::query::QueryRecord;
use crate::infrastructure::db::AuditSink;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

pub struct AuditService {
    sink: Arc<dyn AuditSink>,
    write_timeout: Duration,
}

impl AuditService {
    pub fn new(sink: Arc<dyn AuditSink>, write_timeout: Duration) -> Self {
        Self {
            sink,
            write_timeout,
        }
    }

    /// Start tracking a question. The returned guard writes a `cancelled`
    /// record if it is dropped before [`PendingAudit::complete`] runs.
    pub fn begin(&self, question: &str) -> PendingAudit {
        PendingAudit {
            sink: Arc::clone(&self.sink),
            write_timeout: self.write_timeout,
            question: question.to_string(),
            last_sql: None,
            armed: true,
        }
    }
}

pub struct PendingAudit {
    sink: Arc<dyn AuditSink>,
    write_timeout: Duration,
    question: String,
    last_sql: Option<String>,
    armed: bool,
}

impl PendingAudit {
    pub fn note_sql(&mut self, sql: &str) {
        self.last_sql = Some(sql.to_string());
    }

    pub fn last_sql(&self) -> Option<String> {
        self.last_sql.clone()
    }

    /// Write the terminal record and disarm the guard.
    ///
    /// The write runs on its own task, so it still lands if the caller stops
    /// awaiting this future.
    pub async fn complete(mut self, record: QueryRecord) {
        let sink = Arc::clone(&self.sink);
        let write_timeout = self.write_timeout;
        let write = tokio::spawn(async move {
            write_best_effort(sink.as_ref(), &record, write_timeout).await;
        });
        self.armed = false;

        if let Err(e) = write.await {
            error!(error = %e, "audit write task failed");
        }
    }
}

impl Drop for PendingAudit {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let record = QueryRecord::abandoned(&self.question, self.last_sql.as_deref());
        let sink = Arc::clone(&self.sink);
        let write_timeout = self.write_timeout;

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!("question abandoned before finishing, recording cancellation");
                handle.spawn(async move {
                    write_best_effort(sink.as_ref(), &record, write_timeout).await;
                });
            }
            Err(_) => error!("no async runtime available, abandoned question was not audited"),
        }
    }
}

async fn write_best_effort(sink: &dyn AuditSink, record: &QueryRecord, write_timeout: Duration) {
    match tokio::time::timeout(write_timeout, sink.record(record)).await {
        Ok(Ok(())) => debug!(status = record.status.as_str(), "audit record written"),
        Ok(Err(e)) => error!(status = record.status.as_str(), error = %e, "failed to write audit record"),
        Err(_) => error!(
            status = record.status.as_str(),
            timeout_ms = write_timeout.as_millis() as u64,
            "audit write timed out"
        ),
    }
}
