use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::domain::error::{AppError, Result};
use crate::domain::query::QueryRequest;
use crate::infrastructure::bootstrap::bootstrap;
use crate::infrastructure::config::Settings;
use crate::infrastructure::db::SchemaDescriber;

#[derive(Debug, Parser)]
#[command(name = "guardsql", version, about = "Ask questions of a Postgres database in plain language")]
pub struct Cli {
    /// Settings file, `guardsql.toml` when omitted
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Turn a question into SQL, run it and print the rows
    Ask {
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },
    /// Print the schema description handed to the model
    Schema,
    /// Check that the database answers
    Health,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    database: &'static str,
}

pub async fn execute(command: Command, settings: &Settings) -> Result<()> {
    let ctx = bootstrap(settings).await?;

    match command {
        Command::Ask { question } => {
            let request = QueryRequest::new(question.join(" ")).validated()?;

            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            let interrupt = tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupted, cancelling question");
                    on_interrupt.cancel();
                }
            });

            let outcome = ctx
                .orchestrator
                .process_with_cancellation(&request.question, &cancel)
                .await;
            interrupt.abort();

            print_json(&outcome.into_response()?)
        }
        Command::Schema => {
            let schema = ctx.backend.describe_schema().await?;
            println!("{}", schema);
            Ok(())
        }
        Command::Health => {
            let healthy = ctx.backend.check_health().await;
            print_json(&HealthResponse {
                status: if healthy { "ok" } else { "degraded" },
                database: if healthy { "connected" } else { "unreachable" },
            })?;
            if healthy {
                Ok(())
            } else {
                Err(AppError::DatabaseError("Database is not reachable".to_string()))
            }
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let body = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::Internal(format!("Failed to serialize output: {}", e)))?;
    println!("{}", body);
    Ok(())
}
