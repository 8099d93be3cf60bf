use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::infrastructure::config::Settings;
use crate::interfaces::cli::{self, Cli};

/// `RUST_LOG` wins over the configured level when set.
pub fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{},hyper=warn,reqwest=warn,sqlx=warn", level))
    });
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

pub async fn run() -> ExitCode {
    let args = Cli::parse();

    let settings = match Settings::load(args.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("[{}] {}", e.status_code(), e);
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&settings.log_level);

    match cli::execute(args.command, &settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(status = e.status_code(), error = %e, "command failed");
            eprintln!("[{}] {}", e.status_code(), e);
            ExitCode::FAILURE
        }
    }
}
