//! Settings loading.
//!
//! Layers, later ones winning: built-in defaults, the TOML file
//! (`guardsql.toml` unless a path is given), `GUARDSQL_` environment variables
//! with `__` between nested keys, then a bare `DATABASE_URL`. A `.env` file is
//! read into the environment first.

use crate::application::use_cases::query_orchestrator::OrchestratorConfig;
use crate::application::use_cases::sql_guard::GuardConfig;
use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::LLMConfig;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::Path;
use validator::Validate;

pub const DEFAULT_CONFIG_FILE: &str = "guardsql.toml";
pub const ENV_PREFIX: &str = "GUARDSQL_";

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DatabaseSettings {
    #[validate(url)]
    pub url: String,
    /// Schema whose tables are described to the oracle
    #[validate(length(min = 1))]
    pub schema: String,
    #[validate(range(min = 1, max = 100))]
    pub max_connections: u32,
    #[validate(range(min = 1))]
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: "postgres://postgres@localhost:5432/postgres".to_string(),
            schema: "public".to_string(),
            max_connections: 5,
            acquire_timeout_secs: 10,
            idle_timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Settings {
    #[validate(nested)]
    pub database: DatabaseSettings,
    #[validate(nested)]
    pub llm: LLMConfig,
    #[validate(nested)]
    pub guard: GuardConfig,
    #[validate(nested)]
    pub orchestrator: OrchestratorConfig,
    #[validate(length(min = 1))]
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: DatabaseSettings::default(),
            llm: LLMConfig::default(),
            guard: GuardConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        // A missing .env file is normal.
        let _ = dotenvy::dotenv();

        let settings: Settings = Self::figment(path)
            .extract()
            .map_err(|e| AppError::ConfigError(format!("Failed to load settings: {}", e)))?;
        settings.validated()
    }

    pub fn figment(path: Option<&Path>) -> Figment {
        let file = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));

        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(
                Env::raw()
                    .only(&["DATABASE_URL"])
                    .map(|_| "database.url".into()),
            )
    }

    pub fn validated(self) -> Result<Self> {
        self.validate()
            .map_err(|e| AppError::ConfigError(format!("Invalid settings: {}", e)))?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm_config::LLMProvider;
    use figment::Jail;

    #[test]
    fn test_defaults() {
        Jail::expect_with(|_jail| {
            let settings: Settings = Settings::figment(None).extract()?;
            assert_eq!(settings.guard.row_cap, 100);
            assert_eq!(settings.orchestrator.max_corrections, 1);
            assert_eq!(settings.orchestrator.oracle_timeout_ms, 60_000);
            assert_eq!(settings.orchestrator.execution_timeout_ms, 30_000);
            assert_eq!(settings.llm.provider, LLMProvider::Ollama);
            assert_eq!(settings.database.schema, "public");
            assert!(settings.validated().is_ok());
            Ok(())
        });
    }

    #[test]
    fn test_file_then_env_overrides() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "guardsql.toml",
                r#"
                log_level = "debug"

                [guard]
                row_cap = 50

                [llm]
                provider = "openai"
                base_url = "https://llm.internal/v1"
                model = "sqlcoder"
                "#,
            )?;
            jail.set_env("GUARDSQL_GUARD__ROW_CAP", "25");
            jail.set_env("GUARDSQL_ORCHESTRATOR__MAX_CORRECTIONS", "2");
            jail.set_env("DATABASE_URL", "postgres://reader@db:5432/shop");

            let settings: Settings = Settings::figment(None).extract()?;
            assert_eq!(settings.log_level, "debug");
            assert_eq!(settings.guard.row_cap, 25);
            assert_eq!(settings.orchestrator.max_corrections, 2);
            assert_eq!(settings.llm.provider, LLMProvider::OpenAiCompatible);
            assert_eq!(settings.llm.model, "sqlcoder");
            assert_eq!(settings.database.url, "postgres://reader@db:5432/shop");
            // Untouched keys keep their defaults.
            assert_eq!(settings.guard.forbidden_keywords.len(), 12);
            Ok(())
        });
    }

    #[test]
    fn test_explicit_path() {
        Jail::expect_with(|jail| {
            jail.create_file("custom.toml", "[database]\nmax_connections = 9\n")?;
            let settings: Settings = Settings::figment(Some(Path::new("custom.toml"))).extract()?;
            assert_eq!(settings.database.max_connections, 9);
            Ok(())
        });
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut settings = Settings::default();
        settings.guard.row_cap = 0;
        assert!(matches!(
            settings.validated(),
            Err(AppError::ConfigError(_))
        ));

        let mut settings = Settings::default();
        settings.orchestrator.max_corrections = 7;
        assert!(settings.validated().is_err());

        let mut settings = Settings::default();
        settings.llm.base_url = "not a url".to_string();
        assert!(settings.validated().is_err());
    }
}
