//! Configuration management.
//!
//! Values come from an optional TOML file (`GOMA_CONFIG`, falling back to
//! `goma.toml` when present) overlaid by `GOMA__SECTION__KEY` environment
//! variables.

use goma_core::models::permission::CreatePermission;
use goma_db::DbConfig;
use serde::Deserialize;

const ENV_PREFIX: &str = "GOMA";
const ENV_SEPARATOR: &str = "__";
const DEFAULT_CONFIG_FILE: &str = "goma.toml";

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DbConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub seed: SeedConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_json_logging")]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: default_json_logging(),
        }
    }
}

/// Permission catalog applied at startup.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedConfig {
    #[serde(default)]
    pub permissions: Vec<CreatePermission>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_json_logging() -> bool {
    true
}

impl AppConfig {
    /// Load configuration from the config file and environment.
    ///
    /// A file named by `GOMA_CONFIG` must exist; the default
    /// `goma.toml` is optional.
    pub fn load() -> anyhow::Result<Self> {
        let (path, required) = match std::env::var("GOMA_CONFIG") {
            Ok(path) => (path, true),
            Err(_) => (DEFAULT_CONFIG_FILE.to_string(), false),
        };

        Self::build(
            config::File::with_name(&path).required(required),
            environment(),
        )
    }

    fn build<F>(file: F, env: config::Environment) -> anyhow::Result<Self>
    where
        F: config::Source + Send + Sync + 'static,
    {
        let config = config::Config::builder()
            .add_source(file)
            .add_source(env)
            .build()?;

        let cfg: AppConfig = config.try_deserialize()?;
        Ok(cfg)
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX).separator(ENV_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use config::{File, FileFormat};

    use super::*;

    fn env(vars: &[(&str, &str)]) -> config::Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        environment().source(Some(map))
    }

    #[test]
    fn empty_sources_yield_defaults() {
        let cfg = AppConfig::build(File::from_str("", FileFormat::Toml), env(&[])).unwrap();

        assert_eq!(cfg.database.namespace, "goma");
        assert_eq!(cfg.database.url, "127.0.0.1:8000");
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.logging.json);
        assert!(cfg.seed.permissions.is_empty());
    }

    #[test]
    fn file_values_and_seed_catalog_are_read() {
        let toml = r#"
            [database]
            url = "db.internal:8000"
            database = "rbac"

            [logging]
            json = false

            [[seed.permissions]]
            key = "user.read"
            name = "Read User"
            module = "user"

            [[seed.permissions]]
            key = "report.view"
            name = "View Reports"
        "#;

        let cfg = AppConfig::build(File::from_str(toml, FileFormat::Toml), env(&[])).unwrap();

        assert_eq!(cfg.database.url, "db.internal:8000");
        assert_eq!(cfg.database.database, "rbac");
        assert_eq!(cfg.database.namespace, "goma");
        assert!(!cfg.logging.json);
        assert_eq!(cfg.seed.permissions.len(), 2);
        assert_eq!(cfg.seed.permissions[0].module.as_deref(), Some("user"));
        assert!(cfg.seed.permissions[1].description.is_none());
    }

    #[test]
    fn environment_overrides_file() {
        let toml = r#"
            [database]
            url = "from-file:8000"
        "#;

        let cfg = AppConfig::build(
            File::from_str(toml, FileFormat::Toml),
            env(&[
                ("GOMA__DATABASE__URL", "from-env:8000"),
                ("GOMA__LOGGING__LEVEL", "debug"),
            ]),
        )
        .unwrap();

        assert_eq!(cfg.database.url, "from-env:8000");
        assert_eq!(cfg.logging.level, "debug");
    }

    #[test]
    fn missing_optional_file_is_ignored() {
        let cfg = AppConfig::build(
            File::with_name("does-not-exist.toml").required(false),
            env(&[]),
        )
        .unwrap();
        assert_eq!(cfg.logging.level, "info");
    }
}
