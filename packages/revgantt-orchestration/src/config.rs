//! Service configuration (YAML, v1 schema)
//!
//! ```yaml
//! version: 1
//! app_name: Reverse Gantt
//! database:
//!   path: /var/lib/revgantt/plan.db   # omit for in-memory SQLite
//! logging:
//!   level: info
//!   ansi: true
//! ```
//!
//! `REVGANTT_DATABASE_PATH` and `REVGANTT_LOG_LEVEL` override the file.

use crate::error::{OrchestratorError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const SUPPORTED_VERSION: u32 = 1;

pub const ENV_DATABASE_PATH: &str = "REVGANTT_DATABASE_PATH";
pub const ENV_LOG_LEVEL: &str = "REVGANTT_LOG_LEVEL";

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

fn default_app_name() -> String {
    "Reverse Gantt".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    pub version: u32,
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// SQLite file; `None` keeps everything in memory
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_true")]
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            ansi: true,
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            version: SUPPORTED_VERSION,
            app_name: default_app_name(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Parse YAML without touching the environment
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: ServiceConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML file, apply environment overrides, validate
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: ServiceConfig = serde_yaml::from_str(&content)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup (the process environment in production)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_DATABASE_PATH).filter(|p| !p.is_empty()) {
            self.database.path = Some(PathBuf::from(path));
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL).filter(|l| !l.is_empty()) {
            self.logging.level = level;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.version != SUPPORTED_VERSION {
            return Err(OrchestratorError::Config(format!(
                "Unsupported config version {} (supported: {})",
                self.version, SUPPORTED_VERSION
            )));
        }
        if self.app_name.trim().is_empty() {
            return Err(OrchestratorError::config("app_name must not be empty"));
        }
        let level = self.logging.level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(OrchestratorError::Config(format!(
                "Unknown log level '{}' (expected one of {:?})",
                self.logging.level, LOG_LEVELS
            )));
        }
        Ok(())
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::from_yaml_str("version: 1\n").unwrap();

        assert_eq!(config.app_name, "Reverse Gantt");
        assert_eq!(config.database.path, None);
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.ansi);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "version: 1\napp_name: Planner\ndatabase:\n  path: /tmp/plan.db\nlogging:\n  level: debug\n  ansi: false"
        )
        .unwrap();

        let config = ServiceConfig::from_yaml(file.path()).unwrap();
        assert_eq!(config.app_name, "Planner");
        assert!(!config.logging.ansi);
        // Environment may override path/level in CI; only assert what it can't touch
        assert!(config.database.path.is_some());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = ServiceConfig::from_yaml_str("version: 1\nworkers: 4\n").unwrap_err();
        assert!(matches!(err, OrchestratorError::Yaml(_)));
    }

    #[test]
    fn test_version_is_required() {
        assert!(ServiceConfig::from_yaml_str("app_name: Planner\n").is_err());
    }

    #[test]
    fn test_unsupported_version() {
        let err = ServiceConfig::from_yaml_str("version: 2\n").unwrap_err();
        assert!(matches!(err, OrchestratorError::Config(_)));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ServiceConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());

        let mut config = ServiceConfig::default();
        config.app_name = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_DATABASE_PATH, "/data/plan.db"),
            (ENV_LOG_LEVEL, "warn"),
        ]
        .into_iter()
        .collect();

        let mut config = ServiceConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.database.path, Some(PathBuf::from("/data/plan.db")));
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = ServiceConfig::default();
        let yaml = config.to_yaml().unwrap();
        assert_eq!(ServiceConfig::from_yaml_str(&yaml).unwrap(), config);
    }
}
