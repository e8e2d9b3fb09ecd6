// Runtime configuration
//
// Defaults < YAML file < LEDGER_* environment variables < CLI flags

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::engine::CommitMode;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// SQLite database file
    pub db_path: PathBuf,

    /// HTTP listen address
    pub bind_addr: String,

    /// Default tracing filter when RUST_LOG is unset
    pub log_level: String,

    /// Emit JSON log lines instead of text
    pub log_json: bool,

    /// How transfers are committed to the store
    pub commit_mode: CommitMode,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            db_path: PathBuf::from("./bank.db"),
            bind_addr: "0.0.0.0:8080".to_string(),
            log_level: "info".to_string(),
            log_json: false,
            commit_mode: CommitMode::Sequential,
        }
    }
}

impl AppConfig {
    /// Load from an optional YAML file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.with_env_overrides(|key| std::env::var(key).ok())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config yaml: {:?}", path))
    }

    /// Apply `LEDGER_*` overrides read through `lookup`
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(db_path) = lookup("LEDGER_DB_PATH") {
            self.db_path = PathBuf::from(db_path);
        }
        if let Some(bind_addr) = lookup("LEDGER_BIND_ADDR") {
            self.bind_addr = bind_addr;
        }
        if let Some(log_level) = lookup("LEDGER_LOG_LEVEL") {
            self.log_level = log_level;
        }
        if let Some(log_json) = lookup("LEDGER_LOG_JSON") {
            self.log_json = matches!(log_json.trim(), "1" | "true" | "yes");
        }
        if let Some(mode) = lookup("LEDGER_COMMIT_MODE") {
            self.commit_mode = mode
                .parse()
                .map_err(anyhow::Error::msg)
                .context("Invalid LEDGER_COMMIT_MODE")?;
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults_point_at_local_bank_db() {
        let config = AppConfig::default();
        assert_eq!(config.db_path, PathBuf::from("./bank.db"));
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.commit_mode, CommitMode::Sequential);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "db_path: /tmp/ledger.db").unwrap();
        writeln!(file, "commit_mode: atomic").unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();

        assert_eq!(config.db_path, PathBuf::from("/tmp/ledger.db"));
        assert_eq!(config.commit_mode, CommitMode::Atomic);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("LEDGER_BIND_ADDR", "127.0.0.1:9000"),
            ("LEDGER_LOG_JSON", "true"),
            ("LEDGER_COMMIT_MODE", "atomic"),
        ]
        .into_iter()
        .collect();

        let config = AppConfig::default()
            .with_env_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert!(config.log_json);
        assert_eq!(config.commit_mode, CommitMode::Atomic);
        assert_eq!(config.db_path, PathBuf::from("./bank.db"));
    }

    #[test]
    fn test_bad_commit_mode_is_an_error() {
        let result = AppConfig::default().with_env_overrides(|key| {
            (key == "LEDGER_COMMIT_MODE").then(|| "eventual".to_string())
        });
        assert!(result.is_err());
    }
}
