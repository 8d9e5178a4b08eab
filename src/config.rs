/// Configuration module for boardcore.
///
/// Handles loading, validating, and providing default configuration values.
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ── Default value functions ──────────────────────────────────────────

fn default_db_path() -> String {
    "./boards.db".to_string()
}

fn default_prefs_path() -> String {
    "./prefs.json".to_string()
}

fn default_listen_addr() -> String {
    "127.0.0.1:8700".to_string()
}

fn default_search_limit() -> usize {
    50
}

// ── Config structs ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Where the local preference store keeps its JSON document.
    #[serde(default = "default_prefs_path")]
    pub prefs_path: String,

    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Cap on rows returned by the item search endpoint.
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            prefs_path: default_prefs_path(),
            listen_addr: default_listen_addr(),
            search_limit: default_search_limit(),
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// If `config_path` is empty, defaults to `"config.json"`.
    /// If the file does not exist, returns a default config and optionally
    /// generates a template file.
    pub fn load(config_path: &str) -> Result<Self> {
        let path = if config_path.is_empty() {
            "config.json"
        } else {
            config_path
        };

        if !Path::new(path).exists() {
            info!("{path} not found, using defaults");
            let cfg = Self::default();

            // Generate template only for the default path
            if path == "config.json" {
                match cfg.save(path) {
                    Ok(()) => info!("Generated config template: {path}"),
                    Err(e) => warn!("Failed to generate config template: {e}"),
                }
            }

            return Ok(cfg);
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {path}"))?;

        let cfg: Config = match serde_json::from_str(&data) {
            Ok(c) => c,
            Err(e) => {
                warn!("Invalid JSON in {path}: {e}");
                warn!("Using default configuration");
                return Ok(Self::default());
            }
        };

        info!("Loaded configuration from {path}");
        Ok(cfg)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &str) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data).with_context(|| format!("failed to write config: {path}"))?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.db_path.is_empty(), "db_path must not be empty");
        anyhow::ensure!(!self.prefs_path.is_empty(), "prefs_path must not be empty");
        anyhow::ensure!(self.search_limit > 0, "search_limit must be positive");
        self.listen_addr
            .parse::<std::net::SocketAddr>()
            .with_context(|| format!("listen_addr is not a socket address: {}", self.listen_addr))?;
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.db_path, "./boards.db");
        assert_eq!(config.prefs_path, "./prefs.json");
        assert_eq!(config.listen_addr, "127.0.0.1:8700");
        assert_eq!(config.search_limit, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_json() {
        let json = r#"{"db_path": "./crm.db", "search_limit": 10}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.db_path, "./crm.db");
        assert_eq!(config.search_limit, 10);
        // Other fields should have defaults
        assert_eq!(config.listen_addr, "127.0.0.1:8700");
    }

    #[test]
    fn test_validate_bad_listen_addr() {
        let mut config = Config::default();
        config.listen_addr = "not-an-addr".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_search_limit() {
        let mut config = Config::default();
        config.search_limit = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_serialization_roundtrip() {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.db_path, config.db_path);
        assert_eq!(parsed.listen_addr, config.listen_addr);
    }
}
