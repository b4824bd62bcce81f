//! Pipeline configuration.
//!
//! Everything a run needs is held in [`PipelineConfig`] and handed to the pipeline at
//! construction. The library never reads the environment on its own; the binary calls
//! [`PipelineConfig::from_env`] once at startup.

use std::path::PathBuf;

use crate::error::ConfigError;

/// Default staging directory.
pub const DEFAULT_STAGING_DIR: &str = "./uploads_etl";

/// Default registry database file.
pub const DEFAULT_REGISTRY_PATH: &str = "./historico.db";

/// Default warehouse table.
pub const DEFAULT_TARGET_TABLE: &str = "vendas_calculado";

/// Environment variable names read by [`PipelineConfig::from_env`].
pub mod env {
    /// Staging directory.
    pub const STAGING_DIR: &str = "ETL_STAGING_DIR";
    /// Registry database path.
    pub const REGISTRY_PATH: &str = "ETL_REGISTRY_PATH";
    /// Warehouse target.
    pub const DATABASE_URL: &str = "DATABASE_URL";
    /// Warehouse table.
    pub const TARGET_TABLE: &str = "ETL_TARGET_TABLE";
    /// Drop folder copied into staging before each run.
    pub const SOURCE_DIR: &str = "ETL_SOURCE_DIR";
    /// Create the warehouse table when absent.
    pub const CREATE_TABLE: &str = "ETL_CREATE_TABLE";
}

/// Settings for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Directory scanned for `.csv`/`.json`/`.parquet` files.
    pub staging_dir: PathBuf,
    /// SQLite file holding the processed-file registry.
    pub registry_path: PathBuf,
    /// Warehouse target (`sqlite://path` or `postgres://...`). Required to run, not to inspect
    /// history.
    pub warehouse_url: Option<String>,
    /// Table receiving transformed rows.
    pub target_table: String,
    /// Drop folder fetched into `staging_dir` before discovery, if any.
    pub source_dir: Option<PathBuf>,
    /// Create `target_table` from the first batch's schema when it does not exist.
    pub create_table_if_missing: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            staging_dir: PathBuf::from(DEFAULT_STAGING_DIR),
            registry_path: PathBuf::from(DEFAULT_REGISTRY_PATH),
            warehouse_url: None,
            target_table: DEFAULT_TARGET_TABLE.to_string(),
            source_dir: None,
            create_table_if_missing: false,
        }
    }
}

impl PipelineConfig {
    /// Load config from process environment variables (see [`env`]).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load config through an arbitrary key lookup. Unset or blank keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(dir) = get(env::STAGING_DIR) {
            config.staging_dir = PathBuf::from(dir);
        }
        if let Some(path) = get(env::REGISTRY_PATH) {
            config.registry_path = PathBuf::from(path);
        }
        if let Some(url) = get(env::DATABASE_URL) {
            config.warehouse_url = Some(url);
        }
        if let Some(table) = get(env::TARGET_TABLE) {
            config.target_table = table.trim().to_string();
        }
        if let Some(dir) = get(env::SOURCE_DIR) {
            config.source_dir = Some(PathBuf::from(dir));
        }
        if let Some(raw) = get(env::CREATE_TABLE) {
            config.create_table_if_missing = parse_bool(env::CREATE_TABLE, &raw)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that cannot produce a working run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_table.trim().is_empty() {
            return Err(ConfigError::Empty {
                key: env::TARGET_TABLE.to_string(),
            });
        }
        if self.staging_dir.as_os_str().is_empty() {
            return Err(ConfigError::Empty {
                key: env::STAGING_DIR.to_string(),
            });
        }
        Ok(())
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            key: key.to_string(),
            value: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::PathBuf;

    use super::{DEFAULT_TARGET_TABLE, PipelineConfig, env};
    use crate::error::ConfigError;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = PipelineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.target_table, DEFAULT_TARGET_TABLE);
        assert_eq!(config.warehouse_url, None);
    }

    #[test]
    fn every_setting_is_read() {
        let config = PipelineConfig::from_lookup(lookup(&[
            (env::STAGING_DIR, "/data/staging"),
            (env::REGISTRY_PATH, "/data/state/registry.db"),
            (env::DATABASE_URL, "sqlite:///data/dw.db"),
            (env::TARGET_TABLE, "vendas_teste"),
            (env::SOURCE_DIR, "/mnt/drop"),
            (env::CREATE_TABLE, "yes"),
        ]))
        .unwrap();

        assert_eq!(config.staging_dir, PathBuf::from("/data/staging"));
        assert_eq!(config.registry_path, PathBuf::from("/data/state/registry.db"));
        assert_eq!(config.warehouse_url.as_deref(), Some("sqlite:///data/dw.db"));
        assert_eq!(config.target_table, "vendas_teste");
        assert_eq!(config.source_dir, Some(PathBuf::from("/mnt/drop")));
        assert!(config.create_table_if_missing);
    }

    #[test]
    fn blank_values_keep_defaults() {
        let config = PipelineConfig::from_lookup(lookup(&[(env::TARGET_TABLE, "  ")])).unwrap();
        assert_eq!(config.target_table, DEFAULT_TARGET_TABLE);
    }

    #[test]
    fn invalid_bool_is_rejected() {
        let err = PipelineConfig::from_lookup(lookup(&[(env::CREATE_TABLE, "maybe")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidBool {
                key: env::CREATE_TABLE.to_string(),
                value: "maybe".to_string(),
            }
        );
    }
}
