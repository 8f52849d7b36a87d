//! Configuration management for the server.

use std::env;
use std::path::PathBuf;
use tedsai_engine::OptimizerConfig;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// PostgreSQL connection URL
    pub database_url: String,
    /// Directory holding the local cache files
    pub data_dir: PathBuf,
    pub sync_interval_ms: Option<u64>,
    pub cleanup_interval_ms: Option<u64>,
    pub monitor_interval_ms: Option<u64>,
    pub max_local_storage_bytes: Option<u64>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        let port = lookup("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::MissingDatabaseUrl)?;

        let data_dir = lookup("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data"));

        let number = |key: &'static str| -> Result<Option<u64>, ConfigError> {
            lookup(key)
                .map(|raw| raw.parse().map_err(|_| ConfigError::InvalidNumber(key)))
                .transpose()
        };

        Ok(Self {
            host,
            port,
            database_url,
            data_dir,
            sync_interval_ms: number("SYNC_INTERVAL_MS")?,
            cleanup_interval_ms: number("CLEANUP_INTERVAL_MS")?,
            monitor_interval_ms: number("MONITOR_INTERVAL_MS")?,
            max_local_storage_bytes: number("MAX_LOCAL_STORAGE_BYTES")?,
        })
    }

    /// Apply environment overrides on top of the stored optimizer settings.
    pub fn apply_to(&self, mut settings: OptimizerConfig) -> OptimizerConfig {
        if let Some(ms) = self.sync_interval_ms {
            settings.sync_interval = ms;
        }
        if let Some(ms) = self.cleanup_interval_ms {
            settings.cleanup_interval = ms;
        }
        if let Some(ms) = self.monitor_interval_ms {
            settings.monitor_interval = ms;
        }
        if let Some(bytes) = self.max_local_storage_bytes {
            settings.max_local_storage_size = bytes;
        }
        settings
    }

    pub fn has_overrides(&self) -> bool {
        self.sync_interval_ms.is_some()
            || self.cleanup_interval_ms.is_some()
            || self.monitor_interval_ms.is_some()
            || self.max_local_storage_bytes.is_some()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("DATABASE_URL environment variable is required")]
    MissingDatabaseUrl,

    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("Invalid {0} value, expected a whole number")]
    InvalidNumber(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/tedsai")]).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert!(!config.has_overrides());
    }

    #[test]
    fn database_url_required() {
        assert!(matches!(load(&[]), Err(ConfigError::MissingDatabaseUrl)));
    }

    #[test]
    fn invalid_numbers_rejected() {
        assert!(matches!(
            load(&[("DATABASE_URL", "x"), ("PORT", "http")]),
            Err(ConfigError::InvalidPort)
        ));
        assert!(matches!(
            load(&[("DATABASE_URL", "x"), ("SYNC_INTERVAL_MS", "5m")]),
            Err(ConfigError::InvalidNumber("SYNC_INTERVAL_MS"))
        ));
    }

    #[test]
    fn overrides_apply_to_settings() {
        let config = load(&[
            ("DATABASE_URL", "x"),
            ("SYNC_INTERVAL_MS", "60000"),
            ("MAX_LOCAL_STORAGE_BYTES", "1024"),
        ])
        .unwrap();
        assert!(config.has_overrides());

        let settings = config.apply_to(OptimizerConfig::default());
        assert_eq!(settings.sync_interval, 60_000);
        assert_eq!(settings.max_local_storage_size, 1024);
        assert_eq!(settings.cleanup_interval, OptimizerConfig::default().cleanup_interval);
    }
}
