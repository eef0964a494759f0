//! Configuration management for Tabula gateway

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use crate::idempotency::{
    DEFAULT_STORE_TIMEOUT, DEFAULT_SWEEP_INTERVAL, DEFAULT_TTL, FailMode, IdempotencyConfig,
};
use crate::{Error, Result};

/// Default API port
pub const DEFAULT_PORT: u16 = 18620;

/// Tabula gateway configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to data directory (database file lives here)
    pub data_dir: PathBuf,

    /// HTTP API server configuration
    pub server: ApiServerConfig,

    /// Idempotency protection configuration
    pub idempotency: IdempotencyConfig,
}

/// HTTP API server configuration
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Port to listen on
    pub port: u16,

    /// Bootstrap admin API key (from `TABULA_API_KEY` env).
    /// `None` disables authentication entirely (development mode).
    pub api_key: Option<String>,

    /// Global requests-per-minute budget; 0 disables rate limiting
    pub rate_limit_per_minute: u32,
}

impl Config {
    /// Load configuration with priority: CLI override → env → config file → default
    ///
    /// # Errors
    ///
    /// Returns error if no data directory can be determined or a value is
    /// out of range
    pub fn load(port_override: Option<u16>) -> Result<Self> {
        let fc = file::load_config_file();
        Self::from_file(&fc, port_override)
    }

    fn from_file(fc: &file::TabulaConfigFile, port_override: Option<u16>) -> Result<Self> {
        let data_dir = std::env::var("TABULA_DATA_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| fc.data_dir.as_ref().map(PathBuf::from))
            .map_or_else(default_data_dir, Ok)?;

        let server = ApiServerConfig {
            port: port_override.or(fc.server.port).unwrap_or(DEFAULT_PORT),
            api_key: std::env::var("TABULA_API_KEY")
                .ok()
                .or_else(|| fc.server.api_key.clone()),
            rate_limit_per_minute: std::env::var("TABULA_RATE_LIMIT_PER_MINUTE")
                .ok()
                .and_then(|s| s.parse().ok())
                .or(fc.server.rate_limit_per_minute)
                .unwrap_or(0),
        };

        let idempotency = IdempotencyConfig {
            ttl: std::env::var("TABULA_IDEMPOTENCY_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .or(fc.idempotency.ttl_secs)
                .map_or(DEFAULT_TTL, Duration::from_secs),
            sweep_interval: std::env::var("TABULA_IDEMPOTENCY_SWEEP_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .or(fc.idempotency.sweep_interval_secs)
                .map_or(DEFAULT_SWEEP_INTERVAL, Duration::from_secs),
            store_timeout: std::env::var("TABULA_IDEMPOTENCY_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .or(fc.idempotency.store_timeout_ms)
                .map_or(DEFAULT_STORE_TIMEOUT, Duration::from_millis),
            fail_mode: match std::env::var("TABULA_IDEMPOTENCY_FAIL_MODE")
                .ok()
                .or_else(|| fc.idempotency.fail_mode.clone())
                .as_deref()
            {
                Some("closed") => FailMode::Closed,
                _ => FailMode::Open,
            },
        };

        // A zero period would make the sweep task spin
        if idempotency.sweep_interval.is_zero() {
            return Err(Error::Config(
                "idempotency sweep interval must be non-zero".to_string(),
            ));
        }

        Ok(Self {
            data_dir,
            server,
            idempotency,
        })
    }
}

/// Default data directory: `~/.local/share/tabula/`
fn default_data_dir() -> Result<PathBuf> {
    directories::BaseDirs::new()
        .map(|d| d.data_local_dir().join("tabula"))
        .ok_or_else(|| Error::Config("could not determine data directory".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::file::TabulaConfigFile;

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_file(&TabulaConfigFile::default(), None).unwrap();
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.server.rate_limit_per_minute, 0);
        assert_eq!(config.idempotency.ttl, Duration::from_secs(24 * 60 * 60));
        assert_eq!(config.idempotency.sweep_interval, Duration::from_secs(3600));
        assert_eq!(config.idempotency.store_timeout, Duration::from_millis(2000));
        assert_eq!(config.idempotency.fail_mode, FailMode::Open);
    }

    #[test]
    fn test_file_values_respected() {
        let fc: TabulaConfigFile = toml::from_str(
            r#"
            [server]
            port = 9000
            rate_limit_per_minute = 60

            [idempotency]
            ttl_secs = 120
            sweep_interval_secs = 30
            store_timeout_ms = 250
            fail_mode = "closed"
            "#,
        )
        .unwrap();
        let config = Config::from_file(&fc, None).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.rate_limit_per_minute, 60);
        assert_eq!(config.idempotency.ttl, Duration::from_secs(120));
        assert_eq!(config.idempotency.sweep_interval, Duration::from_secs(30));
        assert_eq!(config.idempotency.store_timeout, Duration::from_millis(250));
        assert_eq!(config.idempotency.fail_mode, FailMode::Closed);
    }

    #[test]
    fn test_port_override_wins() {
        let fc: TabulaConfigFile = toml::from_str("[server]\nport = 9000\n").unwrap();
        let config = Config::from_file(&fc, Some(7000)).unwrap();
        assert_eq!(config.server.port, 7000);
    }

    #[test]
    fn test_unknown_fail_mode_defaults_open() {
        let fc: TabulaConfigFile =
            toml::from_str("[idempotency]\nfail_mode = \"panic\"\n").unwrap();
        let config = Config::from_file(&fc, None).unwrap();
        assert_eq!(config.idempotency.fail_mode, FailMode::Open);
    }

    #[test]
    fn test_zero_sweep_interval_rejected() {
        let fc: TabulaConfigFile =
            toml::from_str("[idempotency]\nsweep_interval_secs = 0\n").unwrap();
        assert!(Config::from_file(&fc, None).is_err());
    }
}
