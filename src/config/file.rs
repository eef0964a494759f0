//! TOML configuration file loading
//!
//! Supports `~/.config/tabula/config.toml` as a persistent config source.
//! All fields are optional — the file is a partial overlay on top of defaults.

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct TabulaConfigFile {
    /// Data directory override (database file lives here)
    #[serde(default)]
    pub data_dir: Option<String>,

    /// Server/runtime configuration
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Idempotency protection configuration
    #[serde(default)]
    pub idempotency: IdempotencyFileConfig,
}

/// Server/runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// API server port
    pub port: Option<u16>,

    /// Bootstrap admin API key
    pub api_key: Option<String>,

    /// Global requests-per-minute budget (0 disables rate limiting)
    pub rate_limit_per_minute: Option<u32>,
}

/// Idempotency protection configuration
#[derive(Debug, Default, Deserialize)]
pub struct IdempotencyFileConfig {
    /// Entry lifetime in seconds
    pub ttl_secs: Option<u64>,

    /// Seconds between expiry sweeps
    pub sweep_interval_secs: Option<u64>,

    /// Bound on individual store operations, in milliseconds
    pub store_timeout_ms: Option<u64>,

    /// Behavior when the store is unreachable: "open" or "closed"
    pub fail_mode: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `TabulaConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> TabulaConfigFile {
    let Some(path) = config_file_path() else {
        return TabulaConfigFile::default();
    };

    if !path.exists() {
        return TabulaConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                TabulaConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            TabulaConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/tabula/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("tabula").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_file() {
        let content = r#"
            data_dir = "/var/lib/tabula"

            [server]
            port = 9000
            api_key = "tbl_test"
            rate_limit_per_minute = 120

            [idempotency]
            ttl_secs = 3600
            sweep_interval_secs = 60
            store_timeout_ms = 500
            fail_mode = "closed"
        "#;
        let file: TabulaConfigFile = toml::from_str(content).unwrap();
        assert_eq!(file.data_dir.as_deref(), Some("/var/lib/tabula"));
        assert_eq!(file.server.port, Some(9000));
        assert_eq!(file.server.rate_limit_per_minute, Some(120));
        assert_eq!(file.idempotency.ttl_secs, Some(3600));
        assert_eq!(file.idempotency.fail_mode.as_deref(), Some("closed"));
    }

    #[test]
    fn test_parse_partial_file() {
        let file: TabulaConfigFile = toml::from_str("[server]\nport = 8080\n").unwrap();
        assert_eq!(file.server.port, Some(8080));
        assert!(file.server.api_key.is_none());
        assert!(file.idempotency.ttl_secs.is_none());
        assert!(file.data_dir.is_none());
    }

    #[test]
    fn test_parse_empty_file() {
        let file: TabulaConfigFile = toml::from_str("").unwrap();
        assert!(file.server.port.is_none());
        assert!(file.idempotency.fail_mode.is_none());
    }
}
