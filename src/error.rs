//! Error types for Tabula gateway

use thiserror::Error;

/// Result type alias for Tabula operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Tabula gateway
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// `SQLite` error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Table or column does not exist
    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    /// Identifier failed validation (not a bare SQL identifier)
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed request payload
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Authentication/authorization error
    #[error("auth error: {0}")]
    Auth(String),

    /// Idempotency store error
    #[error("idempotency store error: {0}")]
    Store(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
