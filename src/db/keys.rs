//! API key repository

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::DbPool;
use crate::{Error, Result};

/// A stored API key (digest only)
#[derive(Debug, Clone)]
pub struct ApiKey {
    pub id: String,
    pub name: String,
    pub key_hash: String,
    pub created_at: DateTime<Utc>,
}

/// API key repository
#[derive(Clone)]
pub struct ApiKeyRepo {
    pool: DbPool,
}

impl ApiKeyRepo {
    /// Create a new API key repository
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Store a new key digest under a human-readable name
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn create(&self, name: &str, key_hash: &str) -> Result<ApiKey> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO tabula_api_keys (id, name, key_hash, created_at) VALUES (?1, ?2, ?3, ?4)",
            [&id, name, key_hash, &now.to_rfc3339()],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(ApiKey {
            id,
            name: name.to_string(),
            key_hash: key_hash.to_string(),
            created_at: now,
        })
    }

    /// List all stored keys, newest first
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list(&self) -> Result<Vec<ApiKey>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut stmt = conn
            .prepare(
                "SELECT id, name, key_hash, created_at FROM tabula_api_keys
                 ORDER BY created_at DESC",
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        let keys = stmt
            .query_map([], |row| {
                Ok(ApiKey {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    key_hash: row.get(2)?,
                    created_at: parse_datetime(&row.get::<_, String>(3)?),
                })
            })
            .map_err(|e| Error::Database(e.to_string()))?
            .filter_map(std::result::Result::ok)
            .collect();

        Ok(keys)
    }

    /// Delete a key by id; returns false when no key matched
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn delete(&self, id: &str) -> Result<bool> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let deleted = conn
            .execute("DELETE FROM tabula_api_keys WHERE id = ?1", [id])
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(deleted > 0)
    }

    /// True when the digest matches a stored key
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn verify_hash(&self, key_hash: &str) -> Result<bool> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM tabula_api_keys WHERE key_hash = ?1",
                [key_hash],
                |row| row.get(0),
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(count > 0)
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
