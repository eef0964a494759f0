//! Database schema and migrations
//!
//! Gateway metadata lives in `tabula_`-prefixed tables. Everything else in
//! the database belongs to the tenant and is only touched through the
//! introspection and record APIs.

use rusqlite::Connection;

use crate::Result;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
///
/// # Errors
///
/// Returns error if migration fails
pub fn init(conn: &Connection) -> Result<()> {
    let version: i32 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .unwrap_or(0);

    if version < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        -- API keys (hashed; plaintext is never stored)
        CREATE TABLE IF NOT EXISTS tabula_api_keys (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            key_hash TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_tabula_api_keys_hash ON tabula_api_keys(key_hash);

        PRAGMA user_version = 1;
    ",
    )?;

    Ok(())
}
