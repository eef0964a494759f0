//! Tabula Gateway - Admin and database introspection gateway for multi-tenant APIs
//!
//! This library provides the core functionality for the Tabula gateway:
//! - Idempotency protection for write requests (duplicate detection, response
//!   replay, TTL-based expiry)
//! - Schema introspection over the tenant database
//! - Row-level record administration
//! - Hashed API key management
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                     Clients                          │
//! │   Dashboards  │  CLI  │  Integrations  │  Retries   │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                Tabula Gateway                        │
//! │   Auth  │  Rate Limit  │  Idempotency  │  Routers   │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │              SQLite (tenant data)                    │
//! │   Introspection  │  Records  │  Key digests         │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod idempotency;
pub mod security;

pub use api::{ApiServer, ApiState};
pub use config::Config;
pub use db::{DbConn, DbPool};
pub use error::{Error, Result};
pub use idempotency::{
    CachedEntry, IdempotencyConfig, IdempotencyStore, MemoryStore, SharedStore, SweeperHandle,
    spawn_sweeper,
};
