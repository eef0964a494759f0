//! HTTP API server for Tabula gateway

pub mod admin;
mod auth;
pub mod health;
pub mod rate_limit;
pub mod records;
pub mod schema;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::{Json, Router};
use secrecy::SecretString;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::db::{ApiKeyRepo, DbPool, RecordRepo, SchemaRepo};
use crate::idempotency::{IdempotencyConfig, MemoryStore, SharedStore};
use crate::{Error, Result};

/// Shared state for API handlers
pub struct ApiState {
    pub db: DbPool,
    /// Bootstrap admin key; `None` leaves the API open (development mode)
    pub api_key: Option<SecretString>,
    pub schema_repo: SchemaRepo,
    pub record_repo: RecordRepo,
    pub key_repo: ApiKeyRepo,
    pub idempotency_store: SharedStore,
    pub idempotency_config: IdempotencyConfig,
    pub rate_limiter: Option<rate_limit::SharedLimiter>,
}

/// Error payload for API responses
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

/// Machine-readable code plus human-readable message
#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

pub(crate) fn error_response(code: &str, message: &str) -> Json<ErrorResponse> {
    Json(ErrorResponse {
        error: ErrorDetail {
            code: code.to_string(),
            message: message.to_string(),
        },
    })
}

/// Map a domain error onto an HTTP status and error payload
pub(crate) fn map_db_error(error: &Error) -> (StatusCode, Json<ErrorResponse>) {
    match error {
        Error::UnknownEntity(m) => (StatusCode::NOT_FOUND, error_response("unknown_entity", m)),
        Error::NotFound(m) => (StatusCode::NOT_FOUND, error_response("not_found", m)),
        Error::InvalidIdentifier(m) => (
            StatusCode::BAD_REQUEST,
            error_response("invalid_identifier", m),
        ),
        Error::BadRequest(m) => (StatusCode::BAD_REQUEST, error_response("bad_request", m)),
        other => (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_response("db_error", &other.to_string()),
        ),
    }
}

/// Build the full router for the given state.
///
/// Layer order, outermost first: trace → CORS → rate limit → (health is
/// public) → auth → idempotency → handlers. Auth sits outside the
/// idempotency layer so unauthenticated retries are rejected instead of
/// answered from the cache.
#[must_use]
pub fn build_router(state: Arc<ApiState>) -> Router {
    let store = state.idempotency_store.clone();
    let idempotency_config = state.idempotency_config.clone();

    let protected = Router::new()
        .nest("/api/schema", schema::router(state.clone()))
        .nest("/api/data", records::router(state.clone()))
        .nest("/api/admin", admin::router(state.clone()))
        .layer(axum::middleware::from_fn(move |req, next| {
            let store = store.clone();
            let config = idempotency_config.clone();
            async move {
                crate::idempotency::middleware::idempotency_middleware(store, config, req, next)
                    .await
            }
        }))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth::require_api_key,
        ));

    let router = protected
        .merge(health::router())
        .merge(health::ready_router(state.clone()));

    // Rate limiting across all endpoints
    let router = router.layer(axum::middleware::from_fn_with_state(
        state,
        rate_limit::rate_limit_middleware,
    ));

    // CORS layer for cross-origin requests from dashboards
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    router.layer(cors).layer(TraceLayer::new_for_http())
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
}

impl ApiServer {
    /// Assemble server state from configuration
    #[must_use]
    pub fn new(db: DbPool, config: &Config) -> Self {
        let schema_repo = SchemaRepo::new(db.clone());
        let record_repo = RecordRepo::new(db.clone(), schema_repo.clone());
        let key_repo = ApiKeyRepo::new(db.clone());

        if config.server.api_key.is_none() {
            tracing::warn!("no API key configured - API is open (development mode)");
        }

        let state = Arc::new(ApiState {
            db,
            api_key: config
                .server
                .api_key
                .clone()
                .map(|k| SecretString::new(k.into())),
            schema_repo,
            record_repo,
            key_repo,
            idempotency_store: Arc::new(MemoryStore::new()),
            idempotency_config: config.idempotency.clone(),
            rate_limiter: rate_limit::build(config.server.rate_limit_per_minute),
        });

        Self {
            state,
            port: config.server.port,
        }
    }

    /// Handle to the idempotency store, for wiring the expiry sweeper
    #[must_use]
    pub fn store(&self) -> SharedStore {
        self.state.idempotency_store.clone()
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(port = self.port, "API server listening");

        axum::serve(listener, build_router(self.state))
            .await
            .map_err(|e| Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}
