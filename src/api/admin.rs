//! Admin endpoints: idempotency cache operations and API key management

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::{ApiState, ErrorResponse, error_response};
use crate::idempotency::EntrySummary;
use crate::security;

// --- Request/Response types ---

/// Idempotency cache statistics
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdempotencyStats {
    pub size: usize,
    pub ttl_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_entry: Option<EntrySummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest_entry: Option<EntrySummary>,
}

#[derive(Serialize)]
pub struct ClearResponse {
    pub cleared: usize,
}

#[derive(Deserialize)]
pub struct CreateKeyRequest {
    pub name: String,
}

/// Response to key creation; the only place the plaintext key ever appears
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyCreatedResponse {
    pub id: String,
    pub name: String,
    pub key: String,
    pub created_at: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyResponse {
    pub id: String,
    pub name: String,
    pub created_at: String,
}

// --- Handlers ---

/// Report idempotency store size, TTL, and boundary entries
async fn idempotency_stats(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<IdempotencyStats>, (StatusCode, Json<ErrorResponse>)> {
    let snapshot = state
        .idempotency_store
        .stats(Utc::now())
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_response("store_error", &e.to_string()),
            )
        })?;

    Ok(Json(IdempotencyStats {
        size: snapshot.size,
        ttl_seconds: state.idempotency_config.ttl.as_secs(),
        oldest_entry: snapshot.oldest_entry,
        newest_entry: snapshot.newest_entry,
    }))
}

/// Drop all cached idempotency entries
async fn clear_idempotency(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<ClearResponse>, (StatusCode, Json<ErrorResponse>)> {
    let cleared = state.idempotency_store.clear().await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_response("store_error", &e.to_string()),
        )
    })?;

    tracing::info!(prior_size = cleared, "idempotency cache cleared");
    Ok(Json(ClearResponse { cleared }))
}

/// Mint a new API key and store its digest
async fn create_key(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<CreateKeyRequest>,
) -> Result<(StatusCode, Json<KeyCreatedResponse>), (StatusCode, Json<ErrorResponse>)> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            error_response("bad_request", "key name must not be empty"),
        ));
    }

    let plaintext = security::generate_api_key();
    let stored = state
        .key_repo
        .create(name, &security::hash_api_key(&plaintext))
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_response("db_error", &e.to_string()),
            )
        })?;

    tracing::info!(id = %stored.id, name = %stored.name, "API key created");

    Ok((
        StatusCode::CREATED,
        Json(KeyCreatedResponse {
            id: stored.id,
            name: stored.name,
            key: plaintext,
            created_at: stored.created_at.to_rfc3339(),
        }),
    ))
}

/// List stored API keys (digests are never returned)
async fn list_keys(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<Vec<KeyResponse>>, (StatusCode, Json<ErrorResponse>)> {
    let keys = state.key_repo.list().map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_response("db_error", &e.to_string()),
        )
    })?;

    Ok(Json(
        keys.into_iter()
            .map(|k| KeyResponse {
                id: k.id,
                name: k.name,
                created_at: k.created_at.to_rfc3339(),
            })
            .collect(),
    ))
}

/// Revoke an API key
async fn delete_key(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    let deleted = state.key_repo.delete(&id).map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_response("db_error", &e.to_string()),
        )
    })?;

    if deleted {
        tracing::info!(%id, "API key revoked");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((
            StatusCode::NOT_FOUND,
            error_response("not_found", "API key not found"),
        ))
    }
}

/// Build the admin router (the caller layers auth on top)
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/idempotency/stats", get(idempotency_stats))
        .route("/idempotency", delete(clear_idempotency))
        .route("/keys", post(create_key).get(list_keys))
        .route("/keys/{id}", delete(delete_key))
        .with_state(state)
}
