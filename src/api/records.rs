//! Row-level CRUD endpoints for user tables

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{error_response, map_db_error, ApiState, ErrorResponse};

/// Rows returned per request unless the caller asks for fewer
const DEFAULT_LIMIT: u32 = 100;

/// Hard cap on rows per request
const MAX_LIMIT: u32 = 1000;

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

#[derive(Serialize)]
pub struct RecordListResponse {
    pub records: Vec<Value>,
    pub total: usize,
}

#[derive(Serialize)]
pub struct RecordCreated {
    pub id: i64,
    pub table: String,
}

#[derive(Serialize)]
pub struct RecordUpdated {
    pub id: i64,
    pub table: String,
    pub updated: bool,
}

/// List rows from a table, newest rowids last
async fn list_records(
    State(state): State<Arc<ApiState>>,
    Path(table): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<RecordListResponse>, (StatusCode, Json<ErrorResponse>)> {
    let limit = query.limit.min(MAX_LIMIT);
    let records = state
        .record_repo
        .list(&table, limit)
        .map_err(|e| map_db_error(&e))?;
    let total = records.len();

    Ok(Json(RecordListResponse { records, total }))
}

/// Insert a row from a JSON object body
async fn create_record(
    State(state): State<Arc<ApiState>>,
    Path(table): Path<String>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<RecordCreated>), (StatusCode, Json<ErrorResponse>)> {
    let Some(fields) = body.as_object() else {
        return Err((
            StatusCode::BAD_REQUEST,
            error_response("bad_request", "request body must be a JSON object"),
        ));
    };

    let id = state
        .record_repo
        .insert(&table, fields)
        .map_err(|e| map_db_error(&e))?;

    Ok((StatusCode::CREATED, Json(RecordCreated { id, table })))
}

/// Update the named columns of a single row
async fn update_record(
    State(state): State<Arc<ApiState>>,
    Path((table, id)): Path<(String, i64)>,
    Json(body): Json<Value>,
) -> Result<Json<RecordUpdated>, (StatusCode, Json<ErrorResponse>)> {
    let Some(fields) = body.as_object() else {
        return Err((
            StatusCode::BAD_REQUEST,
            error_response("bad_request", "request body must be a JSON object"),
        ));
    };

    let changed = state
        .record_repo
        .update(&table, id, fields)
        .map_err(|e| map_db_error(&e))?;

    if !changed {
        return Err((
            StatusCode::NOT_FOUND,
            error_response("not_found", "record not found"),
        ));
    }

    Ok(Json(RecordUpdated {
        id,
        table,
        updated: true,
    }))
}

/// Delete a single row
async fn delete_record(
    State(state): State<Arc<ApiState>>,
    Path((table, id)): Path<(String, i64)>,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    let deleted = state
        .record_repo
        .delete(&table, id)
        .map_err(|e| map_db_error(&e))?;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((
            StatusCode::NOT_FOUND,
            error_response("not_found", "record not found"),
        ))
    }
}

/// Build the records router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/{table}", get(list_records).post(create_record))
        .route("/{table}/{id}", patch(update_record).delete(delete_record))
        .with_state(state)
}
