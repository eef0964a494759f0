//! Schema introspection endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use super::{map_db_error, ApiState, ErrorResponse};
use crate::db::{TableDetail, TableInfo};

/// List user tables with row counts
async fn list_tables(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<Vec<TableInfo>>, (StatusCode, Json<ErrorResponse>)> {
    let tables = state
        .schema_repo
        .list_tables()
        .map_err(|e| map_db_error(&e))?;
    Ok(Json(tables))
}

/// Get column layout and row count for a single table
async fn get_table(
    State(state): State<Arc<ApiState>>,
    Path(table): Path<String>,
) -> Result<Json<TableDetail>, (StatusCode, Json<ErrorResponse>)> {
    let detail = state
        .schema_repo
        .table_detail(&table)
        .map_err(|e| map_db_error(&e))?;
    Ok(Json(detail))
}

/// Build the schema router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/tables", get(list_tables))
        .route("/tables/{table}", get(get_table))
        .with_state(state)
}
