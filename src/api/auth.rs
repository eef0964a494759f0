//! API key authentication middleware
//!
//! Accepts the bootstrap key from configuration or any key whose SHA-256
//! digest is stored in the database.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use secrecy::ExposeSecret;

use super::ApiState;
use crate::security;

/// Extract API key from Authorization header
fn extract_api_key(req: &Request) -> Option<&str> {
    req.headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Middleware to verify API key
pub async fn require_api_key(
    State(state): State<Arc<ApiState>>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // If no API key configured, allow all requests (development mode)
    let Some(expected_key) = &state.api_key else {
        tracing::warn!("API key not configured - allowing unauthenticated access");
        return Ok(next.run(req).await);
    };

    let Some(provided) = extract_api_key(&req) else {
        tracing::debug!("no API key provided");
        return Err(StatusCode::UNAUTHORIZED);
    };

    if security::constant_time_eq(provided.as_bytes(), expected_key.expose_secret().as_bytes()) {
        return Ok(next.run(req).await);
    }

    // Not the bootstrap key; check stored key digests
    match state.key_repo.verify_hash(&security::hash_api_key(provided)) {
        Ok(true) => Ok(next.run(req).await),
        Ok(false) => {
            tracing::warn!("invalid API key provided");
            Err(StatusCode::UNAUTHORIZED)
        }
        Err(e) => {
            tracing::error!(error = %e, "API key verification failed");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_extract_api_key() {
        let mut req = Request::builder().body(Body::empty()).unwrap();

        // No header
        assert_eq!(extract_api_key(&req), None);

        // With Bearer token
        req.headers_mut().insert(
            "authorization",
            HeaderValue::from_static("Bearer tbl_test123"),
        );
        assert_eq!(extract_api_key(&req), Some("tbl_test123"));

        // Wrong scheme
        req.headers_mut()
            .insert("authorization", HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_api_key(&req), None);
    }
}
