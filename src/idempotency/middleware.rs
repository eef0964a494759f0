//! Duplicate-write interception middleware
//!
//! Sits in front of the routers and replays cached responses for retried
//! writes. Reads and requests without a token pass through untouched.

use axum::Json;
use axum::body::{Body, to_bytes};
use axum::extract::Request;
use axum::http::{Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde_json::{Value, json};

use super::{CachedEntry, FailMode, IdempotencyConfig, SharedStore, derive_key};

/// Request header carrying the client-supplied idempotency token
pub const IDEMPOTENCY_HEADER: &str = "x-idempotency-key";

/// Machine-readable code in duplicate conflict responses
pub const DUPLICATE_CODE: &str = "DUPLICATE_REQUEST";

/// Methods eligible for idempotency protection
fn is_write_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

/// Extract a non-empty idempotency token from the request headers
fn extract_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get(IDEMPOTENCY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
}

/// Deduplicate retried writes.
///
/// 1. Reads and tokenless writes pass through untouched.
/// 2. A token matching a live cached entry short-circuits with a 409
///    conflict carrying the original response.
/// 3. Otherwise the request executes and a 200–399 response is captured
///    for later replay. Failures are never cached, so clients may retry
///    them with the same token.
///
/// Two concurrent first requests with the same key can both execute; the
/// later capture wins. See [`super::IdempotencyStore`] for the strict
/// alternative.
pub async fn idempotency_middleware(
    store: SharedStore,
    config: IdempotencyConfig,
    request: Request,
    next: Next,
) -> Response {
    if !is_write_method(request.method()) {
        return next.run(request).await;
    }

    let Some(token) = extract_token(&request) else {
        tracing::debug!(
            method = %request.method(),
            path = request.uri().path(),
            "no idempotency key provided"
        );
        return next.run(request).await;
    };

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let Some(key) = derive_key(&method, &path, &token) else {
        return next.run(request).await;
    };

    match tokio::time::timeout(config.store_timeout, store.lookup(&key)).await {
        Ok(Ok(Some(entry))) => {
            let now = Utc::now();
            tracing::warn!(
                method = %method,
                path = %path,
                token = %token,
                age_seconds = entry.age_seconds(now),
                "duplicate request blocked"
            );
            return conflict_response(&entry, now);
        }
        Ok(Ok(None)) => {}
        Ok(Err(e)) => {
            if let Some(response) =
                store_failure_response(config.fail_mode, "lookup", &e.to_string())
            {
                return response;
            }
        }
        Err(_) => {
            if let Some(response) =
                store_failure_response(config.fail_mode, "lookup", "timed out")
            {
                return response;
            }
        }
    }

    let response = next.run(request).await;
    capture_response(&store, &config, &key, response).await
}

/// Build the 409 conflict that replays a cached entry.
///
/// The cached body is embedded as JSON when it parses, otherwise as a
/// string, so callers always get a well-formed conflict document.
fn conflict_response(entry: &CachedEntry, now: DateTime<Utc>) -> Response {
    let original: Value = serde_json::from_slice(&entry.body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&entry.body).into_owned()));

    let body = json!({
        "success": false,
        "code": DUPLICATE_CODE,
        "message": "A request with this idempotency key was already processed. \
                    Wait for the entry to expire or retry with a new key.",
        "originalResponse": original,
        "processedAt": entry.created_at.to_rfc3339(),
        "ageSeconds": entry.age_seconds(now),
    });

    (StatusCode::CONFLICT, Json(body)).into_response()
}

/// Cache a successful downstream response, then forward the same bytes.
///
/// Store problems never change the business outcome: the response the
/// handler produced is returned regardless. The one exception is a failure
/// while buffering the body itself — at that point the original stream is
/// already consumed and cannot be forwarded, so the client gets a 500.
async fn capture_response(
    store: &SharedStore,
    config: &IdempotencyConfig,
    key: &str,
    response: Response,
) -> Response {
    let status = response.status();
    if !(status.is_success() || status.is_redirection()) {
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(error = %e, key, "failed to buffer response body");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let entry = CachedEntry {
        body: bytes.to_vec(),
        status: status.as_u16(),
        created_at: Utc::now(),
    };

    match tokio::time::timeout(config.store_timeout, store.insert(key, entry)).await {
        Ok(Ok(())) => {
            tracing::debug!(key, status = status.as_u16(), "response cached for replay");
        }
        Ok(Err(e)) => {
            tracing::error!(error = %e, key, "failed to cache response");
        }
        Err(_) => {
            tracing::error!(key, "idempotency cache write timed out");
        }
    }

    Response::from_parts(parts, Body::from(bytes))
}

/// Map a store failure onto the configured fail mode; `None` means
/// continue as a cache miss.
fn store_failure_response(fail_mode: FailMode, operation: &str, detail: &str) -> Option<Response> {
    match fail_mode {
        FailMode::Open => {
            tracing::warn!(
                error = detail,
                "idempotency {operation} failed, allowing request through (fail-open mode)"
            );
            None
        }
        FailMode::Closed => {
            tracing::error!(
                error = detail,
                "idempotency {operation} failed, rejecting request (fail-closed mode)"
            );
            Some(
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "idempotency store unavailable",
                )
                    .into_response(),
            )
        }
    }
}
