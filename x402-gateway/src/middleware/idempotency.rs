//! Idempotency: the pipeline's first stage.
//!
//! A request carrying an `idempotency-key` header is keyed by
//! `method|path|token`. A cache hit replays the stored status, stored
//! `payment-response` header, and stored body verbatim without running any
//! downstream stage. A cache miss runs the rest of the pipeline and, only if
//! the eventual response is 2xx, captures it before it is flushed to the
//! wire. Non-2xx responses are never cached — critical, since caching a 402
//! under a client's idempotency key would let that client lock itself out of
//! ever paying.

use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::server::AppState;

/// Upper bound on a buffered response body; this gateway proxies small JSON
/// payloads, never large file transfers.
const MAX_BUFFERED_BODY_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct CachedResponse {
    status: u16,
    payment_response: Option<String>,
    content_type: Option<String>,
    body: Vec<u8>,
}

impl IntoResponse for CachedResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK);
        let mut response = Response::builder().status(status);
        if let Some(content_type) = &self.content_type {
            response = response.header(header::CONTENT_TYPE, content_type);
        }
        if let Some(payment_response) = &self.payment_response {
            response = response.header("payment-response", payment_response.as_str());
        }
        response
            .body(Body::from(self.body))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
    }
}

/// Replays a cached response on a hit; otherwise runs the pipeline and
/// caches the result if it succeeded.
pub async fn middleware(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    let Some(token) = req.headers().get("idempotency-key").and_then(|v| v.to_str().ok().map(str::to_owned)) else {
        return next.run(req).await;
    };

    let key = format!("{}|{}|{token}", req.method(), req.uri().path());

    if let Some(cached) = state.idempotency_cache.get(&key) {
        return cached.into_response();
    }

    let response = next.run(req).await;

    if !response.status().is_success() {
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match to_bytes(body, MAX_BUFFERED_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(error) => {
            // The body exceeded the buffering cap or the stream errored mid-read,
            // so it cannot be recovered to serve verbatim. Surface this as an
            // error rather than silently downgrading a real success response to
            // an empty 200, which would misreport what actually happened.
            tracing::warn!(%error, "failed to buffer successful response for idempotency caching");
            return crate::error::GatewayError::Internal(error.to_string()).into_response();
        }
    };

    let payment_response = parts
        .headers
        .get("payment-response")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let content_type = parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    state.idempotency_cache.set(
        key,
        CachedResponse {
            status: parts.status.as_u16(),
            payment_response,
            content_type,
            body: bytes.to_vec(),
        },
    );

    Response::from_parts(parts, Body::from(bytes))
}
