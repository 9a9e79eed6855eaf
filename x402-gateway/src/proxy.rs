//! Reverse-proxy handler: forwards a paid (or policy-free) request to the
//! upstream service with every x402 and hop-by-hop header stripped, then
//! splices the upstream response back into a gateway envelope.
//!
//! This is the enforcement point for the system's core invariant: the
//! upstream never sees any trace of the payment protocol.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, to_bytes};
use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::Value;

use crate::error::GatewayError;
use crate::scratch;
use crate::server::AppState;

/// Default path prefix stripped before forwarding to the upstream.
pub const PROXY_PREFIX: &str = "/proxy/";

const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

const MAX_BUFFERED_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Request headers that are never forwarded upstream: standard hop-by-hop
/// headers, `Host`/`Content-Length` (the proxied request has its own), and
/// every x402 payment header — the enforcement point for "upstream sees no
/// x402".
const STRIPPED_REQUEST_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
    "content-length",
    "payment-required",
    "payment-signature",
    "payment-response",
];

/// Response headers that are never copied back from upstream: the same
/// hop-by-hop set, plus `Content-Length` since the body is re-serialized
/// after envelope wrapping.
const STRIPPED_RESPONSE_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "content-length",
];

/// Forwards a request under the proxy prefix to `upstream_url + remainder`,
/// then wraps a JSON response in the gateway envelope if a receipt exists.
pub async fn proxy_handler(State(state): State<Arc<AppState>>, req: Request) -> Response {
    let receipt = scratch::receipt(req.extensions()).cloned();
    let gateway_path = req.uri().path().to_owned();
    let remainder = gateway_path.strip_prefix(PROXY_PREFIX).unwrap_or("");
    let query = req.uri().query().map(str::to_owned);

    let mut target_url = state.config.upstream_url.clone();
    target_url.set_path(&format!("/{remainder}"));
    target_url.set_query(query.as_deref());

    let method = req.method().clone();

    let has_explicit_content_type = req.headers().contains_key(header::CONTENT_TYPE);
    let request_headers = req.headers().clone();

    let body_bytes = match to_bytes(req.into_body(), MAX_BUFFERED_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(error) => return GatewayError::Internal(error.to_string()).into_response(),
    };

    let timeout = state
        .policies
        .find(&gateway_path, method.as_str())
        .map_or(DEFAULT_UPSTREAM_TIMEOUT, |policy| Duration::from_secs(policy.max_timeout_seconds));

    let mut builder = state.http_client.request(method, target_url).timeout(timeout);
    builder = forward_request_headers(builder, &request_headers);
    if !body_bytes.is_empty() && !has_explicit_content_type {
        builder = builder.header(header::CONTENT_TYPE.as_str(), "application/json");
    }
    if !body_bytes.is_empty() {
        builder = builder.body(body_bytes);
    }

    let upstream_response = match builder.send().await {
        Ok(response) => response,
        Err(error) => {
            tracing::warn!(path = %gateway_path, %error, "upstream request failed");
            return GatewayError::UpstreamUnreachable(error.to_string()).into_response();
        }
    };

    build_response(upstream_response, receipt).await
}

fn forward_request_headers(mut builder: reqwest::RequestBuilder, headers: &HeaderMap) -> reqwest::RequestBuilder {
    let mut seen = std::collections::HashSet::new();
    for name in headers.keys() {
        let lower = name.as_str().to_ascii_lowercase();
        if STRIPPED_REQUEST_HEADERS.contains(&lower.as_str()) || !seen.insert(lower.clone()) {
            continue;
        }
        let joined = headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect::<Vec<_>>()
            .join(", ");
        builder = builder.header(name.as_str(), joined);
    }
    builder
}

async fn build_response(upstream: reqwest::Response, receipt: Option<x402_proto::PaymentReceipt>) -> Response {
    let status = upstream.status();
    let upstream_headers = upstream.headers().clone();
    let is_json = upstream_headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));

    let body = match upstream.bytes().await {
        Ok(body) => body,
        Err(error) => return GatewayError::UpstreamUnreachable(error.to_string()).into_response(),
    };

    let mut response_builder = Response::builder().status(StatusCode::from_u16(status.as_u16()).unwrap_or(status_fallback()));
    for (name, value) in &upstream_headers {
        if STRIPPED_RESPONSE_HEADERS.contains(&name.as_str().to_ascii_lowercase().as_str()) {
            continue;
        }
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_str().as_bytes()),
            HeaderValue::from_bytes(value.as_bytes()),
        ) {
            response_builder = response_builder.header(name, value);
        }
    }

    if let Some(receipt) = &receipt {
        if let Ok(encoded) = x402_proto::encode_json(receipt) {
            if let Ok(value) = HeaderValue::from_str(&encoded) {
                response_builder = response_builder.header("payment-response", value);
            }
        }
    }

    let body = if is_json && receipt.is_some() {
        let data: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        let envelope = crate::envelope::GatewayResponse::new(status.is_success(), data, receipt);
        match serde_json::to_vec(&envelope) {
            Ok(bytes) => Body::from(bytes),
            Err(_) => Body::from(body),
        }
    } else {
        Body::from(body)
    };

    response_builder.body(body).unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

const fn status_fallback() -> StatusCode {
    StatusCode::BAD_GATEWAY
}
