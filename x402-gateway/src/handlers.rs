//! Local (non-proxied) route handlers.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;

use crate::envelope::GatewayResponse;
use crate::scratch;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct EchoQuery {
    #[serde(default)]
    msg: Option<String>,
}

/// `GET /v1/premium/echo`: the gateway's own paid demo resource, echoing the
/// `msg` query parameter back alongside the receipt the payment gate attached.
pub async fn echo_handler(
    State(_state): State<Arc<AppState>>,
    Query(query): Query<EchoQuery>,
    request: axum::extract::Request,
) -> impl IntoResponse {
    let receipt = scratch::receipt(request.extensions()).cloned();
    let data = json!({
        "echo": query.msg.unwrap_or_else(|| "hello from the x402 gateway".to_owned()),
        "ts": chrono::Utc::now().to_rfc3339(),
    });
    Json(GatewayResponse::new(true, data, receipt))
}
