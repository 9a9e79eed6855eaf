//! `GET /.well-known/x402` discovery document handler.

use std::sync::Arc;

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use x402_proto::discovery::{DiscoveryAccept, DiscoveryDocument, OutputSchema};
use x402_proto::short_token;

use crate::server::AppState;

fn fallback_schema(method: &str) -> OutputSchema {
    OutputSchema {
        method: method.to_owned(),
        input: None,
        output: Some(serde_json::json!({ "data": { "type": "object" } })),
    }
}

/// Serves the discovery document assembled from every registered route
/// policy, with each entry's `network` normalized to its short token form.
pub async fn discovery_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let items = state
        .policies
        .iter()
        .map(|policy| {
            let resource = format!("{}{}", state.config.public_base_url, policy.path.trim_start_matches('/'));
            let mut accept = policy.to_accept(resource);
            accept.network = short_token(&accept.network).to_owned();
            DiscoveryAccept {
                accept,
                output_schema: policy
                    .output_schema
                    .clone()
                    .unwrap_or_else(|| fallback_schema(&policy.method)),
            }
        })
        .collect();

    let document = DiscoveryDocument {
        x402_version: 2,
        service_name: state.config.service_name.clone(),
        description: state.config.service_description.clone(),
        image_url: state.config.image_url.clone(),
        url: state.config.public_base_url.to_string(),
        items,
    };

    (
        [(header::CACHE_CONTROL, "public, max-age=300")],
        Json(document),
    )
}
