//! Replay protection: the pipeline's third stage.
//!
//! Two concurrent requests carrying the same `(nonce, memo)` pair must
//! result in exactly one passing and one rejected with 409. The guard relies
//! on [`crate::cache::TtlCache::insert_if_absent`] for the atomic
//! check-then-insert; the nonce is recorded *before* settlement so a retry
//! cannot slip through while the facilitator call is in flight.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::GatewayError;
use crate::scratch;
use crate::server::AppState;

/// Rejects a request whose payload nonce (plus memo) has already been consumed.
///
/// Skipped entirely when no `payment-signature` header was sent, or when
/// signature validation already rejected the request (no payload in scratch).
pub async fn middleware(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    if req.headers().get("payment-signature").is_none() {
        return next.run(req).await;
    }

    let Some(payload) = scratch::payload(req.extensions()) else {
        return next.run(req).await;
    };

    let key = nonce_key(&payload.nonce, payload.memo.as_deref());

    if !state.nonce_cache.insert_if_absent(key, ()) {
        tracing::warn!(path = req.uri().path(), "replay detected for already-consumed nonce");
        return GatewayError::Replay.into_response();
    }

    next.run(req).await
}

fn nonce_key(nonce: &str, memo: Option<&str>) -> String {
    format!("{nonce}|{}", memo.unwrap_or(""))
}
