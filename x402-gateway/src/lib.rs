//! Reverse-proxy payment gateway enforcing the x402 v2 HTTP 402 protocol.
//!
//! The binary entry point is thin (`main.rs`): load [`config::Config`],
//! build [`server::AppState`], and serve [`server::app`]. Everything else —
//! the pipeline, the caches, the facilitator client — lives here so it can
//! be exercised with `tower::ServiceExt::oneshot` without binding a socket.

pub mod cache;
pub mod config;
pub mod discovery;
pub mod envelope;
pub mod error;
pub mod facilitator;
pub mod handlers;
pub mod logging;
pub mod middleware;
pub mod policy;
pub mod proxy;
pub mod scratch;
pub mod server;
