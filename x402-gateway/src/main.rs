//! Binary entry point: load configuration, assemble state, serve the router.

use std::net::SocketAddr;
use std::sync::Arc;

use x402_gateway::config::Config;
use x402_gateway::server::{AppState, app};
use x402_gateway::logging;

#[tokio::main]
async fn main() {
    logging::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(error) => {
            tracing::error!(%error, "failed to load configuration");
            std::process::exit(1);
        }
    };

    let port = config.port;
    let mock_payments = config.mock_payments;

    let state = match AppState::new(config) {
        Ok(state) => Arc::new(state),
        Err(error) => {
            tracing::error!(%error, "failed to construct facilitator client");
            std::process::exit(1);
        }
    };

    tracing::info!(port, mock_payments, "gateway starting");

    let router = app(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(error) => {
            tracing::error!(%error, %addr, "failed to bind listener");
            std::process::exit(1);
        }
    };

    tracing::info!(%addr, "gateway listening");

    if let Err(error) = axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await {
        tracing::error!(%error, "server error");
        std::process::exit(1);
    }

    tracing::info!("gateway shut down gracefully");
}

/// Waits for Ctrl-C or, on Unix, SIGTERM, to initiate graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let Ok(mut sigterm) = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) else {
            let _ = ctrl_c.await;
            tracing::info!("received ctrl-c, shutting down");
            return;
        };
        tokio::select! {
            _ = ctrl_c => tracing::info!("received ctrl-c, shutting down"),
            _ = sigterm.recv() => tracing::info!("received sigterm, shutting down"),
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
        tracing::info!("received ctrl-c, shutting down");
    }
}
