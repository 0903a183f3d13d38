//! HTTP server for the entity reconciliation service.
//!
//! This crate exposes a [`reconcile_engine::ReconciliationEngine`] over the
//! reconciliation wire protocol (spec §6) as a thin Axum REST layer, with
//! OpenAPI documentation served from `/swagger-ui`.

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

mod rest_server;

pub use reconcile_core::error::{Error, Result};
pub use rest_server::{build_router, AppState};

use reconcile_core::config::Config;
use reconcile_engine::ReconciliationEngine;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

/// Binds and runs the REST server until a Ctrl+C signal is received.
///
/// # Arguments
///
/// * `config` - process configuration; `config.server.port` selects the bind port
/// * `engine` - the reconciliation service instance to expose
///
/// # Returns
///
/// `Ok(())` on clean shutdown, or an error if the listener fails to bind.
pub async fn run_server(config: Config, engine: Arc<ReconciliationEngine>) -> Result<()> {
    let state = AppState { engine };
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(Error::Io)?;
    info!(%addr, "reconciliation server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(Error::Io)?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
