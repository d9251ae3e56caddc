//! wsmux gateway
//!
//! One TCP listener shared by native-protocol clients and WebSocket clients.
//! - First bytes classify the socket (upgrade request => WebSocket, else native)
//! - WebSocket payloads are unframed before the upstream sees them
//! - Optional ops listener: /healthz, /readyz, /metrics
//!
//! Usage: `wsmux-gateway [config.yaml]` (default `wsmux.yaml`).

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing_subscriber::{fmt, EnvFilter};

use wsmux_core::error::{Result, WsMuxError};
use wsmux_gateway::upstream::TraceUpstream;
use wsmux_gateway::{app_state::AppState, config, ops, transport};

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "wsmux.yaml".to_string());
    let cfg = config::load_from_file(&path)?;
    let listen = cfg.gateway.listen_addr()?;
    let ops_listen = cfg.ops.as_ref().map(|o| o.listen_addr()).transpose()?;

    let state = AppState::new(cfg, Arc::new(TraceUpstream))?;

    if let Some(addr) = ops_listen {
        let listener = TcpListener::bind(addr).await?;
        let app = ops::build_router(state.clone());
        tracing::info!(%addr, "ops endpoints listening");
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "ops server failed");
            }
        });
    }

    let listener = TcpListener::bind(listen).await?;
    tracing::info!(%listen, "wsmux-gateway starting");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server = tokio::spawn(transport::serve(listener, state.clone(), shutdown_rx));

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested, draining");
    state.metrics().set_draining();
    let _ = shutdown_tx.send(true);

    server
        .await
        .map_err(|e| WsMuxError::Internal(format!("listener task failed: {e}")))?
}
