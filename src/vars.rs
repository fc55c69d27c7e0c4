//! Debug Variables Endpoint
//!
//! A small HTTP listener that keeps the process alive and exposes
//! liveness plus basic runtime information for debugging. Not part of
//! the monitoring contract; nothing here touches the bus.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tracing::info;

struct VarsState {
    node: String,
    started_at: Instant,
}

/// `GET /healthz` — always returns 200 OK with `{"status": "ok"}`.
async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

/// `GET /debug/vars` — node identity, version, and uptime.
async fn debug_vars(State(state): State<Arc<VarsState>>) -> impl IntoResponse {
    let body = json!({
        "node": state.node,
        "version": env!("CARGO_PKG_VERSION"),
        "uptimeSeconds": state.started_at.elapsed().as_secs(),
    });
    (StatusCode::OK, Json(body))
}

fn router(state: Arc<VarsState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/debug/vars", get(debug_vars))
        .with_state(state)
}

/// Bind the debug endpoint and serve it until the process exits.
pub async fn serve(port: u16, node: String) -> Result<()> {
    let state = Arc::new(VarsState {
        node,
        started_at: Instant::now(),
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind debug endpoint on {}", addr))?;
    info!("debug endpoint listening on {}", addr);

    axum::serve(listener, router(state))
        .await
        .context("debug endpoint server exited")
}
