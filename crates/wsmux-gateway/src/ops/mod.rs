//! Operational HTTP endpoints (separate listener, optional).
//!
//! - `/healthz` : liveness
//! - `/readyz`  : readiness (503 when draining)
//! - `/metrics` : Prometheus text format
//! - `/scopes`  : configured applications and their upgraded connections

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::app_state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/scopes", get(scopes))
        .with_state(state)
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    if state.is_draining() {
        (StatusCode::SERVICE_UNAVAILABLE, "draining")
    } else {
        (StatusCode::OK, "ready")
    }
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    let body = state.metrics().render(&state.metrics_extra());
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
        .into_response()
}

#[derive(Debug, Serialize)]
pub struct ScopeStatus {
    pub app: String,
    pub enabled: bool,
    pub connections: usize,
}

pub async fn scopes(State(state): State<AppState>) -> Json<Vec<ScopeStatus>> {
    let mgr = state.scopes();
    let body = mgr
        .apps()
        .into_iter()
        .map(|(app, enabled)| ScopeStatus {
            connections: mgr.connections_in(&app).len(),
            app,
            enabled,
        })
        .collect();
    Json(body)
}
