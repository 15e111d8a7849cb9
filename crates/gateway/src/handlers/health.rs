//! Health check handler

use axum::{extract::State, Json};
use ragline_common::db;
use serde::Serialize;
use std::time::Instant;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: String,
    pub database: &'static str,
    pub openai_configured: bool,
}

/// Always 200; database reachability is reported, never raised.
///
/// Each call opens its own short-lived connection rather than borrowing one
/// from the vectorstore pool.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let start = Instant::now();
    let connected = db::probe(
        &state.settings.database_url(),
        state.settings.health_probe_timeout(),
    )
    .await;

    tracing::debug!(
        connected,
        latency_ms = start.elapsed().as_millis() as u64,
        "Health probe finished"
    );

    Json(HealthResponse {
        status: "healthy",
        version: state.settings.app_version.clone(),
        database: if connected { "connected" } else { "disconnected" },
        openai_configured: state.settings.openai_configured(),
    })
}
