use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// GET /health: liveness probe, returns server metadata.
///
/// Stays 200 even when the session store is unreadable; `whatsapp` is then
/// reported as `"unknown"`.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let whatsapp = state
        .session
        .session()
        .map(|s| s.status.to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    let window = state.scheduler.window();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "whatsapp": whatsapp,
        "send_time": window.time().format("%H:%M").to_string(),
        "timezone": window.timezone().name(),
    }))
}
