//! Health endpoint.

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub db_connected: bool,
    pub version: &'static str,
}

/// `GET /health` — liveness plus store reachability.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_connected = state.store.count_users().await.is_ok();
    Json(HealthResponse {
        status: "ok",
        db_connected,
        version: authhub_core::version(),
    })
}
