use crate::{models::HealthResponse, AppState};
use axum::{extract::State, Json};
use chrono::Utc;
use std::sync::Arc;

/// Handler for GET /api/health. Liveness only: answers even while storage
/// is still connecting.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        database: state.database.status().to_string(),
        timestamp: Utc::now(),
    })
}
