use crate::error::Result;
use crate::models::api::{HealthResponse, PresenceStatsResponse};
use crate::state::AppState;
use axum::{extract::State, Json};
use chrono::Utc;

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Aggregate presence counters.
pub async fn presence_stats(State(state): State<AppState>) -> Result<Json<PresenceStatsResponse>> {
    let stats = state.presence.stats().await?;
    Ok(Json(PresenceStatsResponse {
        stats,
        timestamp: Utc::now(),
    }))
}
