//! /status handler.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use proxima_services::DeliveryStatsSnapshot;

use super::ApiState;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub clients: usize,
    pub located: usize,
    /// Mutual in-range pairs.
    pub links: usize,
    pub delivery: DeliveryStatsSnapshot,
    pub uptime_secs: u64,
}

pub async fn handle_status(State(state): State<ApiState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        clients: state.registry.len(),
        located: state.registry.located_count(),
        links: state.registry.link_count(),
        delivery: state.stats.snapshot(),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}
