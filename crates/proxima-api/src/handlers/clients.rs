//! /clients handler: per-connection diagnostics.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use super::ApiState;

#[derive(Debug, Serialize)]
pub struct ClientsResponse {
    pub clients: Vec<ClientInfo>,
}

/// Coordinates are deliberately left out.
#[derive(Debug, Serialize)]
pub struct ClientInfo {
    pub id: String,
    pub has_location: bool,
    pub radius_km: f64,
    pub peers: usize,
    pub connected_secs: u64,
    pub location_age_secs: Option<u64>,
}

pub async fn handle_clients(State(state): State<ApiState>) -> Json<ClientsResponse> {
    let clients = state
        .registry
        .snapshot()
        .into_iter()
        .map(|v| ClientInfo {
            id: v.handle.to_string(),
            has_location: v.location.is_some(),
            radius_km: v.radius_km,
            peers: v.known_peers.len(),
            connected_secs: v.connected_secs,
            location_age_secs: v.location_age_secs,
        })
        .collect();

    Json(ClientsResponse { clients })
}
