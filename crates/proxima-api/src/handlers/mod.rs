//! HTTP API handlers: exposes hub state as JSON.

pub mod clients;
pub mod status;

use std::sync::Arc;
use std::time::Instant;

use proxima_core::config::ProximaConfig;
use proxima_services::{DeliveryStats, HubHandle, Registry};

#[derive(Clone)]
pub struct ApiState {
    /// Front door to the signaling hub. All writes go through here.
    pub hub: HubHandle,
    /// Read-only view of the hub's registry.
    pub registry: Registry,
    pub stats: DeliveryStats,
    pub config: Arc<ProximaConfig>,
    pub started_at: Instant,
}

// Re-export handler functions for use in router setup.
pub use clients::handle_clients;
pub use status::handle_status;
