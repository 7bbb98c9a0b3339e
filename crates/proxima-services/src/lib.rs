//! proxima-services: the signaling core.
//!
//! Client registry, proximity engine, negotiation relay and connection
//! lifecycle, driven by a single [`SignalingHub`] task that owns every write.

pub mod hub;
pub mod lifecycle;
pub mod outbox;
pub mod proximity;
pub mod registry;
pub mod relay;

pub use hub::{HubCommand, HubError, HubHandle, SignalingHub};
pub use outbox::{DeliveryStats, DeliveryStatsSnapshot, Outbox};
pub use proximity::ProximityDelta;
pub use registry::{ClientRecord, ClientView, Registry, RegistryError};
pub use relay::RelayOutcome;

#[cfg(test)]
mod test_support;
