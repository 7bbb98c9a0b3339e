//! Wire events exchanged with clients.
//!
//! Every frame is a JSON object `{"event": <name>, "data": <payload>}`.
//! Negotiation payloads are carried as opaque JSON and never inspected.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::geo::Coordinates;
use crate::handle::ClientHandle;

/// Kind of peer-connection negotiation message being relayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

impl SignalKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::IceCandidate => "ice-candidate",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A negotiation message addressed to another client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEnvelope {
    pub to: ClientHandle,
    #[serde(default)]
    pub payload: Value,
}

/// Frames sent by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// "My location is X, my radius is R" (radius in km).
    UpdateLocation { location: Coordinates, radius: f64 },
    Offer(SignalEnvelope),
    Answer(SignalEnvelope),
    IceCandidate(SignalEnvelope),
}

impl ClientMessage {
    /// Split a negotiation frame into its kind and envelope.
    /// Returns `None` for location updates.
    pub fn into_signal(self) -> Option<(SignalKind, SignalEnvelope)> {
        match self {
            Self::UpdateLocation { .. } => None,
            Self::Offer(env) => Some((SignalKind::Offer, env)),
            Self::Answer(env) => Some((SignalKind::Answer, env)),
            Self::IceCandidate(env) => Some((SignalKind::IceCandidate, env)),
        }
    }
}

/// A STUN/TURN server the client should hand to its peer connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    pub urls: String,
}

/// Client-side settings announced with the `connected` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionHints {
    pub min_radius_km: f64,
    pub max_radius_km: f64,
    pub default_radius_km: f64,
    /// How often the client should re-send its location.
    pub location_update_interval_ms: u64,
    pub ice_servers: Vec<IceServer>,
}

/// Frames sent by the server to one client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Assigned identity, sent once right after accept.
    Connected { id: ClientHandle, hints: SessionHints },
    PeerJoined(ClientHandle),
    PeerLeft(ClientHandle),
    /// Full in-range snapshot after each location update.
    PeersInRange(Vec<ClientHandle>),
    /// A negotiation message forwarded from another client.
    Relay {
        kind: SignalKind,
        from: ClientHandle,
        payload: Value,
    },
    /// Transport-level rejection of a frame. The core never emits this.
    Error { message: String },
}

impl ServerEvent {
    /// Event name as it appears on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::PeerJoined(_) => "peer-joined",
            Self::PeerLeft(_) => "peer-left",
            Self::PeersInRange(_) => "peers-in-range",
            Self::Relay { .. } => "relay",
            Self::Error { .. } => "error",
        }
    }
}
