//! Proximity engine: recomputes a client's mutually-in-range peers.
//!
//! Each run scans every other located client (linear in the number online),
//! diffs the result against the stored known-peer set, and notifies both
//! sides of every join and leave. The subject's own set is replaced before
//! any peer is touched, so a failed notification cannot corrupt it.

use std::collections::{BTreeSet, HashSet};

use proxima_core::{distance_km, ClientHandle, Coordinates, ServerEvent};

use crate::outbox::Outbox;
use crate::registry::{Registry, RegistryError};

/// Result of one recompute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProximityDelta {
    /// Current in-range set, sorted.
    pub in_range: Vec<ClientHandle>,
    pub joined: Vec<ClientHandle>,
    pub left: Vec<ClientHandle>,
}

impl ProximityDelta {
    pub fn is_unchanged(&self) -> bool {
        self.joined.is_empty() && self.left.is_empty()
    }
}

/// Mutual range: the distance must fit inside both radii.
pub fn in_range(a: Coordinates, a_radius_km: f64, b: Coordinates, b_radius_km: f64) -> bool {
    let d = distance_km(a, b);
    d <= a_radius_km && d <= b_radius_km
}

/// Peers currently in mutual range of `handle`. Empty if it has no location.
pub fn compute_in_range(
    registry: &Registry,
    handle: ClientHandle,
) -> Result<BTreeSet<ClientHandle>, RegistryError> {
    let (location, radius_km) = registry.position(handle)?;
    let Some(location) = location else {
        return Ok(BTreeSet::new());
    };

    Ok(registry
        .others_with_location(handle)
        .into_iter()
        .filter(|&(_, other, other_radius)| in_range(location, radius_km, other, other_radius))
        .map(|(peer, _, _)| peer)
        .collect())
}

/// Recompute `handle`'s in-range set and notify everyone affected.
///
/// Peers only get a direct edit of their known-peer set; their own
/// recompute is not triggered.
pub fn recompute(
    registry: &Registry,
    outbox: &Outbox,
    handle: ClientHandle,
) -> Result<ProximityDelta, RegistryError> {
    let computed = compute_in_range(registry, handle)?;
    apply_in_range(registry, outbox, handle, computed)
}

/// Store a scanned in-range set for `handle` and send the resulting joins,
/// leaves and snapshot. Peers that left the registry after the scan are
/// dropped from the set.
pub fn apply_in_range(
    registry: &Registry,
    outbox: &Outbox,
    handle: ClientHandle,
    computed: BTreeSet<ClientHandle>,
) -> Result<ProximityDelta, RegistryError> {
    let stored = registry.replace_known_peers(handle, computed.iter().copied().collect())?;

    let joined: Vec<_> = computed.iter().filter(|p| !stored.contains(*p)).copied().collect();
    let left: BTreeSet<_> = stored.iter().filter(|p| !computed.contains(*p)).copied().collect();

    let mut vanished = HashSet::new();
    for &peer in &joined {
        if !registry.add_known_peer(peer, handle) {
            // Disconnected between scan and notify.
            registry.remove_known_peer(handle, peer);
            vanished.insert(peer);
            continue;
        }
        outbox.deliver(handle, ServerEvent::PeerJoined(peer));
        outbox.deliver(peer, ServerEvent::PeerJoined(handle));
    }

    for &peer in &left {
        outbox.deliver(handle, ServerEvent::PeerLeft(peer));
        outbox.deliver(peer, ServerEvent::PeerLeft(handle));
        registry.remove_known_peer(peer, handle);
    }

    let in_range: Vec<_> = computed.into_iter().filter(|p| !vanished.contains(p)).collect();
    outbox.deliver(handle, ServerEvent::PeersInRange(in_range.clone()));

    let delta = ProximityDelta {
        in_range,
        joined: joined.into_iter().filter(|p| !vanished.contains(p)).collect(),
        left: left.into_iter().collect(),
    };
    if !delta.is_unchanged() {
        tracing::debug!(
            client = %handle,
            in_range = delta.in_range.len(),
            joined = delta.joined.len(),
            left = delta.left.len(),
            "proximity changed"
        );
    }
    Ok(delta)
}
