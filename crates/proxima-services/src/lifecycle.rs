//! Connection lifecycle: setup on accept, symmetric teardown on close.

use tokio::sync::mpsc;

use proxima_core::{ClientHandle, ServerEvent, SessionHints};

use crate::outbox::Outbox;
use crate::registry::{ClientRecord, Registry};

/// Register a new client and tell it who it is.
pub fn connect(
    registry: &Registry,
    outbox: &Outbox,
    handle: ClientHandle,
    outbound: mpsc::Sender<ServerEvent>,
    hints: &SessionHints,
) {
    registry.insert(ClientRecord::new(handle, hints.default_radius_km, outbound));
    outbox.deliver(
        handle,
        ServerEvent::Connected {
            id: handle,
            hints: hints.clone(),
        },
    );
    tracing::info!(client = %handle, online = registry.len(), "client connected");
}

/// Remove a client and detach it from every peer that knew it.
///
/// Returns the peers that were told. Disconnecting twice is a no-op.
pub fn disconnect(registry: &Registry, outbox: &Outbox, handle: ClientHandle) -> Vec<ClientHandle> {
    let Some(record) = registry.remove(handle) else {
        tracing::debug!(client = %handle, "disconnect for unknown client ignored");
        return Vec::new();
    };

    let mut peers: Vec<_> = record.known_peers.into_iter().collect();
    peers.sort();
    for &peer in &peers {
        registry.remove_known_peer(peer, handle);
        outbox.deliver(peer, ServerEvent::PeerLeft(handle));
    }

    tracing::info!(
        client = %handle,
        peers_notified = peers.len(),
        online = registry.len(),
        "client disconnected"
    );
    peers
}
