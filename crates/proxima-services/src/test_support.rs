//! Shared fixtures for the unit tests in this crate.

use std::collections::HashMap;

use tokio::sync::mpsc;

use proxima_core::{ClientHandle, Coordinates, ServerEvent};

use crate::outbox::Outbox;
use crate::proximity::{self, ProximityDelta};
use crate::registry::{ClientRecord, Registry};

/// A registry plus the receiving end of every client's queue.
pub struct Harness {
    pub registry: Registry,
    pub outbox: Outbox,
    inboxes: HashMap<ClientHandle, mpsc::Receiver<ServerEvent>>,
}

impl Harness {
    pub fn new() -> Self {
        let registry = Registry::new();
        Self {
            outbox: Outbox::new(registry.clone()),
            registry,
            inboxes: HashMap::new(),
        }
    }

    /// Register a client with the default 1 km radius.
    pub fn add(&mut self, raw: u64) {
        let handle = ClientHandle::from_raw(raw);
        let (tx, rx) = mpsc::channel(64);
        self.registry.insert(ClientRecord::new(handle, 1.0, tx));
        self.inboxes.insert(handle, rx);
    }

    /// Move a client and run the proximity engine for it.
    pub fn place(&mut self, raw: u64, lat: f64, lon: f64, radius_km: f64) -> ProximityDelta {
        let handle = ClientHandle::from_raw(raw);
        self.registry
            .update_location(handle, Coordinates::new(lat, lon), radius_km)
            .unwrap();
        proximity::recompute(&self.registry, &self.outbox, handle).unwrap()
    }

    /// Everything queued for a client so far.
    pub fn drain(&mut self, raw: u64) -> Vec<ServerEvent> {
        let rx = self
            .inboxes
            .get_mut(&ClientHandle::from_raw(raw))
            .expect("client was never added");
        let mut events = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            events.push(ev);
        }
        events
    }

    /// Every known-peer edge has its reverse, and points at a live client.
    pub fn assert_symmetric(&self) {
        for handle in self.registry.handles() {
            for peer in self.registry.known_peers(handle).unwrap() {
                let back = self
                    .registry
                    .known_peers(peer)
                    .unwrap_or_else(|_| panic!("{handle} knows departed peer {peer}"));
                assert!(back.contains(&handle), "{handle} -> {peer} has no reverse edge");
            }
        }
    }
}
