//! Client registry: one record per live connection.
//!
//! Concurrent map from handle to ClientRecord. Only the hub task writes;
//! the HTTP API reads concurrently. No method holds a map guard while
//! touching a second key, so shard locks never nest.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;

use proxima_core::{ClientHandle, Coordinates, ServerEvent};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("handle not found: {0}")]
    HandleNotFound(ClientHandle),
}

/// State kept for one connected client.
#[derive(Debug)]
pub struct ClientRecord {
    pub handle: ClientHandle,
    /// Absent until the first location update.
    pub location: Option<Coordinates>,
    pub radius_km: f64,
    /// Last computed in-range set. Symmetric across the registry at rest.
    pub known_peers: HashSet<ClientHandle>,
    /// Queue drained by the client's transport task.
    pub outbound: mpsc::Sender<ServerEvent>,
    pub connected_at: Instant,
    pub updated_at: Option<Instant>,
}

impl ClientRecord {
    /// A freshly accepted client: no location, default radius, no peers.
    pub fn new(handle: ClientHandle, radius_km: f64, outbound: mpsc::Sender<ServerEvent>) -> Self {
        Self {
            handle,
            location: None,
            radius_km,
            known_peers: HashSet::new(),
            outbound,
            connected_at: Instant::now(),
            updated_at: None,
        }
    }
}

/// Read-only copy of a record, without the outbound channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientView {
    pub handle: ClientHandle,
    pub location: Option<Coordinates>,
    pub radius_km: f64,
    pub known_peers: Vec<ClientHandle>,
    pub connected_secs: u64,
    /// Seconds since the last location update.
    pub location_age_secs: Option<u64>,
}

impl From<&ClientRecord> for ClientView {
    fn from(r: &ClientRecord) -> Self {
        let mut known_peers: Vec<_> = r.known_peers.iter().copied().collect();
        known_peers.sort();
        Self {
            handle: r.handle,
            location: r.location,
            radius_km: r.radius_km,
            known_peers,
            connected_secs: r.connected_at.elapsed().as_secs(),
            location_age_secs: r.updated_at.map(|t| t.elapsed().as_secs()),
        }
    }
}

/// The registry, cheap to clone and shared between the hub and the API.
#[derive(Clone, Default)]
pub struct Registry {
    clients: Arc<DashMap<ClientHandle, ClientRecord>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            clients: Arc::new(DashMap::new()),
        }
    }

    /// Insert on connect. Returns the record previously under this handle, if any.
    pub fn insert(&self, record: ClientRecord) -> Option<ClientRecord> {
        self.clients.insert(record.handle, record)
    }

    pub fn get(&self, handle: ClientHandle) -> Result<ClientView, RegistryError> {
        self.clients
            .get(&handle)
            .map(|r| ClientView::from(r.value()))
            .ok_or(RegistryError::HandleNotFound(handle))
    }

    /// Set location and radius on an existing record.
    pub fn update_location(
        &self,
        handle: ClientHandle,
        location: Coordinates,
        radius_km: f64,
    ) -> Result<(), RegistryError> {
        let mut record = self
            .clients
            .get_mut(&handle)
            .ok_or(RegistryError::HandleNotFound(handle))?;
        record.location = Some(location);
        record.radius_km = radius_km;
        record.updated_at = Some(Instant::now());
        Ok(())
    }

    /// Remove on disconnect. A second remove of the same handle returns `None`.
    pub fn remove(&self, handle: ClientHandle) -> Option<ClientRecord> {
        self.clients.remove(&handle).map(|(_, r)| r)
    }

    /// Location and radius of the subject, if it is registered.
    pub fn position(
        &self,
        handle: ClientHandle,
    ) -> Result<(Option<Coordinates>, f64), RegistryError> {
        self.clients
            .get(&handle)
            .map(|r| (r.location, r.radius_km))
            .ok_or(RegistryError::HandleNotFound(handle))
    }

    /// Every client other than `handle` that has reported a location.
    pub fn others_with_location(
        &self,
        handle: ClientHandle,
    ) -> Vec<(ClientHandle, Coordinates, f64)> {
        self.clients
            .iter()
            .filter(|r| r.handle != handle)
            .filter_map(|r| r.location.map(|loc| (r.handle, loc, r.radius_km)))
            .collect()
    }

    pub fn known_peers(
        &self,
        handle: ClientHandle,
    ) -> Result<HashSet<ClientHandle>, RegistryError> {
        self.clients
            .get(&handle)
            .map(|r| r.known_peers.clone())
            .ok_or(RegistryError::HandleNotFound(handle))
    }

    /// Swap in a new known-peer set and hand back the old one.
    pub fn replace_known_peers(
        &self,
        handle: ClientHandle,
        peers: HashSet<ClientHandle>,
    ) -> Result<HashSet<ClientHandle>, RegistryError> {
        let mut record = self
            .clients
            .get_mut(&handle)
            .ok_or(RegistryError::HandleNotFound(handle))?;
        Ok(std::mem::replace(&mut record.known_peers, peers))
    }

    /// Add `other` to `handle`'s known peers. False if `handle` is gone.
    pub fn add_known_peer(&self, handle: ClientHandle, other: ClientHandle) -> bool {
        match self.clients.get_mut(&handle) {
            Some(mut r) => {
                r.known_peers.insert(other);
                true
            }
            None => false,
        }
    }

    /// Remove `other` from `handle`'s known peers. False if `handle` is gone.
    pub fn remove_known_peer(&self, handle: ClientHandle, other: ClientHandle) -> bool {
        match self.clients.get_mut(&handle) {
            Some(mut r) => {
                r.known_peers.remove(&other);
                true
            }
            None => false,
        }
    }

    /// Clone of the client's outbound sender.
    pub fn outbound(&self, handle: ClientHandle) -> Option<mpsc::Sender<ServerEvent>> {
        self.clients.get(&handle).map(|r| r.outbound.clone())
    }

    pub fn handles(&self) -> Vec<ClientHandle> {
        self.clients.iter().map(|r| *r.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Clients that have reported a location.
    pub fn located_count(&self) -> usize {
        self.clients.iter().filter(|r| r.location.is_some()).count()
    }

    /// Number of mutual in-range pairs.
    pub fn link_count(&self) -> usize {
        self.clients.iter().map(|r| r.known_peers.len()).sum::<usize>() / 2
    }

    /// Views of every client, ordered by handle.
    pub fn snapshot(&self) -> Vec<ClientView> {
        let mut views: Vec<_> = self.clients.iter().map(|r| ClientView::from(r.value())).collect();
        views.sort_by_key(|v| v.handle);
        views
    }
}
