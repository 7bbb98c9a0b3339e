//! Signaling hub: the single task that owns every registry write.
//!
//! Connection tasks talk to the hub through [`HubHandle`]. Commands are
//! processed one at a time, each to completion, so a proximity recompute
//! that edits several records is never interleaved with another recompute
//! or a disconnect.

use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};

use proxima_core::config::{ProximaConfig, ProximityConfig};
use proxima_core::{ClientHandle, Coordinates, ServerEvent, SessionHints, SignalKind};

use crate::lifecycle;
use crate::outbox::{DeliveryStats, Outbox};
use crate::proximity::{self, ProximityDelta};
use crate::registry::{Registry, RegistryError};
use crate::relay::{self, RelayOutcome};

/// Inbound events from the transport.
#[derive(Debug)]
pub enum HubCommand {
    Connect {
        outbound: mpsc::Sender<ServerEvent>,
        reply: oneshot::Sender<ClientHandle>,
    },
    UpdateLocation {
        handle: ClientHandle,
        location: Coordinates,
        radius_km: f64,
    },
    Relay {
        from: ClientHandle,
        kind: SignalKind,
        to: ClientHandle,
        payload: Value,
    },
    Disconnect {
        handle: ClientHandle,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HubError {
    #[error("signaling hub is not running")]
    Closed,
}

/// Registry owner and command processor.
pub struct SignalingHub {
    registry: Registry,
    outbox: Outbox,
    proximity: ProximityConfig,
    hints: SessionHints,
    next_handle: ClientHandle,
}

impl SignalingHub {
    pub fn new(config: &ProximaConfig) -> Self {
        let registry = Registry::new();
        Self {
            outbox: Outbox::new(registry.clone()),
            registry,
            proximity: config.proximity.clone(),
            hints: config.session_hints(),
            next_handle: ClientHandle::from_raw(1),
        }
    }

    /// Shared read access for diagnostics.
    pub fn registry(&self) -> Registry {
        self.registry.clone()
    }

    pub fn stats(&self) -> DeliveryStats {
        self.outbox.stats().clone()
    }

    pub fn connect(&mut self, outbound: mpsc::Sender<ServerEvent>) -> ClientHandle {
        let handle = self.next_handle;
        self.next_handle = handle.next();
        lifecycle::connect(&self.registry, &self.outbox, handle, outbound, &self.hints);
        handle
    }

    /// Store the new position (radius clamped to bounds) and recompute.
    pub fn update_location(
        &mut self,
        handle: ClientHandle,
        location: Coordinates,
        radius_km: f64,
    ) -> Result<ProximityDelta, RegistryError> {
        let radius_km = self.proximity.clamp_radius(radius_km);
        self.registry.update_location(handle, location, radius_km)?;
        tracing::debug!(
            client = %handle,
            latitude = location.latitude,
            longitude = location.longitude,
            radius_km,
            "location updated"
        );
        proximity::recompute(&self.registry, &self.outbox, handle)
    }

    pub fn relay(
        &mut self,
        from: ClientHandle,
        kind: SignalKind,
        to: ClientHandle,
        payload: Value,
    ) -> RelayOutcome {
        relay::relay(&self.outbox, kind, from, to, payload)
    }

    pub fn disconnect(&mut self, handle: ClientHandle) -> Vec<ClientHandle> {
        lifecycle::disconnect(&self.registry, &self.outbox, handle)
    }

    /// Disconnect everyone. Leaves the registry empty.
    pub fn shutdown(&mut self) {
        let handles = self.registry.handles();
        tracing::info!(clients = handles.len(), "signaling hub shutting down");
        for handle in handles {
            self.disconnect(handle);
        }
    }

    pub fn handle_command(&mut self, cmd: HubCommand) {
        match cmd {
            HubCommand::Connect { outbound, reply } => {
                let handle = self.connect(outbound);
                if reply.send(handle).is_err() {
                    // Transport went away before hearing back.
                    self.disconnect(handle);
                }
            }
            HubCommand::UpdateLocation {
                handle,
                location,
                radius_km,
            } => {
                if let Err(e) = self.update_location(handle, location, radius_km) {
                    tracing::warn!(error = %e, "location update ignored");
                }
            }
            HubCommand::Relay {
                from,
                kind,
                to,
                payload,
            } => {
                self.relay(from, kind, to, payload);
            }
            HubCommand::Disconnect { handle } => {
                self.disconnect(handle);
            }
        }
    }

    /// Process commands until every handle is dropped or shutdown fires.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<HubCommand>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        tracing::info!("signaling hub started");
        loop {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },
                _ = shutdown.recv() => break,
            }
        }
        self.shutdown();
    }
}

/// Create the command channel. The receiver goes to [`SignalingHub::run`].
pub fn channel(depth: usize) -> (HubHandle, mpsc::Receiver<HubCommand>) {
    let (tx, rx) = mpsc::channel(depth.max(1));
    (HubHandle { tx }, rx)
}

/// Cloneable front door used by connection tasks.
#[derive(Clone)]
pub struct HubHandle {
    tx: mpsc::Sender<HubCommand>,
}

impl HubHandle {
    async fn send(&self, cmd: HubCommand) -> Result<(), HubError> {
        self.tx.send(cmd).await.map_err(|_| HubError::Closed)
    }

    /// Register a client. Events for it will arrive on `outbound`.
    pub async fn connect(
        &self,
        outbound: mpsc::Sender<ServerEvent>,
    ) -> Result<ClientHandle, HubError> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::Connect { outbound, reply }).await?;
        rx.await.map_err(|_| HubError::Closed)
    }

    pub async fn update_location(
        &self,
        handle: ClientHandle,
        location: Coordinates,
        radius_km: f64,
    ) -> Result<(), HubError> {
        self.send(HubCommand::UpdateLocation {
            handle,
            location,
            radius_km,
        })
        .await
    }

    pub async fn relay(
        &self,
        from: ClientHandle,
        kind: SignalKind,
        to: ClientHandle,
        payload: Value,
    ) -> Result<(), HubError> {
        self.send(HubCommand::Relay {
            from,
            kind,
            to,
            payload,
        })
        .await
    }

    pub async fn disconnect(&self, handle: ClientHandle) -> Result<(), HubError> {
        self.send(HubCommand::Disconnect { handle }).await
    }
}
