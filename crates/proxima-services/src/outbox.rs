//! Best-effort delivery of server events to client queues.
//!
//! Delivery never blocks and never fails the caller. A missing recipient,
//! a full queue or a closed channel drop the event and bump a counter.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;

use proxima_core::{ClientHandle, ServerEvent};

use crate::registry::Registry;

/// Delivery counters, shared with the status API.
#[derive(Clone, Default)]
pub struct DeliveryStats {
    delivered: Arc<AtomicU64>,
    dropped: Arc<AtomicU64>,
    relays_forwarded: Arc<AtomicU64>,
    relays_dropped: Arc<AtomicU64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeliveryStatsSnapshot {
    pub delivered: u64,
    pub dropped: u64,
    pub relays_forwarded: u64,
    pub relays_dropped: u64,
}

impl DeliveryStats {
    pub fn record_relay(&self, forwarded: bool) {
        let counter = if forwarded {
            &self.relays_forwarded
        } else {
            &self.relays_dropped
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DeliveryStatsSnapshot {
        DeliveryStatsSnapshot {
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            relays_forwarded: self.relays_forwarded.load(Ordering::Relaxed),
            relays_dropped: self.relays_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Pushes events onto the outbound queue of a registered client.
#[derive(Clone)]
pub struct Outbox {
    registry: Registry,
    stats: DeliveryStats,
}

impl Outbox {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            stats: DeliveryStats::default(),
        }
    }

    pub fn stats(&self) -> &DeliveryStats {
        &self.stats
    }

    /// Queue `event` for `to`. Returns whether it was queued.
    pub fn deliver(&self, to: ClientHandle, event: ServerEvent) -> bool {
        let Some(tx) = self.registry.outbound(to) else {
            tracing::debug!(to = %to, event = event.name(), "recipient gone, event dropped");
            self.stats.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        };

        match tx.try_send(event) {
            Ok(()) => {
                self.stats.delivered.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Full(event)) => {
                tracing::warn!(
                    to = %to,
                    event = event.name(),
                    "outbound queue full, event dropped"
                );
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(TrySendError::Closed(event)) => {
                tracing::debug!(
                    to = %to,
                    event = event.name(),
                    "outbound queue closed, event dropped"
                );
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }
}
