//! Relay of peer-connection negotiation messages.
//!
//! Offers, answers and ICE candidates pass through untouched. Delivery is
//! fire-and-forget: if the addressee is gone the message is dropped and the
//! sender hears nothing.

use serde_json::Value;

use proxima_core::{ClientHandle, ServerEvent, SignalKind};

use crate::outbox::Outbox;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    Forwarded,
    Dropped,
}

/// Forward `payload` from `from` to `to`, tagged with `kind`.
pub fn relay(
    outbox: &Outbox,
    kind: SignalKind,
    from: ClientHandle,
    to: ClientHandle,
    payload: Value,
) -> RelayOutcome {
    let forwarded = outbox.deliver(to, ServerEvent::Relay { kind, from, payload });
    outbox.stats().record_relay(forwarded);

    if forwarded {
        tracing::debug!(%kind, from = %from, to = %to, "relayed");
        RelayOutcome::Forwarded
    } else {
        tracing::debug!(%kind, from = %from, to = %to, "relay target unavailable, dropped");
        RelayOutcome::Dropped
    }
}
