//! proxima-core: shared types, geometry, wire events and configuration.
//! All other Proxima crates depend on this one.

pub mod config;
pub mod geo;
pub mod handle;
pub mod message;

pub use geo::{distance_km, Coordinates};
pub use handle::ClientHandle;
pub use message::{ClientMessage, ServerEvent, SessionHints, SignalKind};
