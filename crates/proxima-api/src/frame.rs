//! Inbound frame decoding and sanitizing.
//!
//! The core assumes sane input, so bad coordinates and out-of-bounds radii
//! are rejected here, before anything reaches the hub.

use proxima_core::config::ProximityConfig;
use proxima_core::ClientMessage;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("malformed frame: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid location ({latitude}, {longitude})")]
    InvalidLocation { latitude: f64, longitude: f64 },
    #[error("radius {radius} km outside [{min}, {max}]")]
    RadiusOutOfBounds { radius: f64, min: f64, max: f64 },
    #[error("binary frames are not supported")]
    Binary,
}

/// Parse one text frame and check it against the configured bounds.
pub fn decode_frame(text: &str, bounds: &ProximityConfig) -> Result<ClientMessage, FrameError> {
    let msg: ClientMessage = serde_json::from_str(text)?;

    if let ClientMessage::UpdateLocation { location, radius } = &msg {
        if !location.is_valid() {
            return Err(FrameError::InvalidLocation {
                latitude: location.latitude,
                longitude: location.longitude,
            });
        }
        if !bounds.accepts_radius(*radius) {
            return Err(FrameError::RadiusOutOfBounds {
                radius: *radius,
                min: bounds.min_radius_km,
                max: bounds.max_radius_km,
            });
        }
    }
    Ok(msg)
}
