//! Configuration system for Proxima.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $PROXIMA_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/proxima/config.toml
//!   3. ~/.config/proxima/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

use crate::message::{IceServer, SessionHints};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProximaConfig {
    pub network: NetworkConfig,
    pub proximity: ProximityConfig,
    pub limits: LimitsConfig,
    pub client: ClientConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address the HTTP/WebSocket listener binds to.
    pub bind_addr: String,
    /// Listen port. `PORT` in the environment also overrides this.
    pub port: u16,
}

/// Radius bounds, in kilometres.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProximityConfig {
    pub min_radius_km: f64,
    pub max_radius_km: f64,
    /// Radius assigned to a client until its first location update.
    pub default_radius_km: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Capacity of the command queue feeding the hub.
    pub hub_queue_depth: usize,
    /// Per-client outbound queue. Events beyond this are dropped.
    pub outbound_queue_depth: usize,
    /// Largest inbound WebSocket frame accepted.
    pub max_frame_bytes: usize,
}

/// Settings handed to clients in the `connected` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub location_update_interval_ms: u64,
    pub ice_servers: Vec<String>,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for ProximityConfig {
    fn default() -> Self {
        Self {
            min_radius_km: 0.1,
            max_radius_km: 5.0,
            default_radius_km: 1.0,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            hub_queue_depth: 1024,
            outbound_queue_depth: 256,
            max_frame_bytes: 64 * 1024,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            location_update_interval_ms: 5_000,
            ice_servers: vec![
                "stun:stun.l.google.com:19302".to_string(),
                "stun:stun1.l.google.com:19302".to_string(),
            ],
        }
    }
}

// ── Radius handling ───────────────────────────────────────────────────────────

impl ProximityConfig {
    /// Force a radius into `[min, max]`. NaN and negatives become `min`.
    pub fn clamp_radius(&self, radius_km: f64) -> f64 {
        if radius_km.is_nan() || radius_km < self.min_radius_km {
            self.min_radius_km
        } else if radius_km > self.max_radius_km {
            self.max_radius_km
        } else {
            radius_km
        }
    }

    /// True if the transport should accept this radius as-is.
    pub fn accepts_radius(&self, radius_km: f64) -> bool {
        radius_km.is_finite() && radius_km >= self.min_radius_km && radius_km <= self.max_radius_km
    }

    /// Repair a hand-edited config: bounds non-negative and ordered,
    /// default inside them.
    pub fn normalized(mut self) -> Self {
        if !(self.min_radius_km.is_finite() && self.min_radius_km >= 0.0) {
            self.min_radius_km = 0.0;
        }
        if !self.max_radius_km.is_finite() || self.max_radius_km < self.min_radius_km {
            self.max_radius_km = self.min_radius_km;
        }
        self.default_radius_km = self.clamp_radius(self.default_radius_km);
        self
    }
}

impl ProximaConfig {
    /// Hints announced to each client on connect.
    pub fn session_hints(&self) -> SessionHints {
        SessionHints {
            min_radius_km: self.proximity.min_radius_km,
            max_radius_km: self.proximity.max_radius_km,
            default_radius_km: self.proximity.default_radius_km,
            location_update_interval_ms: self.client.location_update_interval_ms,
            ice_servers: self
                .client
                .ice_servers
                .iter()
                .map(|urls| IceServer { urls: urls.clone() })
                .collect(),
        }
    }

    /// `bind_addr:port`, ready for a listener.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.network.bind_addr, self.network.port)
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

pub fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("proxima")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl ProximaConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            ProximaConfig::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.proximity = config.proximity.normalized();
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("PROXIMA_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&ProximaConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply `PROXIMA_<SECTION>__<KEY>` overrides read through `var`.
    ///
    /// Every scalar key has one; `client.ice_servers` is file-only.
    /// Unparseable values are ignored and the file/default value stays.
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("PROXIMA_NETWORK__BIND_ADDR") {
            self.network.bind_addr = v;
        }
        // Bare PORT is what most hosting platforms set; the namespaced one wins.
        override_from(&var, "PORT", &mut self.network.port);
        override_from(&var, "PROXIMA_NETWORK__PORT", &mut self.network.port);

        let p = &mut self.proximity;
        override_from(&var, "PROXIMA_PROXIMITY__MIN_RADIUS_KM", &mut p.min_radius_km);
        override_from(&var, "PROXIMA_PROXIMITY__MAX_RADIUS_KM", &mut p.max_radius_km);
        override_from(&var, "PROXIMA_PROXIMITY__DEFAULT_RADIUS_KM", &mut p.default_radius_km);

        let l = &mut self.limits;
        override_from(&var, "PROXIMA_LIMITS__HUB_QUEUE_DEPTH", &mut l.hub_queue_depth);
        override_from(&var, "PROXIMA_LIMITS__OUTBOUND_QUEUE_DEPTH", &mut l.outbound_queue_depth);
        override_from(&var, "PROXIMA_LIMITS__MAX_FRAME_BYTES", &mut l.max_frame_bytes);

        override_from(
            &var,
            "PROXIMA_CLIENT__LOCATION_UPDATE_INTERVAL_MS",
            &mut self.client.location_update_interval_ms,
        );
    }
}

fn override_from<T: FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut T) {
    if let Some(v) = var(key).and_then(|v| v.parse().ok()) {
        *slot = v;
    }
}
