//! Configuration system for Farcast.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $FARCAST_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/farcast/config.toml
//!   3. ~/.config/farcast/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FarcastConfig {
    pub network: NetworkConfig,
    pub scheduler: SchedulerConfig,
    pub simulator: SimulatorConfig,
    pub topology: TopologyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// HTTP ingress port, bound on 127.0.0.1.
    pub api_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Link snapshot + routing table refresh period.
    pub routing_interval_ms: u64,
    /// Transmission attempt period.
    pub transmission_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Failure probability of every attempt, independent of distance.
    pub base_loss: f64,
    /// Extra failure probability per second of one-way light time.
    pub loss_per_light_second: f64,
    /// Wall-clock delay per second of light time. 0 = attempts complete at once.
    pub delay_scale: f64,
}

/// A `[topology]` section that is present but incomplete gets empty
/// fields, never the default Earth–Moon chain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
    /// Maximum usable link range. 0 = unlimited.
    pub max_range_km: f64,
    pub nodes: Vec<NodeConfig>,
    /// Spherical bodies that occlude line of sight.
    pub bodies: Vec<BodyConfig>,
}

/// One node. Exactly one of `position` or `orbit` must be set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub id: String,
    /// Fixed position, km.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<[f64; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orbit: Option<OrbitConfig>,
}

/// Circular orbit in the XY plane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrbitConfig {
    pub center: [f64; 3],
    pub radius_km: f64,
    pub period_secs: f64,
    #[serde(default)]
    pub phase_deg: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BodyConfig {
    pub name: String,
    pub center: [f64; 3],
    pub radius_km: f64,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

const EARTH_RADIUS_KM: f64 = 6_371.0;
const MOON_RADIUS_KM: f64 = 1_737.4;
const MOON_DISTANCE_KM: f64 = 384_400.0;

impl Default for NetworkConfig {
    fn default() -> Self {
        Self { api_port: 9100 }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            routing_interval_ms: 5_000,
            transmission_interval_ms: 1_000,
        }
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            base_loss: 0.05,
            loss_per_light_second: 0.02,
            delay_scale: 0.0,
        }
    }
}

impl Default for FarcastConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            scheduler: SchedulerConfig::default(),
            simulator: SimulatorConfig::default(),
            topology: TopologyConfig::earth_moon(),
        }
    }
}

impl TopologyConfig {
    /// Ground station, LEO and GEO relays, lunar gateway and lunar base,
    /// occluded by the Earth and the Moon.
    pub fn earth_moon() -> Self {
        let moon = [MOON_DISTANCE_KM, 0.0, 0.0];
        Self {
            max_range_km: 0.0,
            nodes: vec![
                NodeConfig::fixed("earth-gs", [EARTH_RADIUS_KM + 7.0, 0.0, 0.0]),
                NodeConfig::orbiting("leo-relay", [0.0; 3], EARTH_RADIUS_KM + 400.0, 5_554.0, 0.0),
                NodeConfig::orbiting("geo-relay", [0.0; 3], 42_164.0, 86_164.0, 30.0),
                NodeConfig::orbiting("lunar-gateway", moon, MOON_RADIUS_KM + 2_000.0, 40_000.0, 180.0),
                NodeConfig::fixed("lunar-base", [MOON_DISTANCE_KM - MOON_RADIUS_KM - 3.0, 0.0, 0.0]),
            ],
            bodies: vec![
                BodyConfig {
                    name: "earth".into(),
                    center: [0.0; 3],
                    radius_km: EARTH_RADIUS_KM,
                },
                BodyConfig {
                    name: "moon".into(),
                    center: moon,
                    radius_km: MOON_RADIUS_KM,
                },
            ],
        }
    }
}

impl NodeConfig {
    pub fn fixed(id: &str, position: [f64; 3]) -> Self {
        Self {
            id: id.to_string(),
            position: Some(position),
            orbit: None,
        }
    }

    pub fn orbiting(id: &str, center: [f64; 3], radius_km: f64, period_secs: f64, phase_deg: f64) -> Self {
        Self {
            id: id.to_string(),
            position: None,
            orbit: Some(OrbitConfig {
                center,
                radius_km,
                period_secs,
                phase_deg,
            }),
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("farcast")
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

impl FarcastConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            FarcastConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse a config file without applying env overrides.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("FARCAST_CONFIG")
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
            let text = toml::to_string_pretty(&FarcastConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Node ids in configuration order.
    pub fn node_ids(&self) -> Vec<String> {
        self.topology.nodes.iter().map(|n| n.id.clone()).collect()
    }

    /// Apply FARCAST_* env var overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(p) = lookup("FARCAST_NETWORK__API_PORT").and_then(|v| v.parse().ok()) {
            self.network.api_port = p;
        }
        if let Some(ms) = lookup("FARCAST_SCHEDULER__ROUTING_INTERVAL_MS").and_then(|v| v.parse().ok()) {
            self.scheduler.routing_interval_ms = ms;
        }
        if let Some(ms) =
            lookup("FARCAST_SCHEDULER__TRANSMISSION_INTERVAL_MS").and_then(|v| v.parse().ok())
        {
            self.scheduler.transmission_interval_ms = ms;
        }
        if let Some(p) = lookup("FARCAST_SIMULATOR__BASE_LOSS").and_then(|v| v.parse().ok()) {
            self.simulator.base_loss = p;
        }
        if let Some(p) = lookup("FARCAST_SIMULATOR__LOSS_PER_LIGHT_SECOND").and_then(|v| v.parse().ok()) {
            self.simulator.loss_per_light_second = p;
        }
        if let Some(s) = lookup("FARCAST_SIMULATOR__DELAY_SCALE").and_then(|v| v.parse().ok()) {
            self.simulator.delay_scale = s;
        }
    }
}
