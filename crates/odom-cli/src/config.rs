//! Configuration file – reads/writes `~/.motor_odom/config.toml`.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use odom_core::OdometryConfig;
use odom_middleware::BridgeTopics;
use odom_types::OdomError;
use serde::{Deserialize, Serialize};

/// Environment variable that replaces the default config path.
pub const CONFIG_PATH_VAR: &str = "MOTOR_ODOM_CONFIG";

/// Persisted node configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Queue depth of every event bus lane.
    #[serde(default = "default_bus_capacity")]
    pub bus_capacity: usize,

    #[serde(default)]
    pub odometry: OdometryConfig,

    #[serde(default)]
    pub topics: TopicsConfig,

    #[serde(default)]
    pub bridge: BridgeConfig,

    #[serde(default)]
    pub sim: SimConfig,
}

/// External topic names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicsConfig {
    pub encoder: String,
    pub odom: String,
    pub encoder_abs: String,
}

/// rosbridge WebSocket server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub enabled: bool,
    pub bind: SocketAddr,
}

/// Built-in simulated encoder for runs without hardware.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub enabled: bool,
    /// Simulated wheel speed; negative values run in reverse.
    pub ticks_per_second: f64,
    /// Sampling period in milliseconds.
    pub period_ms: u64,
}

fn default_bus_capacity() -> usize {
    100
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bus_capacity: default_bus_capacity(),
            odometry: OdometryConfig::default(),
            topics: TopicsConfig::default(),
            bridge: BridgeConfig::default(),
            sim: SimConfig::default(),
        }
    }
}

impl Default for TopicsConfig {
    fn default() -> Self {
        let topics = BridgeTopics::default();
        Self {
            encoder: topics.encoder,
            odom: topics.odom,
            encoder_abs: topics.encoder_abs,
        }
    }
}

impl From<TopicsConfig> for BridgeTopics {
    fn from(t: TopicsConfig) -> Self {
        Self {
            encoder: t.encoder,
            odom: t.odom,
            encoder_abs: t.encoder_abs,
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: SocketAddr::from(([127, 0, 0, 1], 9090)),
        }
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ticks_per_second: 310.0,
            period_ms: 20,
        }
    }
}

impl Config {
    /// Reject values the node cannot start with.
    ///
    /// # Errors
    ///
    /// Returns [`OdomError::InvalidConfig`] naming the first offending option.
    pub fn validate(&self) -> Result<(), OdomError> {
        self.odometry.validate()?;
        if self.bus_capacity == 0 {
            return Err(OdomError::InvalidConfig(
                "bus_capacity must be at least 1".to_string(),
            ));
        }
        for (name, topic) in [
            ("topics.encoder", &self.topics.encoder),
            ("topics.odom", &self.topics.odom),
            ("topics.encoder_abs", &self.topics.encoder_abs),
        ] {
            if topic.trim().is_empty() {
                return Err(OdomError::InvalidConfig(format!("{name} must not be empty")));
            }
        }
        if self.sim.enabled {
            if self.sim.period_ms == 0 {
                return Err(OdomError::InvalidConfig(
                    "sim.period_ms must be at least 1".to_string(),
                ));
            }
            if !self.sim.ticks_per_second.is_finite() {
                return Err(OdomError::InvalidConfig(format!(
                    "sim.ticks_per_second must be finite, got {}",
                    self.sim.ticks_per_second
                )));
            }
        }
        Ok(())
    }
}

/// Return the config path: `$MOTOR_ODOM_CONFIG` if set, otherwise
/// `~/.motor_odom/config.toml`.
pub fn config_path() -> PathBuf {
    if let Ok(p) = std::env::var(CONFIG_PATH_VAR) {
        return PathBuf::from(p);
    }
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".motor_odom").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

/// Load the config from a specific path without applying overrides.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Apply `ODOM_*` environment variable overrides to `cfg`.
///
/// Values that do not parse are ignored.
///
/// | Variable | Config field |
/// |---|---|
/// | `ODOM_TICKS_PER_METER` | `odometry.ticks_per_meter` |
/// | `ODOM_FRAME_ID` | `odometry.frame_id` |
/// | `ODOM_UNCERTAINTY_FIXED` | `odometry.uncertainty_fixed` |
/// | `ODOM_DEADLINE_TIMEOUT` | `odometry.deadline_timeout` |
/// | `ODOM_BRIDGE_BIND` | `bridge.bind` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("ODOM_TICKS_PER_METER")
        && let Ok(n) = v.parse::<f64>()
    {
        cfg.odometry.ticks_per_meter = n;
    }
    if let Ok(v) = std::env::var("ODOM_FRAME_ID") {
        cfg.odometry.frame_id = v;
    }
    if let Ok(v) = std::env::var("ODOM_UNCERTAINTY_FIXED")
        && let Ok(n) = v.parse::<f64>()
    {
        cfg.odometry.uncertainty_fixed = n;
    }
    if let Ok(v) = std::env::var("ODOM_DEADLINE_TIMEOUT")
        && let Ok(n) = v.parse::<f64>()
    {
        cfg.odometry.deadline_timeout = n;
    }
    if let Ok(v) = std::env::var("ODOM_BRIDGE_BIND")
        && let Ok(addr) = v.parse::<SocketAddr>()
    {
        cfg.bridge.bind = addr;
    }
}

/// Save the config to disk, creating the parent directory if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))
}
