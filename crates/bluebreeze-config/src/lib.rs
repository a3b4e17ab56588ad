//! Configuration for the BlueBreeze bridge and its simulator.
//!
//! One TOML file plus `BLUEBREEZE_*` environment overrides, layered over
//! built-in defaults. The `[store]` and `[bridge]` sections deserialize
//! straight into the core's config types; `[log]` and `[simulator]` are
//! read by the binary.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use bluebreeze_core::{BridgeConfig, StoreConfig};

/// Environment prefix; `__` separates nested keys
/// (`BLUEBREEZE_BRIDGE__MIN_SCAN_RSSI=-80`).
pub const ENV_PREFIX: &str = "BLUEBREEZE_";

/// Smallest ATT MTU the Bluetooth core specification allows.
const MIN_ATT_MTU: u16 = 23;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub bridge: BridgeConfig,

    #[serde(default)]
    pub log: LogSettings,

    #[serde(default)]
    pub simulator: SimulatorSettings,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LogSettings {
    /// `EnvFilter` directive used when neither `-v` nor `RUST_LOG` is given.
    #[serde(default = "default_filter")]
    pub filter: String,

    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            format: LogFormat::default(),
        }
    }
}

fn default_filter() -> String {
    "warn".into()
}

/// Scripted producer run by `bluebreeze simulate`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SimulatorSettings {
    /// Number of simulated peripherals.
    #[serde(default = "default_devices")]
    pub devices: usize,

    /// Number of data ticks after discovery.
    #[serde(default = "default_ticks")]
    pub ticks: u32,

    /// Delay between ticks.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        Self {
            devices: default_devices(),
            ticks: default_ticks(),
            interval_ms: default_interval_ms(),
        }
    }
}

fn default_devices() -> usize {
    3
}
fn default_ticks() -> u32 {
    10
}
fn default_interval_ms() -> u64 {
    200
}

impl Config {
    /// Reject values the core or simulator cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.default_mtu < MIN_ATT_MTU {
            return Err(ConfigError::Validation {
                field: "store.default_mtu".into(),
                reason: format!("must be at least {MIN_ATT_MTU}, got {}", self.store.default_mtu),
            });
        }
        if self.simulator.devices == 0 {
            return Err(ConfigError::Validation {
                field: "simulator.devices".into(),
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "bluebreeze", "bluebreeze").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("bluebreeze");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Layer defaults, the TOML file and the environment.
///
/// With `path` set the file must exist; the default location is optional.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = match path {
        Some(explicit) if !explicit.exists() => {
            return Err(ConfigError::NotFound {
                path: explicit.to_path_buf(),
            });
        }
        Some(explicit) => explicit.to_path_buf(),
        None => config_path(),
    };

    let config: Config = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()?;

    config.validate()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Render a config as pretty TOML.
pub fn render_config(cfg: &Config) -> Result<String, ConfigError> {
    Ok(toml::to_string_pretty(cfg)?)
}

/// Write `cfg` to `path`, creating parent directories.
pub fn save_config(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, render_config(cfg)?)?;
    Ok(())
}
