//! Configuration
//!
//! One TOML file drives the monitor. Every section and field has a
//! default, so an empty file (or none at all) yields a working passive
//! capture on the well-known OT ports with JSON lines on stdout.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::safety::EMIT_BUFFER_CAPACITY;
use crate::sink::SinkTarget;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub capture: CaptureConfig,

    #[serde(default)]
    pub sink: SinkConfig,

    #[serde(default)]
    pub safety: SafetyConfig,

    /// Zone definitions (YAML or JSON), optional.
    #[serde(default)]
    pub zones_file: Option<PathBuf>,

    /// Learned baseline document (YAML or JSON), optional.
    #[serde(default)]
    pub baseline_file: Option<PathBuf>,

    /// Operator role overrides, asset id to role.
    #[serde(default)]
    pub role_overrides: HashMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capture: CaptureConfig::default(),
            sink: SinkConfig::default(),
            safety: SafetyConfig::default(),
            zones_file: None,
            baseline_file: None,
            role_overrides: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Interface to capture on; the default device when unset.
    #[serde(default)]
    pub interface: Option<String>,

    /// Transport ports worth dissecting; becomes the capture filter.
    #[serde(default = "default_ports")]
    pub ports: Vec<u16>,

    /// Capture in promiscuous mode.
    #[serde(default = "default_true")]
    pub promiscuous: bool,

    /// Snapshot length in bytes.
    #[serde(default = "default_snaplen")]
    pub snaplen: i32,

    /// Read timeout in milliseconds; bounds shutdown latency.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: i32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            interface: None,
            ports: default_ports(),
            promiscuous: true,
            snaplen: default_snaplen(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Emit dissected frames, not only alerts.
    #[serde(default = "default_true")]
    pub emit_frames: bool,

    #[serde(default)]
    pub target: SinkTarget,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            emit_frames: true,
            target: SinkTarget::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyConfig {
    /// Days after first start during which alerts are downgraded to
    /// `warn`. Zero disables the ramp.
    #[serde(default)]
    pub ramp_days: u32,

    /// Capacity of the emission retry buffer.
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            ramp_days: 0,
            buffer_capacity: default_buffer_capacity(),
        }
    }
}

fn default_ports() -> Vec<u16> {
    vec![502, 20000, 2404, 102]
}

fn default_true() -> bool {
    true
}

fn default_snaplen() -> i32 {
    65535
}

fn default_timeout_ms() -> i32 {
    200
}

fn default_buffer_capacity() -> usize {
    EMIT_BUFFER_CAPACITY
}

impl Config {
    /// Loads configuration from a specific TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Probes the standard locations and falls back to defaults when no
    /// file exists.
    pub fn load_or_default() -> Result<Self> {
        let candidates = [
            PathBuf::from("otwatch.toml"),
            PathBuf::from("/etc/otwatch/otwatch.toml"),
        ];
        for path in &candidates {
            if path.exists() {
                info!("Loading configuration from {}", path.display());
                return Self::load(path);
            }
        }
        warn!("No configuration file found; using defaults");
        Ok(Self::default())
    }

    /// Renders the default configuration as pretty TOML.
    pub fn generate_default() -> Result<String> {
        toml::to_string_pretty(&Config::default()).context("Failed to render default config")
    }
}
