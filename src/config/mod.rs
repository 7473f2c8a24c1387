//! # Configuration Management Module
//!
//! TOML configuration for the headset link, the decoder, sample output and
//! logging.
//!
//! ## Configuration Structure
//!
//! - [`DeviceConfig`] - serial port and dongle handling
//! - [`DecoderConfig`] - checksum policy and poor-signal handling
//! - [`OutputConfig`] - where band samples are persisted
//! - [`LoggingConfig`] - log level and optional log file
//!
//! ## Usage
//!
//! ```rust,no_run
//! use thinkgear::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     println!("Serial Port: {}", config.device.port);
//!
//!     Config::create_default("config.toml").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [device]
//! port = "/dev/rfcomm0"
//! baud_rate = 57600
//! read_timeout_ms = 500
//!
//! [decoder]
//! checksum = "strict"
//! record_good_signal = false
//!
//! [output]
//! dir = "."
//! persist_bands = true
//!
//! [logging]
//! level = "info"
//! ```
//!
//! Every section is optional; missing sections and keys take the defaults
//! shown above. CLI arguments override the file.

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::protocol::ChecksumPolicy;

/// Baud rate of the NeuroSky USB dongle and Bluetooth serial profile.
pub const DEFAULT_BAUD: u32 = 57600;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub decoder: DecoderConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "default_port")]
    pub port: String,
    #[serde(default = "default_baud")]
    pub baud_rate: u32,
    /// Per-read timeout. A read that times out returns no data and the
    /// decoder simply reads again.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// When the port does not exist, try the same name with the trailing
    /// digit incremented (`/dev/rfcomm0` -> `/dev/rfcomm1` ... `9`).
    #[serde(default = "default_true")]
    pub probe_ports: bool,
    /// Send the DISCONNECT command byte after opening so the dongle restarts
    /// its packet stream.
    #[serde(default = "default_true")]
    pub send_disconnect: bool,
    /// Toggle hardware flow control twice after opening to re-apply the port
    /// settings; some dongles only start streaming after this.
    #[serde(default = "default_true")]
    pub reapply_flow_control: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecoderConfig {
    #[serde(default)]
    pub checksum: ChecksumPolicy,
    /// Store a poor-signal value of 0 ("good contact"). When false, a 0 leaves
    /// the previous value in place.
    #[serde(default)]
    pub record_good_signal: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving `<unix-seconds>.freq` session files.
    #[serde(default = "default_output_dir")]
    pub dir: String,
    #[serde(default = "default_true")]
    pub persist_bands: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

fn default_port() -> String {
    if cfg!(windows) {
        "COM3".to_string()
    } else {
        "/dev/rfcomm0".to_string()
    }
}

fn default_baud() -> u32 {
    DEFAULT_BAUD
}

fn default_read_timeout_ms() -> u64 {
    500
}

fn default_true() -> bool {
    true
}

fn default_output_dir() -> String {
    ".".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            baud_rate: DEFAULT_BAUD,
            read_timeout_ms: default_read_timeout_ms(),
            probe_ports: true,
            send_disconnect: true,
            reapply_flow_control: true,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            persist_bands: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Parsed `level`, falling back to `Info` for unknown names.
    pub fn level_filter(&self) -> log::LevelFilter {
        self.level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config = Self::from_toml(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        Ok(config)
    }

    /// Parse and validate TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.device.port.trim().is_empty() {
            bail!("device.port must not be empty");
        }
        if self.device.baud_rate == 0 {
            bail!("device.baud_rate must be positive");
        }
        if self.device.read_timeout_ms == 0 {
            bail!("device.read_timeout_ms must be positive");
        }
        if self.output.persist_bands && self.output.dir.trim().is_empty() {
            bail!("output.dir must be set when output.persist_bands is enabled");
        }
        Ok(())
    }
}
