//! Configuration management for MotionKit
//!
//! Provides configuration file handling and validation. Supports JSON and
//! TOML file formats; the default location is the platform configuration
//! directory.
//!
//! Configuration is organized into logical sections:
//! - Connection settings (port, baud rate, protocol timeouts)
//! - Motion settings (default feedrate, travel limits)
//! - Polling settings (position refresh timing)
//! - Dispatcher settings (shutdown timeout)
//! - Logging settings

use crate::error::{SettingsError, SettingsResult};
use motionkit_core::{AxisLimits, Feedrate, MotionError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding `connection.port`
pub const ENV_PORT: &str = "MOTIONKIT_PORT";
/// Environment variable overriding `connection.baud_rate`
pub const ENV_BAUD_RATE: &str = "MOTIONKIT_BAUD_RATE";
/// Environment variable overriding `logging.level`
pub const ENV_LOG_LEVEL: &str = "MOTIONKIT_LOG_LEVEL";

/// Serial connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Last used port, or "Auto"
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Deadline for one line's acknowledgment in milliseconds
    pub ack_timeout_ms: u64,
    /// Upper bound of a single serial read in milliseconds
    pub read_timeout_ms: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            port: "Auto".to_string(),
            baud_rate: 115200,
            ack_timeout_ms: 5000,
            read_timeout_ms: 50,
        }
    }
}

impl ConnectionSettings {
    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// Motion settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionSettings {
    /// Feedrate used when a command does not name one
    pub default_feedrate: f64,
    /// Allowed travel of the reconstructed position
    pub limits: AxisLimits,
}

impl Default for MotionSettings {
    fn default() -> Self {
        Self {
            default_feedrate: 200.0,
            limits: AxisLimits::default(),
        }
    }
}

impl MotionSettings {
    pub fn default_feedrate(&self) -> Result<Feedrate, MotionError> {
        Feedrate::new(self.default_feedrate)
    }
}

/// Position poller settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingSettings {
    /// Time between two position refreshes in milliseconds
    pub interval_ms: u64,
    /// Pause while disconnected in milliseconds
    pub disconnected_backoff_ms: u64,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            disconnected_backoff_ms: 100,
        }
    }
}

impl PollingSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn disconnected_backoff(&self) -> Duration {
        Duration::from_millis(self.disconnected_backoff_ms)
    }
}

/// Command dispatcher settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherSettings {
    /// How long shutdown waits for an in-flight command in milliseconds
    pub shutdown_timeout_ms: u64,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            shutdown_timeout_ms: 3000,
        }
    }
}

impl DispatcherSettings {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default `tracing` filter when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Complete application configuration
///
/// Aggregates all settings sections and provides file I/O operations.
/// Missing sections and fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Connection settings
    pub connection: ConnectionSettings,
    /// Motion settings
    pub motion: MotionSettings,
    /// Polling settings
    pub polling: PollingSettings,
    /// Dispatcher settings
    pub dispatcher: DispatcherSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

enum Format {
    Json,
    Toml,
}

fn format_of(path: &Path) -> SettingsResult<Format> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Ok(Format::Json),
        Some("toml") => Ok(Format::Toml),
        other => Err(SettingsError::UnsupportedFormat(
            other.unwrap_or("<none>").to_string(),
        )),
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let format = format_of(path)?;
        let content = std::fs::read_to_string(path)?;

        let config: Self = match format {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load config from `path` if it exists, defaults otherwise
    pub fn load_or_default(path: &Path) -> SettingsResult<Self> {
        if !path.exists() {
            tracing::debug!("No configuration at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load_from_file(path)
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match format_of(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        tracing::debug!("Saved configuration to {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> SettingsResult<()> {
        if self.connection.baud_rate == 0 {
            return Err(SettingsError::invalid("connection.baud_rate", "must be > 0"));
        }
        if self.connection.ack_timeout_ms == 0 {
            return Err(SettingsError::invalid(
                "connection.ack_timeout_ms",
                "must be > 0",
            ));
        }
        if self.connection.read_timeout_ms == 0 {
            return Err(SettingsError::invalid(
                "connection.read_timeout_ms",
                "must be > 0",
            ));
        }

        if self.motion.default_feedrate().is_err() {
            return Err(SettingsError::invalid(
                "motion.default_feedrate",
                format!("must be > 0, got {}", self.motion.default_feedrate),
            ));
        }
        let limits = &self.motion.limits;
        for (key, range) in [
            ("motion.limits.x", limits.x),
            ("motion.limits.y", limits.y),
            ("motion.limits.z", limits.z),
        ] {
            if !range.is_valid() {
                return Err(SettingsError::invalid(
                    key,
                    format!("min {} must be below max {}", range.min, range.max),
                ));
            }
            // Homing returns to 0 on every axis
            if !range.contains(0.0) {
                return Err(SettingsError::invalid(key, "range must contain 0"));
            }
        }

        if self.polling.interval_ms == 0 {
            return Err(SettingsError::invalid("polling.interval_ms", "must be > 0"));
        }
        if self.dispatcher.shutdown_timeout_ms == 0 {
            return Err(SettingsError::invalid(
                "dispatcher.shutdown_timeout_ms",
                "must be > 0",
            ));
        }
        if self.logging.level.trim().is_empty() {
            return Err(SettingsError::invalid("logging.level", "must not be empty"));
        }

        Ok(())
    }

    /// Apply `MOTIONKIT_*` environment variables
    pub fn apply_env_overrides(&mut self) -> SettingsResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, keyed by environment variable name
    pub fn apply_overrides<F>(&mut self, lookup: F) -> SettingsResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup(ENV_PORT).filter(|p| !p.trim().is_empty()) {
            self.connection.port = port.trim().to_string();
        }
        if let Some(baud) = lookup(ENV_BAUD_RATE) {
            self.connection.baud_rate = baud.trim().parse().map_err(|_| {
                SettingsError::invalid(ENV_BAUD_RATE, format!("'{}' is not a baud rate", baud))
            })?;
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL).filter(|l| !l.trim().is_empty()) {
            self.logging.level = level.trim().to_string();
        }
        Ok(())
    }
}

/// `<config dir>/motionkit/config.toml`
pub fn default_config_path() -> SettingsResult<PathBuf> {
    let dir = dirs::config_dir().ok_or_else(|| {
        SettingsError::ConfigDirectory("no configuration directory on this platform".to_string())
    })?;
    Ok(dir.join("motionkit").join("config.toml"))
}
