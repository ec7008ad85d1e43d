//! MotionKit Settings Crate
//!
//! Configuration for the motion command path: serial connection, travel
//! limits, poller timing, dispatcher shutdown and logging.

pub mod config;
pub mod error;

pub use config::{
    default_config_path, Config, ConnectionSettings, DispatcherSettings, LoggingSettings,
    MotionSettings, PollingSettings,
};
pub use error::{SettingsError, SettingsResult};
