//! # MotionKit
//!
//! Serial G-code motion control for small relative-move devices:
//! - Line-oriented G-code protocol with bounded acknowledgment waits
//! - Travel limits enforced against a locally reconstructed position
//! - Single-worker command dispatch with bus-published progress
//! - Background position refresh that never collides with a command
//!
//! ## Architecture
//!
//! MotionKit is organized as a workspace with multiple crates:
//!
//! 1. **motionkit-core** - Value types, errors, event bus, scheduling
//! 2. **motionkit-communication** - Transports, sender, dispatcher, poller, use cases
//! 3. **motionkit-settings** - Configuration files and validation
//! 4. **motionkit** - Process wiring, console and the `motionkit` binary

pub mod console;
pub mod session;

pub use motionkit_core::{
    topics, AxisLimits, AxisRange, CommandAck, ConnectionError, Error, ErrorRaised, EventBus,
    Feedrate, MotionBus, MotionError, MotionEvent, Position, Result,
};

pub use motionkit_communication::{
    list_ports, CommandDispatcher, CommandRequest, GcodeSender, PositionPoller, SerialGcodeSender,
    SerialPortInfo,
};

pub use motionkit_settings::{default_config_path, Config, SettingsError};

pub use session::MotionSession;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging
///
/// Sets up structured logging with:
/// - Console output with pretty formatting on stderr
/// - RUST_LOG environment variable support, falling back to `level`
///   and then to INFO
pub fn init_logging(level: Option<&str>) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level.unwrap_or("info"))?,
    };

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_line_number(true)
        .pretty();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
