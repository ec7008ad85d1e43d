//! G-code sender capability
//!
//! `GcodeSender` is the seam between command orchestration and the device.
//! `SerialGcodeSender` implements it over a `Transport`; tests substitute
//! in-memory fakes.

pub mod protocol;
mod serial_sender;
pub mod trace;

use crate::communication::SerialPortInfo;
use motionkit_core::{AxisLimits, CommandAck, Feedrate, Position, Result};
use std::time::Duration;

pub use serial_sender::{SerialGcodeSender, ALREADY_CENTERED, RANGE_EXCEEDED};

/// Devices capable of executing G-code commands
///
/// Implementations are shared between the dispatcher worker and the poller,
/// so every operation takes `&self`.
pub trait GcodeSender: Send + Sync {
    /// Open the transport, closing any prior connection first
    fn connect(&self, port: &str, baud_rate: u32) -> Result<()>;

    /// Close the transport; idempotent
    fn disconnect(&self);

    /// Enumerate ports without side effects
    fn list_serial_ports(&self) -> Result<Vec<SerialPortInfo>>;

    /// Write one line, optionally blocking until the device acknowledges it
    fn send_raw(&self, command: &str, wait_for_ok: bool) -> Result<CommandAck>;

    /// Relative move; out-of-range moves are replaced by `home()`
    fn send_coordinates(&self, position: Position, feedrate: Feedrate) -> Result<CommandAck>;

    /// Undo every accumulated move and clear the trace
    fn home(&self, feedrate: Feedrate) -> Result<CommandAck>;

    /// Last known derived position, or `None` when disconnected
    fn current_position(&self) -> Option<Position>;

    /// Whether a transport is open
    fn is_connected(&self) -> bool;
}

/// Runtime settings of the serial sender
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Deadline for the acknowledgment of one line
    pub ack_timeout: Duration,
    /// Upper bound of a single transport read
    pub read_timeout: Duration,
    /// Allowed travel of the reconstructed position
    pub limits: AxisLimits,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            ack_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_millis(50),
            limits: AxisLimits::default(),
        }
    }
}
