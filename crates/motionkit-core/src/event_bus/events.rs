//! Event types carried on the motion bus.
//!
//! Topic names, the `MotionEvent` payload and the low-level
//! instrumentation records emitted around every protocol exchange.

use super::bus::EventBus;
use crate::data::{CommandAck, Position};
use crate::error::Error;
use std::sync::Arc;
use std::time::Instant;

/// Topic keys used by the motion command path
pub mod topics {
    /// Reconstructed position snapshots
    pub const POSITION: &str = "gcode.position";
    /// Dispatcher status: `"Idle"`, a busy verb, or `"refresh-position"`
    pub const COMMAND_STATUS: &str = "gcode.command.status";
    /// Acknowledgment of every completed command
    pub const COMMAND_RESULT: &str = "gcode.command.result";
    /// Raw response lines from the device
    pub const COMMAND_LOG: &str = "gcode.log";
    /// Error reports
    pub const ERRORS: &str = "errors";
    /// Protocol timing records
    pub const INSTRUMENTATION: &str = "gcode.instrumentation";
}

/// Status text published when the dispatcher has nothing in flight
pub const STATUS_IDLE: &str = "Idle";

/// Status text asking position observers to refresh immediately
pub const STATUS_REFRESH_POSITION: &str = "refresh-position";

/// An error broadcast to observers
#[derive(Debug, Clone)]
pub struct ErrorRaised {
    /// Human readable summary, e.g. `"Move failed"`
    pub message: String,
    /// The underlying error, if there is one
    pub error: Option<Arc<Error>>,
}

impl ErrorRaised {
    /// Error event carrying its cause
    pub fn new(message: impl Into<String>, error: Error) -> Self {
        Self {
            message: message.into(),
            error: Some(Arc::new(error)),
        }
    }

    /// Error event with a message only
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error: None,
        }
    }
}

impl std::fmt::Display for ErrorRaised {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.error {
            Some(error) => write!(f, "{}: {}", self.message, error),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Kinds of protocol instrumentation records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstrumentationKind {
    /// About to write a line
    WriteStart,
    /// Line written and flushed
    WriteEnd,
    /// First non-empty response line seen
    FirstByteIn,
    /// Terminating `ok` / `error:` line parsed
    OkParsed,
    /// Deadline elapsed without an ack
    Timeout,
    /// Position poller read the derived position
    PositionRead,
}

impl InstrumentationKind {
    /// Stable snake_case name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WriteStart => "write_start",
            Self::WriteEnd => "write_end",
            Self::FirstByteIn => "first_byte_in",
            Self::OkParsed => "ok_parsed",
            Self::Timeout => "timeout",
            Self::PositionRead => "position_read",
        }
    }
}

impl std::fmt::Display for InstrumentationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One protocol timing record
#[derive(Debug, Clone)]
pub struct InstrumentationEvent {
    /// What happened
    pub kind: InstrumentationKind,
    /// Monotonic timestamp
    pub timestamp: Instant,
    /// Name of the emitting thread
    pub thread: String,
    /// Port the sender is attached to
    pub port: Option<String>,
    /// Command line involved, without terminator
    pub command: Option<String>,
    /// Encoded length of the written line
    pub byte_len: Option<usize>,
    /// Response line involved
    pub line: Option<String>,
    /// Number of response lines collected so far
    pub lines: Option<usize>,
}

impl InstrumentationEvent {
    /// New record stamped with the current time and thread
    pub fn now(kind: InstrumentationKind) -> Self {
        let current = std::thread::current();
        Self {
            kind,
            timestamp: Instant::now(),
            thread: current.name().unwrap_or("unnamed").to_string(),
            port: None,
            command: None,
            byte_len: None,
            line: None,
            lines: None,
        }
    }

    /// Set the port
    pub fn with_port(mut self, port: Option<String>) -> Self {
        self.port = port;
        self
    }

    /// Set the command and its encoded length
    pub fn with_command(mut self, command: impl Into<String>, byte_len: usize) -> Self {
        self.command = Some(command.into());
        self.byte_len = Some(byte_len);
        self
    }

    /// Set the response line
    pub fn with_line(mut self, line: impl Into<String>) -> Self {
        self.line = Some(line.into());
        self
    }

    /// Set the number of collected lines
    pub fn with_lines(mut self, lines: usize) -> Self {
        self.lines = Some(lines);
        self
    }
}

/// Events published by the motion command path
#[derive(Debug, Clone)]
pub enum MotionEvent {
    /// Derived position refreshed
    PositionUpdated(Position),
    /// Dispatcher status changed
    CommandStatus(String),
    /// A command completed with an acknowledgment
    CommandResult(CommandAck),
    /// A raw response line
    Log(String),
    /// A failure was reported
    Error(ErrorRaised),
    /// A protocol timing record
    Instrumentation(InstrumentationEvent),
}

impl std::fmt::Display for MotionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MotionEvent::PositionUpdated(position) => write!(f, "Position: {}", position),
            MotionEvent::CommandStatus(status) => write!(f, "Status: {}", status),
            MotionEvent::CommandResult(ack) => {
                write!(f, "Result: {} ({})", ack.message, if ack.ok { "ok" } else { "failed" })
            }
            MotionEvent::Log(line) => write!(f, "{}", line),
            MotionEvent::Error(error) => write!(f, "Error: {}", error),
            MotionEvent::Instrumentation(event) => {
                write!(f, "{} on {}", event.kind, event.thread)
            }
        }
    }
}

/// The bus type used throughout MotionKit
pub type MotionBus = EventBus<MotionEvent>;
