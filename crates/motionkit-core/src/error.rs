//! Error handling for MotionKit
//!
//! Provides error types for every layer of the motion command path:
//! - Connection errors (opening and enumerating ports)
//! - Motion errors (range checks, acknowledgment timeouts, device rejections)
//!
//! All error types use `thiserror` for ergonomic error handling.

use crate::data::Axis;
use crate::validation::ValidationError;
use thiserror::Error;

/// Connection error type
///
/// Fatal only to the `connect()` call that produced it.
#[derive(Error, Debug, Clone)]
pub enum ConnectionError {
    /// Failed to open port
    #[error("Failed to open port {port}: {reason}")]
    FailedToOpen {
        /// The name of the port that failed to open.
        port: String,
        /// The reason the port failed to open.
        reason: String,
    },

    /// An operation needed an open port
    #[error("Serial port not connected")]
    NotConnected,

    /// Port enumeration failed
    #[error("Failed to enumerate ports: {reason}")]
    PortEnumeration {
        /// The reason enumeration failed.
        reason: String,
    },
}

/// Motion command error type
///
/// Represents failures of a single command exchange. None of these
/// invalidate the connection itself.
#[derive(Error, Debug, Clone)]
pub enum MotionError {
    /// Move would leave the configured travel range
    #[error("Range exceeded on {axis}: {value:.3} not in [{min}, {max}]")]
    RangeExceeded {
        /// The offending axis.
        axis: Axis,
        /// The prospective coordinate.
        value: f64,
        /// Lower bound of the axis.
        min: f64,
        /// Upper bound of the axis.
        max: f64,
    },

    /// Device did not acknowledge before the deadline
    #[error("Timed out after {timeout_ms}ms waiting for ok to '{command}'")]
    Timeout {
        /// The command that was not acknowledged.
        command: String,
        /// The deadline in milliseconds.
        timeout_ms: u64,
    },

    /// Device answered with an `error:` line
    #[error("Device rejected '{command}': {line}")]
    DeviceError {
        /// The command that was rejected.
        command: String,
        /// The error line as received.
        line: String,
    },

    /// Command returned an acknowledgment with ok=false
    #[error("{command} rejected: {message}")]
    CommandRejected {
        /// Name of the rejected command.
        command: String,
        /// The acknowledgment message.
        message: String,
    },

    /// Feedrate was zero, negative or not finite
    #[error("Feedrate must be positive, got {value}")]
    InvalidFeedrate {
        /// The rejected value.
        value: f64,
    },

    /// Any other transport I/O failure
    #[error("Transport failure: {reason}")]
    Transport {
        /// The reason for the failure.
        reason: String,
    },
}

/// Main error type for MotionKit
///
/// A unified error type used in public APIs.
#[derive(Error, Debug)]
pub enum Error {
    /// Connection error
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Motion error
    #[error(transparent)]
    Motion(#[from] MotionError),

    /// Input validation error
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is an acknowledgment timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Motion(MotionError::Timeout { .. }))
    }

    /// Check if this is a connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::Connection(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConnectionError::FailedToOpen {
            port: "COM9".to_string(),
            reason: "access denied".to_string(),
        };
        assert_eq!(err.to_string(), "Failed to open port COM9: access denied");

        let err = MotionError::Timeout {
            command: "G1 X1".to_string(),
            timeout_ms: 5000,
        };
        assert_eq!(
            err.to_string(),
            "Timed out after 5000ms waiting for ok to 'G1 X1'"
        );
    }

    #[test]
    fn test_error_classification() {
        let err: Error = MotionError::Timeout {
            command: "M2".to_string(),
            timeout_ms: 10,
        }
        .into();
        assert!(err.is_timeout());
        assert!(!err.is_connection_error());

        let err: Error = ConnectionError::NotConnected.into();
        assert!(err.is_connection_error());

        let err: Error = MotionError::RangeExceeded {
            axis: Axis::X,
            value: 6.0,
            min: -5.0,
            max: 5.0,
        }
        .into();
        assert!(err.to_string().starts_with("Range exceeded on X"));

        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
