//! Data models for MotionKit
//!
//! Provides the value types exchanged between the command layer and the
//! device driver:
//! - Position (relative displacement or reconstructed location)
//! - Feedrate (validated, strictly positive)
//! - CommandAck (outcome of one protocol exchange)
//! - Axis limits used by the range check

use crate::error::MotionError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Neg};

/// Machine axis identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// X axis
    X,
    /// Y axis
    Y,
    /// Z axis
    Z,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X => write!(f, "X"),
            Self::Y => write!(f, "Y"),
            Self::Z => write!(f, "Z"),
        }
    }
}

/// Three-axis position in millimetres
///
/// Depending on context this is either a relative displacement (a move
/// request) or the locally reconstructed location of the tool.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
    /// Z coordinate
    pub z: f64,
}

impl Position {
    /// Create a new position
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// The origin (0, 0, 0)
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Component for the given axis
    pub fn axis(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    /// Compare component-wise within `epsilon`
    pub fn approx_eq(&self, other: &Position, epsilon: f64) -> bool {
        (self.x - other.x).abs() <= epsilon
            && (self.y - other.y).abs() <= epsilon
            && (self.z - other.z).abs() <= epsilon
    }

    /// True when every component is exactly zero
    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }
}

impl Add for Position {
    type Output = Position;

    fn add(self, rhs: Position) -> Position {
        Position::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Neg for Position {
    type Output = Position;

    fn neg(self) -> Position {
        Position::new(-self.x, -self.y, -self.z)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "X:{:.3} Y:{:.3} Z:{:.3}", self.x, self.y, self.z)
    }
}

/// Feed rate in mm/min
///
/// Always strictly positive; construction fails otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Feedrate(f64);

impl Feedrate {
    /// Create a feedrate, rejecting zero, negative and non-finite values
    pub fn new(value: f64) -> Result<Self, MotionError> {
        if value.is_finite() && value > 0.0 {
            Ok(Self(value))
        } else {
            Err(MotionError::InvalidFeedrate { value })
        }
    }

    /// Raw value in mm/min
    pub fn value(&self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Feedrate {
    type Error = MotionError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Feedrate::new(value)
    }
}

impl<'de> Deserialize<'de> for Feedrate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;
        Feedrate::new(value).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for Feedrate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of one protocol exchange with the device
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommandAck {
    /// Whether the device (or the sender) accepted the command
    pub ok: bool,
    /// Short human readable outcome
    pub message: String,
    /// Non-empty lines received, in order, ending with the terminating `ok` / `error:` line
    pub responses: Vec<String>,
}

impl CommandAck {
    /// Successful acknowledgment
    pub fn accepted(message: impl Into<String>, responses: Vec<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
            responses,
        }
    }

    /// Rejected command (range exceeded, device error line, ...)
    pub fn rejected(message: impl Into<String>, responses: Vec<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
            responses,
        }
    }
}

/// Inclusive allowed range for one axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisRange {
    /// Lower bound (inclusive)
    pub min: f64,
    /// Upper bound (inclusive)
    pub max: f64,
}

impl AxisRange {
    /// Tolerance applied to both bounds to absorb float accumulation
    const EPSILON: f64 = 1e-9;

    /// Create a range
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Symmetric range `[-limit, limit]`
    pub const fn symmetric(limit: f64) -> Self {
        Self::new(-limit, limit)
    }

    /// Check whether `value` lies inside the range
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min - Self::EPSILON && value <= self.max + Self::EPSILON
    }

    /// True if min < max and both bounds are finite
    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min < self.max
    }
}

/// Travel limits for the three axes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisLimits {
    /// X axis range
    pub x: AxisRange,
    /// Y axis range
    pub y: AxisRange,
    /// Z axis range
    pub z: AxisRange,
}

impl Default for AxisLimits {
    fn default() -> Self {
        Self {
            x: AxisRange::symmetric(5.0),
            y: AxisRange::symmetric(5.0),
            z: AxisRange::symmetric(4.0),
        }
    }
}

impl AxisLimits {
    /// Range for the given axis
    pub fn range(&self, axis: Axis) -> AxisRange {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    /// Check a prospective position against the limits
    ///
    /// Returns the first offending axis as a `RangeExceeded` error.
    pub fn check(&self, position: &Position) -> Result<(), MotionError> {
        for axis in [Axis::X, Axis::Y, Axis::Z] {
            let range = self.range(axis);
            let value = position.axis(axis);
            if !range.contains(value) {
                return Err(MotionError::RangeExceeded {
                    axis,
                    value,
                    min: range.min,
                    max: range.max,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feedrate_must_be_positive() {
        assert!(Feedrate::new(200.0).is_ok());
        assert!(matches!(
            Feedrate::new(0.0),
            Err(MotionError::InvalidFeedrate { .. })
        ));
        assert!(Feedrate::new(-1.0).is_err());
        assert!(Feedrate::new(f64::NAN).is_err());
        assert!(Feedrate::new(f64::INFINITY).is_err());
    }

    #[test]
    fn test_feedrate_deserialize_rejects_zero() {
        let ok: Feedrate = serde_json::from_str("150.5").unwrap();
        assert_eq!(ok.value(), 150.5);
        assert!(serde_json::from_str::<Feedrate>("0").is_err());
    }

    #[test]
    fn test_position_arithmetic() {
        let a = Position::new(1.0, 2.0, 3.0);
        let b = Position::new(-1.0, 0.5, 0.0);
        assert_eq!(a + b, Position::new(0.0, 2.5, 3.0));
        assert_eq!(-a, Position::new(-1.0, -2.0, -3.0));
        assert!((a + -a).is_zero());
    }

    #[test]
    fn test_default_limits() {
        let limits = AxisLimits::default();
        assert!(limits.check(&Position::new(5.0, -5.0, 4.0)).is_ok());
        assert!(limits.check(&Position::new(0.0, 0.0, -4.0)).is_ok());

        match limits.check(&Position::new(0.0, 5.5, 0.0)) {
            Err(MotionError::RangeExceeded { axis, value, .. }) => {
                assert_eq!(axis, Axis::Y);
                assert_eq!(value, 5.5);
            }
            other => panic!("expected range error, got {:?}", other),
        }

        assert!(limits.check(&Position::new(0.0, 0.0, 4.01)).is_err());
    }

    #[test]
    fn test_range_absorbs_float_noise() {
        let range = AxisRange::symmetric(5.0);
        let accumulated: f64 = std::iter::repeat(0.1).take(50).sum();
        assert!(accumulated > 5.0 - 1e-9);
        assert!(range.contains(accumulated));
        assert!(!AxisRange::new(1.0, 1.0).is_valid());
    }
}
