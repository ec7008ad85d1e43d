//! Position trace
//!
//! The device never reports where it is, so the position is reconstructed
//! from the moves it accepted.

use motionkit_core::Position;
use std::time::Instant;

/// One accepted relative move
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceEntry {
    /// X displacement
    pub dx: f64,
    /// Y displacement
    pub dy: f64,
    /// Z displacement
    pub dz: f64,
    /// When the move was accepted
    pub timestamp: Instant,
}

impl TraceEntry {
    /// Displacement as a position
    pub fn delta(&self) -> Position {
        Position::new(self.dx, self.dy, self.dz)
    }
}

/// Ordered log of accepted moves
#[derive(Debug, Clone, Default)]
pub struct PositionTrace {
    entries: Vec<TraceEntry>,
}

impl PositionTrace {
    /// Empty trace
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an accepted move now
    pub fn record(&mut self, delta: Position) {
        self.entries.push(TraceEntry {
            dx: delta.x,
            dy: delta.y,
            dz: delta.z,
            timestamp: Instant::now(),
        });
    }

    /// Component-wise sum of all moves, in timestamp order
    pub fn sum(&self) -> Position {
        let mut ordered: Vec<&TraceEntry> = self.entries.iter().collect();
        ordered.sort_by_key(|entry| entry.timestamp);
        ordered
            .into_iter()
            .fold(Position::zero(), |acc, entry| acc + entry.delta())
    }

    /// Forget every move
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// True if no move was recorded since the last clear
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of recorded moves
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
