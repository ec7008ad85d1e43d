//! Position polling control

use crate::poller::PositionPoller;
use std::sync::Arc;

/// Start, stop and nudge the position poller
pub struct PollCurrentPositionUseCase {
    poller: Arc<PositionPoller>,
}

impl PollCurrentPositionUseCase {
    /// Wrap an existing poller
    pub fn new(poller: Arc<PositionPoller>) -> Self {
        Self { poller }
    }

    /// Spawn the polling thread; fails only if the thread cannot start
    pub fn start(&self) -> std::io::Result<()> {
        self.poller.start()
    }

    /// Stop polling and wait briefly for the thread to exit
    pub fn stop(&self) {
        self.poller.stop();
    }

    /// Ask for a position refresh right away
    pub fn trigger(&self) {
        self.poller.trigger();
    }
}
