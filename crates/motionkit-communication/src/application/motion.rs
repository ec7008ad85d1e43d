//! Motion commands queued through the dispatcher

use crate::dispatcher::{CommandDispatcher, CommandRequest};
use crate::sender::GcodeSender;
use motionkit_core::{Feedrate, Position, Result};
use std::sync::Arc;

/// Queue a relative move
pub struct SendCoordinatesUseCase {
    dispatcher: Arc<CommandDispatcher>,
    sender: Arc<dyn GcodeSender>,
}

impl SendCoordinatesUseCase {
    /// Moves are queued on `dispatcher` and executed by `sender`
    pub fn new(dispatcher: Arc<CommandDispatcher>, sender: Arc<dyn GcodeSender>) -> Self {
        Self { dispatcher, sender }
    }

    /// Queue a move by `position` relative to the current position
    ///
    /// Returns once the request is queued; the outcome is published on the
    /// dispatcher's bus.
    pub fn execute(&self, position: Position, feedrate: Feedrate) -> Result<()> {
        let sender = self.sender.clone();
        self.dispatcher.dispatch(
            CommandRequest::new("Move", "Moving…", move || {
                sender.send_coordinates(position, feedrate)
            })
            .with_refresh_position(true),
        )
    }
}

/// Queue a return to the origin
pub struct HomeMachineUseCase {
    dispatcher: Arc<CommandDispatcher>,
    sender: Arc<dyn GcodeSender>,
}

impl HomeMachineUseCase {
    /// Homes are queued on `dispatcher` and executed by `sender`
    pub fn new(dispatcher: Arc<CommandDispatcher>, sender: Arc<dyn GcodeSender>) -> Self {
        Self { dispatcher, sender }
    }

    /// Queue a move back to the origin at `feedrate`
    pub fn execute(&self, feedrate: Feedrate) -> Result<()> {
        let sender = self.sender.clone();
        self.dispatcher.dispatch(
            CommandRequest::new("Home", "Homing…", move || sender.home(feedrate))
                .with_refresh_position(true),
        )
    }
}

/// Queue a single raw G-code line
pub struct SendRawCommandUseCase {
    dispatcher: Arc<CommandDispatcher>,
    sender: Arc<dyn GcodeSender>,
}

impl SendRawCommandUseCase {
    /// Lines are queued on `dispatcher` and written by `sender`
    pub fn new(dispatcher: Arc<CommandDispatcher>, sender: Arc<dyn GcodeSender>) -> Self {
        Self { dispatcher, sender }
    }

    /// Queue `command` without waiting for the device's `ok`
    pub fn execute(&self, command: &str) -> Result<()> {
        self.execute_with(command, false)
    }

    /// Queue `command`; blank input is ignored
    pub fn execute_with(&self, command: &str, wait_for_ok: bool) -> Result<()> {
        let command = command.trim();
        if command.is_empty() {
            return Ok(());
        }
        let line = command.to_string();
        let sender = self.sender.clone();
        self.dispatcher.dispatch(
            CommandRequest::new(
                format!("RAW {}", command),
                format!("Sending {}", command),
                move || sender.send_raw(&line, wait_for_ok),
            )
            .with_refresh_position(true),
        )
    }
}
