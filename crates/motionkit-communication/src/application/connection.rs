//! Connecting, disconnecting and listing ports

use crate::communication::SerialPortInfo;
use crate::poller::PositionPoller;
use crate::sender::GcodeSender;
use motionkit_core::Result;
use std::sync::Arc;

/// Connection management for the UI and CLI
///
/// Every change of connection state is followed by an immediate position
/// refresh so observers see the new state without waiting a full interval.
pub struct GcodeConnectionService {
    sender: Arc<dyn GcodeSender>,
    poller: Arc<PositionPoller>,
}

impl GcodeConnectionService {
    /// Manage `sender`'s connection, nudging `poller` on every change
    pub fn new(sender: Arc<dyn GcodeSender>, poller: Arc<PositionPoller>) -> Self {
        Self { sender, poller }
    }

    /// Ports the sender can open
    pub fn list_ports(&self) -> Result<Vec<SerialPortInfo>> {
        self.sender.list_serial_ports()
    }

    /// Open `port`, closing any previous connection first
    ///
    /// The poller is triggered whether or not the port opened.
    pub fn connect(&self, port: &str, baud_rate: u32) -> Result<()> {
        let result = self.sender.connect(port, baud_rate);
        self.poller.trigger();
        result
    }

    /// Close the port; a no-op when already disconnected
    pub fn disconnect(&self) {
        self.sender.disconnect();
        self.poller.trigger();
    }

    pub fn is_connected(&self) -> bool {
        self.sender.is_connected()
    }
}
