//! In-memory simulated controller
//!
//! A `TransportFactory` whose ports answer every written line through a
//! configurable responder (by default a single `ok`). Every written and read
//! line is appended to a shared wire log so the exchange order can be
//! inspected. Used for dry runs without hardware and throughout the tests.

use super::{SerialPortInfo, Transport, TransportFactory};
use motionkit_core::{thread_safe_vec, ConnectionError, Result, ThreadSafeVec};
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Computes the device's response lines for one received command line
pub type Responder = Arc<dyn Fn(&str) -> Vec<String> + Send + Sync>;

/// One line crossing the simulated wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireEntry {
    /// Host wrote this line (terminator stripped)
    Written(String),
    /// Host read this line
    Read(String),
}

/// Shared, ordered record of wire traffic
pub type WireLog = ThreadSafeVec<WireEntry>;

/// Port name advertised by a default simulator
pub const SIMULATED_PORT: &str = "sim://motion";

/// Factory of simulated device connections
///
/// Clones share the wire log.
#[derive(Clone)]
pub struct SimulatedPortFactory {
    responder: Responder,
    response_delay: Duration,
    unavailable: Vec<String>,
    ports: Vec<SerialPortInfo>,
    wire: WireLog,
}

impl SimulatedPortFactory {
    /// Simulator acknowledging every line with `ok`
    pub fn new() -> Self {
        Self {
            responder: Arc::new(|_| vec!["ok".to_string()]),
            response_delay: Duration::ZERO,
            unavailable: Vec::new(),
            ports: vec![SerialPortInfo::new(
                SIMULATED_PORT,
                "Simulated motion controller",
            )],
            wire: thread_safe_vec(),
        }
    }

    /// Replace the responder
    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&str) -> Vec<String> + Send + Sync + 'static,
    {
        self.responder = Arc::new(responder);
        self
    }

    /// Delay every response by `delay`
    pub fn with_response_delay(mut self, delay: Duration) -> Self {
        self.response_delay = delay;
        self
    }

    /// Make `port` fail to open
    pub fn with_unavailable_port(mut self, port: impl Into<String>) -> Self {
        self.unavailable.push(port.into());
        self
    }

    /// Advertise an additional port in `list_ports`
    pub fn with_port(mut self, info: SerialPortInfo) -> Self {
        self.ports.push(info);
        self
    }

    /// Shared wire log
    pub fn wire(&self) -> WireLog {
        self.wire.clone()
    }
}

impl Default for SimulatedPortFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportFactory for SimulatedPortFactory {
    fn open(
        &self,
        port: &str,
        _baud_rate: u32,
        read_timeout: Duration,
    ) -> Result<Box<dyn Transport>> {
        if self.unavailable.iter().any(|p| p == port) {
            return Err(ConnectionError::FailedToOpen {
                port: port.to_string(),
                reason: "simulated port unavailable".to_string(),
            }
            .into());
        }
        tracing::debug!("Opened simulated port {}", port);
        Ok(Box::new(SimulatedPort {
            responder: self.responder.clone(),
            response_delay: self.response_delay,
            read_timeout,
            pending: VecDeque::new(),
            wire: self.wire.clone(),
            closed: false,
        }))
    }

    fn list_ports(&self) -> Result<Vec<SerialPortInfo>> {
        Ok(self.ports.clone())
    }
}

struct SimulatedPort {
    responder: Responder,
    response_delay: Duration,
    read_timeout: Duration,
    pending: VecDeque<(Instant, String)>,
    wire: WireLog,
    closed: bool,
}

impl SimulatedPort {
    fn pop_ready(&mut self) -> Option<String> {
        let ready = self
            .pending
            .front()
            .is_some_and(|(at, _)| *at <= Instant::now());
        if !ready {
            return None;
        }
        let (_, line) = self.pending.pop_front()?;
        self.wire.lock().push(WireEntry::Read(line.clone()));
        Some(line)
    }

    fn ensure_open(&self) -> io::Result<()> {
        if self.closed {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "simulated port closed",
            ));
        }
        Ok(())
    }
}

impl Transport for SimulatedPort {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.ensure_open()?;
        let text = String::from_utf8_lossy(data);
        let ready_at = Instant::now() + self.response_delay;
        for line in text.split('\n') {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            self.wire.lock().push(WireEntry::Written(line.to_string()));
            for response in (self.responder)(line) {
                self.pending.push_back((ready_at, response));
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.ensure_open()
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        self.ensure_open()?;
        if let Some(line) = self.pop_ready() {
            return Ok(Some(line));
        }
        let wait = self
            .pending
            .front()
            .map(|(at, _)| at.saturating_duration_since(Instant::now()))
            .unwrap_or(self.read_timeout)
            .min(self.read_timeout);
        thread::sleep(wait);
        Ok(self.pop_ready())
    }

    fn close(&mut self) -> io::Result<()> {
        self.closed = true;
        self.pending.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_simulator_acks_each_line() {
        let factory = SimulatedPortFactory::new();
        let mut port = factory
            .open(SIMULATED_PORT, 115200, Duration::from_millis(5))
            .unwrap();

        port.write_all(b"G21\r\n").unwrap();
        assert_eq!(port.read_line().unwrap().as_deref(), Some("ok"));
        assert_eq!(port.read_line().unwrap(), None);

        assert_eq!(
            *factory.wire().lock(),
            vec![
                WireEntry::Written("G21".to_string()),
                WireEntry::Read("ok".to_string())
            ]
        );
    }

    #[test]
    fn test_response_delay_is_honoured() {
        let factory = SimulatedPortFactory::new().with_response_delay(Duration::from_millis(30));
        let mut port = factory
            .open(SIMULATED_PORT, 115200, Duration::from_millis(5))
            .unwrap();

        port.write_all(b"M2\r\n").unwrap();
        assert_eq!(port.read_line().unwrap(), None);
        thread::sleep(Duration::from_millis(40));
        assert_eq!(port.read_line().unwrap().as_deref(), Some("ok"));
    }

    #[test]
    fn test_unavailable_port_fails_to_open() {
        let factory = SimulatedPortFactory::new().with_unavailable_port("COM3");
        let err = factory
            .open("COM3", 115200, Duration::from_millis(5))
            .err()
            .unwrap();
        assert!(err.is_connection_error());
    }

    #[test]
    fn test_closed_port_rejects_io() {
        let factory = SimulatedPortFactory::new();
        let mut port = factory
            .open(SIMULATED_PORT, 115200, Duration::from_millis(5))
            .unwrap();
        port.close().unwrap();
        assert!(port.write_all(b"G21\r\n").is_err());
    }
}
