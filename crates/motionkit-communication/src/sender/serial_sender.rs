//! Serial G-code sender
//!
//! Frames relative moves as G-code, writes them one line at a time and
//! waits for each acknowledgment under a wall-clock deadline. Accepted moves
//! are appended to a private trace from which the current position is
//! reconstructed; moves that would leave the configured travel are replaced
//! by a return to the origin.

use super::protocol::{self, ResponseLine};
use super::trace::PositionTrace;
use super::{GcodeSender, SenderConfig};
use crate::communication::serial::SerialPortFactory;
use crate::communication::{SerialPortInfo, Transport, TransportFactory};
use crate::instrumentation::{EventSink, NoopSink};
use motionkit_core::{
    CommandAck, ConnectionError, Error, Feedrate, InstrumentationEvent, InstrumentationKind,
    MotionError, Position, Result,
};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Ack message of a move replaced by homing
pub const RANGE_EXCEEDED: &str = "Range exceeded";

/// Ack message of a home request with an empty trace
pub const ALREADY_CENTERED: &str = "Already centered";

/// An open transport and what it is attached to
struct Link {
    transport: Box<dyn Transport>,
    port: String,
}

/// How one line exchange ended
enum Outcome {
    /// Device answered `ok`
    Acknowledged,
    /// Device answered an `error:` line
    Rejected(String),
    /// Caller did not wait for an answer
    NotAwaited,
}

struct Exchange {
    responses: Vec<String>,
    outcome: Outcome,
}

/// `GcodeSender` over a line-oriented transport
pub struct SerialGcodeSender {
    factory: Arc<dyn TransportFactory>,
    config: SenderConfig,
    /// Held for the whole of every exchange sequence
    link: Mutex<Option<Link>>,
    /// Readable without waiting for an in-flight exchange
    connected: AtomicBool,
    port: RwLock<Option<String>>,
    trace: Mutex<PositionTrace>,
    sink: RwLock<Arc<dyn EventSink>>,
}

impl SerialGcodeSender {
    /// Create a sender opening transports through `factory`
    pub fn new(factory: Arc<dyn TransportFactory>, config: SenderConfig) -> Self {
        Self {
            factory,
            config,
            link: Mutex::new(None),
            connected: AtomicBool::new(false),
            port: RwLock::new(None),
            trace: Mutex::new(PositionTrace::new()),
            sink: RwLock::new(Arc::new(NoopSink)),
        }
    }

    /// Create a sender talking to real serial ports
    pub fn serial(config: SenderConfig) -> Self {
        Self::new(Arc::new(SerialPortFactory), config)
    }

    /// Route instrumentation records to `sink`
    pub fn set_event_sink(&self, sink: Arc<dyn EventSink>) {
        *self.sink.write() = sink;
    }

    /// Active configuration
    pub fn config(&self) -> &SenderConfig {
        &self.config
    }

    /// Number of moves in the trace
    pub fn trace_len(&self) -> usize {
        self.trace.lock().len()
    }

    fn emit(&self, event: InstrumentationEvent) {
        let port = self.port.read().clone();
        let sink = self.sink.read().clone();
        sink.publish(event.with_port(port));
    }

    fn with_link<T>(&self, f: impl FnOnce(&mut Link) -> Result<T>) -> Result<T> {
        let mut guard = self.link.lock();
        let link = guard.as_mut().ok_or(ConnectionError::NotConnected)?;
        f(link)
    }

    /// Write one line and, if asked, read until `ok` / `error:`
    fn exchange(&self, link: &mut Link, command: &str, wait_for_ok: bool) -> Result<Exchange> {
        let encoded = protocol::encode_line(command);
        let shown = encoded.trim_end();
        let byte_len = encoded.len();

        self.emit(InstrumentationEvent::now(InstrumentationKind::WriteStart).with_command(shown, byte_len));
        tracing::debug!(port = %link.port, ">> {}", shown);
        link.transport
            .write_all(encoded.as_bytes())
            .and_then(|_| link.transport.flush())
            .map_err(transport_error)?;
        self.emit(InstrumentationEvent::now(InstrumentationKind::WriteEnd).with_command(shown, byte_len));

        if !wait_for_ok {
            return Ok(Exchange {
                responses: Vec::new(),
                outcome: Outcome::NotAwaited,
            });
        }
        self.read_until_ack(link, shown, byte_len)
    }

    fn read_until_ack(&self, link: &mut Link, command: &str, byte_len: usize) -> Result<Exchange> {
        let deadline = Instant::now() + self.config.ack_timeout;
        let mut responses: Vec<String> = Vec::new();

        while Instant::now() < deadline {
            let Some(raw) = link.transport.read_line().map_err(transport_error)? else {
                continue;
            };
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            if responses.is_empty() {
                self.emit(
                    InstrumentationEvent::now(InstrumentationKind::FirstByteIn)
                        .with_command(command, byte_len)
                        .with_line(line),
                );
            }
            tracing::debug!(port = %link.port, "<< {}", line);
            responses.push(line.to_string());

            let classified = ResponseLine::classify(line);
            if classified.is_terminal() {
                self.emit(
                    InstrumentationEvent::now(InstrumentationKind::OkParsed)
                        .with_command(command, byte_len)
                        .with_line(line)
                        .with_lines(responses.len()),
                );
                let outcome = match classified {
                    ResponseLine::Error(error_line) => {
                        tracing::warn!("Device rejected '{}': {}", command, error_line);
                        Outcome::Rejected(error_line)
                    }
                    _ => Outcome::Acknowledged,
                };
                return Ok(Exchange { responses, outcome });
            }
        }

        let timeout_ms = self.config.ack_timeout.as_millis() as u64;
        self.emit(
            InstrumentationEvent::now(InstrumentationKind::Timeout)
                .with_command(command, byte_len)
                .with_lines(responses.len()),
        );
        tracing::warn!("No ack for '{}' within {}ms", command, timeout_ms);
        Err(MotionError::Timeout {
            command: command.to_string(),
            timeout_ms,
        }
        .into())
    }

    /// Send the framed lines in order, stopping at the first rejection
    ///
    /// `moved` is set once the motion line itself has been acknowledged.
    fn run_sequence(
        &self,
        link: &mut Link,
        lines: &[String],
        responses: &mut Vec<String>,
        moved: &mut bool,
    ) -> Result<Option<String>> {
        for line in lines {
            let exchange = self.exchange(link, line, true)?;
            responses.extend(exchange.responses);
            if let Outcome::Rejected(error_line) = exchange.outcome {
                return Ok(Some(error_line));
            }
            if protocol::is_motion_line(line) {
                *moved = true;
            }
        }
        Ok(None)
    }

    /// Execute one relative move and trace it if the device accepted it
    fn move_relative(&self, link: &mut Link, delta: Position, feedrate: Feedrate) -> Result<CommandAck> {
        let lines = protocol::frame_relative_move(delta, feedrate);
        let mut responses = Vec::new();
        let mut moved = false;

        let outcome = self.run_sequence(link, &lines, &mut responses, &mut moved);
        if moved {
            self.trace.lock().record(delta);
        }

        match outcome? {
            None => Ok(CommandAck::accepted("ok", responses)),
            Some(error_line) => Ok(CommandAck::rejected(error_line, responses)),
        }
    }

    fn home_locked(&self, link: &mut Link, feedrate: Feedrate) -> Result<CommandAck> {
        let total = {
            let trace = self.trace.lock();
            if trace.is_empty() {
                return Ok(CommandAck::accepted(ALREADY_CENTERED, Vec::new()));
            }
            trace.sum()
        };
        let inverse = -total;

        let result = match self.config.limits.check(&(total + inverse)) {
            Ok(()) => self.move_relative(link, inverse, feedrate),
            Err(violation) => {
                tracing::error!("Origin lies outside the configured limits: {}", violation);
                Ok(CommandAck::rejected(RANGE_EXCEEDED, Vec::new()))
            }
        };

        self.trace.lock().clear();
        tracing::info!("Returned by {} to origin", inverse);
        result
    }
}

fn transport_error(error: std::io::Error) -> Error {
    MotionError::Transport {
        reason: error.to_string(),
    }
    .into()
}

impl GcodeSender for SerialGcodeSender {
    fn connect(&self, port: &str, baud_rate: u32) -> Result<()> {
        self.disconnect();

        let transport = self
            .factory
            .open(port, baud_rate, self.config.read_timeout)
            .inspect_err(|e| tracing::error!("Error connecting to {}: {}", port, e))?;

        *self.link.lock() = Some(Link {
            transport,
            port: port.to_string(),
        });
        *self.port.write() = Some(port.to_string());
        self.connected.store(true, Ordering::SeqCst);
        tracing::info!("Connected to {} at {} baud", port, baud_rate);
        Ok(())
    }

    fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        let previous = self.link.lock().take();
        *self.port.write() = None;
        self.trace.lock().clear();

        if let Some(mut link) = previous {
            if let Err(e) = link.transport.close() {
                tracing::warn!("Error closing {}: {}", link.port, e);
            }
            tracing::info!("Serial port {} closed", link.port);
        }
    }

    fn list_serial_ports(&self) -> Result<Vec<SerialPortInfo>> {
        self.factory.list_ports()
    }

    fn send_raw(&self, command: &str, wait_for_ok: bool) -> Result<CommandAck> {
        self.with_link(|link| {
            let exchange = self.exchange(link, command, wait_for_ok)?;
            Ok(match exchange.outcome {
                Outcome::Acknowledged => CommandAck::accepted("ok", exchange.responses),
                Outcome::Rejected(error_line) => CommandAck::rejected(error_line, exchange.responses),
                Outcome::NotAwaited => CommandAck::accepted("sent", Vec::new()),
            })
        })
    }

    fn send_coordinates(&self, position: Position, feedrate: Feedrate) -> Result<CommandAck> {
        self.with_link(|link| {
            let prospective = self.trace.lock().sum() + position;
            if let Err(violation) = self.config.limits.check(&prospective) {
                tracing::warn!("{}. Centering instead.", violation);
                self.home_locked(link, feedrate)?;
                return Ok(CommandAck::rejected(RANGE_EXCEEDED, Vec::new()));
            }
            self.move_relative(link, position, feedrate)
        })
    }

    fn home(&self, feedrate: Feedrate) -> Result<CommandAck> {
        self.with_link(|link| self.home_locked(link, feedrate))
    }

    fn current_position(&self) -> Option<Position> {
        if !self.is_connected() {
            return None;
        }
        Some(self.trace.lock().sum())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
