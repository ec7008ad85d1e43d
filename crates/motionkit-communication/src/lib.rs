//! # MotionKit Communication
//!
//! Serial G-code protocol, command serialization and position polling.
//!
//! - `communication`: serial transport, port enumeration and an in-memory
//!   simulated device
//! - `sender`: the `GcodeSender` capability and its serial implementation
//! - `dispatcher`: single-worker FIFO execution of command requests
//! - `poller`: background republishing of the derived position
//! - `application`: use cases composing the pieces above

pub mod application;
pub mod communication;
pub mod dispatcher;
pub mod instrumentation;
pub mod poller;
pub mod sender;

mod worker;

pub use application::{
    GcodeConnectionService, HomeMachineUseCase, PollCurrentPositionUseCase,
    SendCoordinatesUseCase, SendRawCommandUseCase,
};

pub use communication::{
    serial::{list_ports, SerialPortFactory, SerialPortInfo},
    simulator::{Responder, SimulatedPortFactory, WireEntry, WireLog, SIMULATED_PORT},
    Transport, TransportFactory,
};

pub use dispatcher::{CommandDispatcher, CommandRequest, DispatcherConfig};

pub use instrumentation::{BusEventSink, EventSink, NoopSink, RecordingSink};

pub use poller::{PollerConfig, PositionPoller};

pub use sender::{
    protocol, trace::PositionTrace, trace::TraceEntry, GcodeSender, SenderConfig,
    SerialGcodeSender, ALREADY_CENTERED, RANGE_EXCEEDED,
};
