//! Application use cases
//!
//! Thin orchestration over the dispatcher, the sender and the poller. Each
//! command use case builds a `CommandRequest` and hands it to the dispatcher;
//! none of them touch the transport on the caller's thread.

mod connection;
mod motion;
mod polling;

pub use connection::GcodeConnectionService;
pub use motion::{HomeMachineUseCase, SendCoordinatesUseCase, SendRawCommandUseCase};
pub use polling::PollCurrentPositionUseCase;
