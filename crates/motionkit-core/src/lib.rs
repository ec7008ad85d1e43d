//! # MotionKit Core
//!
//! Core types, traits, and utilities for MotionKit.
//! Provides the value types exchanged with the motion controller,
//! the error taxonomy, the topic-keyed event bus, and the interval
//! scheduler shared by background workers.

pub mod data;
pub mod error;
pub mod event_bus;
pub mod scheduling;
pub mod types;
pub mod validation;

pub use data::{Axis, AxisLimits, AxisRange, CommandAck, Feedrate, Position};

pub use error::{ConnectionError, Error, MotionError, Result};

pub use event_bus::{
    topics, Envelope, ErrorRaised, EventBus, EventBusConfig, InstrumentationEvent,
    InstrumentationKind, MotionBus, MotionEvent, SubscriptionId, STATUS_IDLE,
    STATUS_REFRESH_POSITION,
};

pub use scheduling::IntervalScheduler;

pub use types::{thread_safe_vec, ThreadSafeVec};

pub use validation::{ensure_positive_float, parse_float, parse_int, ValidationError};
