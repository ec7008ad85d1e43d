//! Instrumentation sinks
//!
//! The serial sender and the poller report protocol timing through an
//! injectable `EventSink` instead of ad hoc callbacks.

use motionkit_core::{
    thread_safe_vec, topics, InstrumentationEvent, InstrumentationKind, MotionBus, MotionEvent,
    ThreadSafeVec,
};
use std::sync::Arc;

/// Receives structured instrumentation records
pub trait EventSink: Send + Sync {
    /// Record one event; must not block
    fn publish(&self, event: InstrumentationEvent);
}

/// Sink that drops everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn publish(&self, _event: InstrumentationEvent) {}
}

/// Forwards records onto the bus's instrumentation topic
#[derive(Debug, Clone)]
pub struct BusEventSink {
    bus: Arc<MotionBus>,
}

impl BusEventSink {
    /// Create a sink publishing on `bus`
    pub fn new(bus: Arc<MotionBus>) -> Self {
        Self { bus }
    }
}

impl EventSink for BusEventSink {
    fn publish(&self, event: InstrumentationEvent) {
        tracing::trace!(
            kind = %event.kind,
            thread = %event.thread,
            command = ?event.command,
            "instrumentation"
        );
        self.bus
            .publish(topics::INSTRUMENTATION, MotionEvent::Instrumentation(event));
    }
}

/// Keeps every record in memory, in arrival order
#[derive(Debug, Clone)]
pub struct RecordingSink {
    events: ThreadSafeVec<InstrumentationEvent>,
}

impl RecordingSink {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self {
            events: thread_safe_vec(),
        }
    }

    /// Snapshot of recorded events
    pub fn events(&self) -> Vec<InstrumentationEvent> {
        self.events.lock().clone()
    }

    /// Kinds of the recorded events, in order
    pub fn kinds(&self) -> Vec<InstrumentationKind> {
        self.events.lock().iter().map(|e| e.kind).collect()
    }

    /// Forget everything recorded so far
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, event: InstrumentationEvent) {
        self.events.lock().push(event);
    }
}
