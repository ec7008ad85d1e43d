//! # Event Bus Module
//!
//! Topic-keyed publish/subscribe used to decouple the motion command path
//! from its observers (GUI panels, log sinks, API layers).
//!
//! ## Overview
//!
//! - Publishers emit events on a string topic without knowing subscribers
//! - Synchronous subscribers run on the publishing thread, in subscription order
//! - Async consumers may take a broadcast receiver of `(topic, event)` envelopes
//!
//! ## Usage
//!
//! ```rust,ignore
//! use motionkit_core::event_bus::{topics, MotionBus, MotionEvent};
//!
//! let bus = MotionBus::new();
//! let id = bus.subscribe(topics::POSITION, |event| {
//!     if let MotionEvent::PositionUpdated(position) = event {
//!         println!("now at {}", position);
//!     }
//! });
//!
//! bus.publish(topics::POSITION, MotionEvent::PositionUpdated(Default::default()));
//! bus.unsubscribe(topics::POSITION, id);
//! ```

mod bus;
mod events;

pub use bus::*;
pub use events::*;
