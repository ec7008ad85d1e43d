//! Type definitions and aliases
//!
//! This module provides type aliases for the shared-state wrappers used
//! across the MotionKit crates.

pub mod aliases;

pub use aliases::*;
