//! Tick scheduling module
//!
//! This module contains the schedulers that drive the once-per-second countdown.

#[cfg(any(test, feature = "testing-support"))]
pub mod manual;
pub mod scheduler;

// Re-export main types
#[cfg(any(test, feature = "testing-support"))]
pub use manual::ManualScheduler;
pub use scheduler::{Scheduler, TickCallback, TickHandle, TokioScheduler};
