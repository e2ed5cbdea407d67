//! Countdown Server - A state-managed HTTP server hosting a countdown timer
//!
//! This library provides the countdown state machine, the schedulers that
//! drive it, and the HTTP API a browser page uses to control it.

pub mod config;
pub mod state;
pub mod api;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use state::{AppState, TimerController};
pub use api::create_router;
pub use utils::signals::shutdown_signal;
