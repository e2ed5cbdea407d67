//! State management module
//!
//! This module contains the countdown state machine and the server state around it.

pub mod app_state;
pub mod controller;
pub mod duration;
pub mod timer_state;

// Re-export main types
pub use app_state::AppState;
pub use controller::{
    ChannelObserver, CompletionNotice, TimerController, TimerEvent, TimerObserver, TICK_PERIOD,
};
pub use duration::TimerDuration;
pub use timer_state::{ControlView, EditPolicy, TimerSnapshot, TimerState};
