//! Timer state structure and the control view derived from it

use std::fmt;

use serde::{Deserialize, Serialize};

use super::TimerDuration;

/// Lifecycle state of the countdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    /// Not counting; the entered duration is editable
    #[default]
    Idle,
    /// A decrement loop is active
    Running,
    /// Decrement loop stopped, remaining seconds retained
    Paused,
}

impl TimerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerState::Idle => "idle",
            TimerState::Running => "running",
            TimerState::Paused => "paused",
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, TimerState::Running)
    }
}

impl fmt::Display for TimerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When the duration inputs accept edits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditPolicy {
    /// Editable only while Idle; a paused timer must be reset to edit
    #[default]
    IdleOnly,
    /// Editable while Idle or Paused
    IdleOrPaused,
}

impl EditPolicy {
    pub fn allows_edit(&self, state: TimerState) -> bool {
        match self {
            EditPolicy::IdleOnly => state == TimerState::Idle,
            EditPolicy::IdleOrPaused => state != TimerState::Running,
        }
    }
}

/// What the presentation layer should show for the current state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlView {
    /// Zero-padded hours, minutes, seconds
    pub fields: [String; 3],
    pub start_enabled: bool,
    pub start_visible: bool,
    pub pause_visible: bool,
    pub reset_enabled: bool,
    pub inputs_read_only: bool,
}

impl ControlView {
    /// Derive the view. `can_start` is the `total > 0` predicate for whatever
    /// the fields currently show.
    pub fn derive(state: TimerState, displayed: TimerDuration, can_start: bool, policy: EditPolicy) -> Self {
        let running = state.is_running();
        Self {
            fields: displayed.padded_fields(),
            start_enabled: can_start && !running,
            start_visible: !running,
            pause_visible: running,
            reset_enabled: can_start || state != TimerState::Idle,
            inputs_read_only: !policy.allows_edit(state),
        }
    }
}

/// Point-in-time copy of the controller state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub state: TimerState,
    pub remaining_seconds: u64,
    /// The duration currently shown in the input fields
    pub display: TimerDuration,
    pub can_start: bool,
    pub view: ControlView,
}
