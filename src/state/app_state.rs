//! Main application state management

use std::{
    sync::{Arc, Mutex},
    time::Instant,
};
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use crate::tasks::Scheduler;
use super::{ChannelObserver, EditPolicy, TimerController, TimerEvent};

/// Capacity of the event fan-out channel
const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Main application state that owns the timer and server metadata
#[derive(Debug)]
pub struct AppState {
    /// The countdown this server hosts
    pub timer: TimerController,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
    /// Last action tracking
    pub last_action: Arc<Mutex<Option<String>>>,
    pub last_action_time: Arc<Mutex<Option<DateTime<Utc>>>>,
    /// Channel every timer notification is forwarded to
    pub event_tx: broadcast::Sender<TimerEvent>,
}

impl AppState {
    /// Create a new AppState around an Idle timer driven by `scheduler`
    pub fn new(port: u16, host: String, policy: EditPolicy, scheduler: Arc<dyn Scheduler>) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let timer = TimerController::new(scheduler, policy);
        timer.subscribe(ChannelObserver::new(event_tx.clone()));

        Self {
            timer,
            start_time: Instant::now(),
            port,
            host,
            last_action: Arc::new(Mutex::new(None)),
            last_action_time: Arc::new(Mutex::new(None)),
            event_tx,
        }
    }

    /// Receive every timer notification from now on
    pub fn subscribe(&self) -> broadcast::Receiver<TimerEvent> {
        self.event_tx.subscribe()
    }

    /// Remember the most recent operation a client invoked
    pub fn record_action(&self, action: &str) -> Result<(), String> {
        let mut last_action = self.last_action.lock()
            .map_err(|e| format!("Failed to lock last action: {}", e))?;
        *last_action = Some(action.to_string());
        drop(last_action);

        let mut last_time = self.last_action_time.lock()
            .map_err(|e| format!("Failed to lock last action time: {}", e))?;
        *last_time = Some(Utc::now());
        Ok(())
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        format_uptime(self.start_time.elapsed().as_secs())
    }

    /// Get last action information
    pub fn get_last_action(&self) -> (Option<String>, Option<DateTime<Utc>>) {
        let last_action = self.last_action.lock().ok().and_then(|a| a.clone());
        let last_action_time = self.last_action_time.lock().ok().and_then(|t| *t);
        (last_action, last_action_time)
    }
}

fn format_uptime(total: u64) -> String {
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
