//! Repeating tick scheduler backed by tokio

use std::{fmt, time::Duration};
use tokio::{
    runtime::Handle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tracing::debug;

/// Callback fired once per period
pub type TickCallback = Box<dyn FnMut() + Send + 'static>;

/// Something that can fire a callback at a fixed period until cancelled
pub trait Scheduler: Send + Sync {
    /// Start firing `callback` every `period`. The first call happens one
    /// period from now. Firing stops when the returned handle is cancelled
    /// or dropped.
    fn schedule_repeating(&self, period: Duration, callback: TickCallback) -> TickHandle;
}

/// Cancellation handle for a scheduled loop. Dropping it cancels the loop.
pub struct TickHandle {
    canceller: Option<Box<dyn FnOnce() + Send>>,
}

impl TickHandle {
    pub fn new(canceller: impl FnOnce() + Send + 'static) -> Self {
        Self {
            canceller: Some(Box::new(canceller)),
        }
    }

    /// Stop the loop. No callback starts after this returns.
    pub fn cancel(mut self) {
        self.run_canceller();
    }

    fn run_canceller(&mut self) {
        if let Some(canceller) = self.canceller.take() {
            canceller();
        }
    }
}

impl Drop for TickHandle {
    fn drop(&mut self) {
        self.run_canceller();
    }
}

impl fmt::Debug for TickHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TickHandle")
            .field("active", &self.canceller.is_some())
            .finish()
    }
}

/// Scheduler that runs each loop as a task on a tokio runtime
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    runtime: Handle,
}

impl TokioScheduler {
    pub fn from_handle(runtime: Handle) -> Self {
        Self { runtime }
    }

    /// Use the runtime the caller is running on
    pub fn current() -> Result<Self, String> {
        Handle::try_current()
            .map(Self::from_handle)
            .map_err(|e| format!("No tokio runtime available for the tick scheduler: {}", e))
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_repeating(&self, period: Duration, mut callback: TickCallback) -> TickHandle {
        let task = self.runtime.spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                callback();
            }
        });

        debug!("Spawned tick loop with period {:?}", period);
        let abort = task.abort_handle();
        TickHandle::new(move || {
            debug!("Aborting tick loop");
            abort.abort();
        })
    }
}
