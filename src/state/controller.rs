//! Countdown state machine

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::tasks::{Scheduler, TickHandle};
use super::{ControlView, EditPolicy, TimerDuration, TimerSnapshot, TimerState};

/// Period of the decrement loop
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Text of the completion notice
pub const COMPLETION_MESSAGE: &str = "Finish";

/// Delivered once when a countdown reaches zero on its own
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionNotice {
    pub message: String,
    /// Length of the countdown that finished
    pub duration: TimerDuration,
    pub finished_at: DateTime<Utc>,
}

/// Notification emitted by the controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimerEvent {
    DurationChanged(TimerSnapshot),
    StateChanged(TimerSnapshot),
    Completed(CompletionNotice),
}

impl TimerEvent {
    /// Short event name, used as the SSE event field
    pub fn kind(&self) -> &'static str {
        match self {
            TimerEvent::DurationChanged(_) => "duration",
            TimerEvent::StateChanged(_) => "state",
            TimerEvent::Completed(_) => "completed",
        }
    }
}

/// Receives controller notifications.
///
/// Handlers run while the controller is locked and must not call back into it.
pub trait TimerObserver: Send {
    /// Displayed duration or remaining seconds changed
    fn on_duration_changed(&mut self, _snapshot: &TimerSnapshot) {}

    /// State or control enablement changed
    fn on_state_changed(&mut self, _snapshot: &TimerSnapshot) {}

    /// A countdown reached zero
    fn on_completed(&mut self, _notice: &CompletionNotice) {}
}

/// Forwards every notification into a broadcast channel
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: broadcast::Sender<TimerEvent>,
}

impl ChannelObserver {
    pub fn new(tx: broadcast::Sender<TimerEvent>) -> Self {
        Self { tx }
    }

    fn forward(&self, event: TimerEvent) {
        // Err only means nobody is listening right now
        if self.tx.send(event).is_err() {
            debug!("No subscribers for timer event");
        }
    }
}

impl TimerObserver for ChannelObserver {
    fn on_duration_changed(&mut self, snapshot: &TimerSnapshot) {
        self.forward(TimerEvent::DurationChanged(snapshot.clone()));
    }

    fn on_state_changed(&mut self, snapshot: &TimerSnapshot) {
        self.forward(TimerEvent::StateChanged(snapshot.clone()));
    }

    fn on_completed(&mut self, notice: &CompletionNotice) {
        self.forward(TimerEvent::Completed(notice.clone()));
    }
}

/// Owns the countdown and drives it through an injected [`Scheduler`].
///
/// Cloning yields another handle to the same timer. All operations are total:
/// invalid input is clamped and operations that make no sense in the current
/// state are ignored.
#[derive(Clone)]
pub struct TimerController {
    core: Arc<Mutex<TimerCore>>,
    scheduler: Arc<dyn Scheduler>,
}

struct TimerCore {
    /// Duration the user last entered
    duration: TimerDuration,
    remaining: u64,
    state: TimerState,
    policy: EditPolicy,
    /// Bumped whenever a loop is cancelled so in-flight ticks from it are ignored
    generation: u64,
    handle: Option<TickHandle>,
    observers: Vec<Box<dyn TimerObserver>>,
}

fn lock(core: &Mutex<TimerCore>) -> MutexGuard<'_, TimerCore> {
    core.lock().unwrap_or_else(PoisonError::into_inner)
}

impl TimerController {
    /// Create an Idle controller with a zero duration
    pub fn new(scheduler: Arc<dyn Scheduler>, policy: EditPolicy) -> Self {
        Self {
            core: Arc::new(Mutex::new(TimerCore {
                duration: TimerDuration::ZERO,
                remaining: 0,
                state: TimerState::Idle,
                policy,
                generation: 0,
                handle: None,
                observers: Vec::new(),
            })),
            scheduler,
        }
    }

    /// Register a notification handler
    pub fn subscribe(&self, observer: impl TimerObserver + 'static) {
        lock(&self.core).observers.push(Box::new(observer));
    }

    /// Clamp and apply a new duration. Returns the duration the fields now
    /// show, which is the current one unchanged when inputs are read-only.
    pub fn set_duration(&self, hours: i64, minutes: i64, seconds: i64) -> TimerDuration {
        let requested = TimerDuration::clamped(hours, minutes, seconds);
        lock(&self.core).apply_duration(requested)
    }

    /// [`set_duration`](Self::set_duration) from raw input field values
    pub fn set_duration_raw(&self, hours: &Value, minutes: &Value, seconds: &Value) -> TimerDuration {
        let requested = TimerDuration::from_raw(hours, minutes, seconds);
        lock(&self.core).apply_duration(requested)
    }

    /// Begin or resume counting down
    pub fn start(&self) -> TimerSnapshot {
        let mut core = lock(&self.core);

        match core.state {
            TimerState::Running => {
                debug!("Start ignored, timer already running");
                return core.snapshot();
            }
            TimerState::Idle => core.remaining = core.duration.total_seconds(),
            TimerState::Paused => {}
        }

        if core.remaining == 0 {
            debug!("Start ignored, nothing to count down");
            return core.snapshot();
        }

        core.cancel_loop();
        core.state = TimerState::Running;

        let generation = core.generation;
        let weak = Arc::downgrade(&self.core);
        let handle = self.scheduler.schedule_repeating(
            TICK_PERIOD,
            Box::new(move || {
                if let Some(core) = weak.upgrade() {
                    lock(&core).tick_from(generation);
                }
            }),
        );
        core.handle = Some(handle);

        info!("Countdown started with {}s remaining", core.remaining);
        let snapshot = core.snapshot();
        core.notify_state(&snapshot);
        snapshot
    }

    /// Stop counting and keep the remaining seconds
    pub fn pause(&self) -> TimerSnapshot {
        let mut core = lock(&self.core);

        if core.state != TimerState::Running {
            debug!("Pause ignored, timer is {}", core.state);
            return core.snapshot();
        }

        core.cancel_loop();
        core.state = TimerState::Paused;

        info!("Countdown paused with {}s remaining", core.remaining);
        let snapshot = core.snapshot();
        core.notify_state(&snapshot);
        snapshot
    }

    /// Stop counting and clear everything back to Idle with a zero duration
    pub fn reset(&self) -> TimerSnapshot {
        let mut core = lock(&self.core);
        core.reset();
        info!("Timer reset");
        core.snapshot()
    }

    /// Apply one tick to the running countdown. Ignored unless Running.
    pub fn tick(&self) {
        let mut core = lock(&self.core);
        let generation = core.generation;
        core.tick_from(generation);
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        lock(&self.core).snapshot()
    }

    pub fn state(&self) -> TimerState {
        lock(&self.core).state
    }

    pub fn remaining_seconds(&self) -> u64 {
        lock(&self.core).remaining
    }

    /// Duration the user last entered
    pub fn duration(&self) -> TimerDuration {
        lock(&self.core).duration
    }

    /// True when the fields show a non-zero duration
    pub fn can_start(&self) -> bool {
        lock(&self.core).can_start()
    }

    pub fn edit_policy(&self) -> EditPolicy {
        lock(&self.core).policy
    }
}

impl fmt::Debug for TimerController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = lock(&self.core);
        f.debug_struct("TimerController")
            .field("state", &core.state)
            .field("remaining", &core.remaining)
            .field("duration", &core.duration)
            .field("policy", &core.policy)
            .field("observers", &core.observers.len())
            .finish()
    }
}

impl TimerCore {
    fn displayed(&self) -> TimerDuration {
        match self.state {
            TimerState::Idle => self.duration,
            TimerState::Running | TimerState::Paused => TimerDuration::from_total(self.remaining),
        }
    }

    fn can_start(&self) -> bool {
        !self.displayed().is_zero()
    }

    fn snapshot(&self) -> TimerSnapshot {
        let display = self.displayed();
        let can_start = !display.is_zero();
        TimerSnapshot {
            state: self.state,
            remaining_seconds: self.remaining,
            display,
            can_start,
            view: ControlView::derive(self.state, display, can_start, self.policy),
        }
    }

    fn apply_duration(&mut self, requested: TimerDuration) -> TimerDuration {
        if !self.policy.allows_edit(self.state) {
            debug!("Duration edit ignored, inputs are read-only while {}", self.state);
            return self.displayed();
        }

        self.duration = requested;
        if self.state == TimerState::Paused {
            self.remaining = requested.total_seconds();
        }

        debug!("Duration set to {}", requested);
        let snapshot = self.snapshot();
        self.notify_duration(&snapshot);
        requested
    }

    fn cancel_loop(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        if let Some(handle) = self.handle.take() {
            handle.cancel();
        }
    }

    fn tick_from(&mut self, generation: u64) {
        if generation != self.generation || self.state != TimerState::Running {
            debug!("Ignoring stale tick");
            return;
        }

        if self.remaining > 0 {
            self.remaining -= 1;
            debug!("Tick, {}s remaining", self.remaining);
            let snapshot = self.snapshot();
            self.notify_duration(&snapshot);
        }

        if self.remaining == 0 {
            self.complete();
        }
    }

    fn complete(&mut self) {
        self.cancel_loop();
        self.state = TimerState::Idle;

        let notice = CompletionNotice {
            message: COMPLETION_MESSAGE.to_string(),
            duration: self.duration,
            finished_at: Utc::now(),
        };
        info!("Countdown of {} finished", notice.duration);
        for observer in &mut self.observers {
            observer.on_completed(&notice);
        }

        self.reset();
    }

    fn reset(&mut self) {
        self.cancel_loop();
        self.state = TimerState::Idle;
        self.remaining = 0;
        self.duration = TimerDuration::ZERO;

        let snapshot = self.snapshot();
        self.notify_duration(&snapshot);
        self.notify_state(&snapshot);
    }

    fn notify_duration(&mut self, snapshot: &TimerSnapshot) {
        for observer in &mut self.observers {
            observer.on_duration_changed(snapshot);
        }
    }

    fn notify_state(&mut self, snapshot: &TimerSnapshot) {
        for observer in &mut self.observers {
            observer.on_state_changed(snapshot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::{ManualScheduler, TickCallback};

    /// Keeps every callback it is given, even after its handle is cancelled,
    /// so a test can fire a loop that was already in flight.
    #[derive(Clone, Default)]
    struct RetainingScheduler {
        callbacks: Arc<Mutex<Vec<TickCallback>>>,
    }

    impl RetainingScheduler {
        fn fire(&self, index: usize) {
            let mut callbacks = self.callbacks.lock().unwrap();
            (callbacks[index])();
        }
    }

    impl Scheduler for RetainingScheduler {
        fn schedule_repeating(&self, _period: Duration, callback: TickCallback) -> TickHandle {
            self.callbacks.lock().unwrap().push(callback);
            TickHandle::new(|| {})
        }
    }

    #[derive(Default, Clone)]
    struct Recorder {
        events: Arc<Mutex<Vec<TimerEvent>>>,
    }

    impl Recorder {
        fn completions(&self) -> usize {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter(|e| matches!(e, TimerEvent::Completed(_)))
                .count()
        }

        fn kinds(&self) -> Vec<&'static str> {
            self.events.lock().unwrap().iter().map(TimerEvent::kind).collect()
        }
    }

    impl TimerObserver for Recorder {
        fn on_duration_changed(&mut self, snapshot: &TimerSnapshot) {
            self.events.lock().unwrap().push(TimerEvent::DurationChanged(snapshot.clone()));
        }

        fn on_state_changed(&mut self, snapshot: &TimerSnapshot) {
            self.events.lock().unwrap().push(TimerEvent::StateChanged(snapshot.clone()));
        }

        fn on_completed(&mut self, notice: &CompletionNotice) {
            self.events.lock().unwrap().push(TimerEvent::Completed(notice.clone()));
        }
    }

    fn controller(policy: EditPolicy) -> (TimerController, ManualScheduler, Recorder) {
        let scheduler = ManualScheduler::new();
        let timer = TimerController::new(Arc::new(scheduler.clone()), policy);
        let recorder = Recorder::default();
        timer.subscribe(recorder.clone());
        (timer, scheduler, recorder)
    }

    #[test]
    fn test_initial_state() {
        let (timer, scheduler, _) = controller(EditPolicy::IdleOnly);
        assert_eq!(timer.state(), TimerState::Idle);
        assert_eq!(timer.remaining_seconds(), 0);
        assert!(!timer.can_start());
        assert_eq!(scheduler.active_loops(), 0);
    }

    #[test]
    fn test_set_duration_updates_can_start() {
        let (timer, _, recorder) = controller(EditPolicy::IdleOnly);
        let d = timer.set_duration(0, 0, 5);
        assert_eq!(d.total_seconds(), 5);
        assert!(timer.can_start());
        assert_eq!(recorder.kinds(), vec!["duration"]);
    }

    #[test]
    fn test_start_with_zero_is_noop() {
        let (timer, scheduler, recorder) = controller(EditPolicy::IdleOnly);
        timer.set_duration(0, 0, 0);
        let snapshot = timer.start();
        assert_eq!(snapshot.state, TimerState::Idle);
        assert_eq!(scheduler.active_loops(), 0);
        assert!(!recorder.kinds().contains(&"state"));
    }

    #[test]
    fn test_state_changed_marks_inputs_read_only() {
        let (timer, _, recorder) = controller(EditPolicy::IdleOnly);
        timer.set_duration(0, 1, 0);
        timer.start();

        let events = recorder.events.lock().unwrap();
        match events.last() {
            Some(TimerEvent::StateChanged(s)) => {
                assert_eq!(s.state, TimerState::Running);
                assert!(s.view.inputs_read_only);
                assert!(s.view.pause_visible);
                assert!(!s.view.start_visible);
            }
            other => panic!("unexpected last event: {:?}", other),
        }
    }

    #[test]
    fn test_natural_completion_fires_once_and_resets() {
        let (timer, scheduler, recorder) = controller(EditPolicy::IdleOnly);
        timer.set_duration(0, 0, 3);
        timer.start();

        scheduler.advance(Duration::from_secs(3));
        assert_eq!(timer.state(), TimerState::Idle);
        assert_eq!(timer.remaining_seconds(), 0);
        assert_eq!(timer.duration(), TimerDuration::ZERO);
        assert_eq!(recorder.completions(), 1);
        assert_eq!(scheduler.active_loops(), 0);

        scheduler.advance(Duration::from_secs(10));
        assert_eq!(recorder.completions(), 1);
    }

    #[test]
    fn test_completion_notice_carries_length() {
        let (timer, scheduler, recorder) = controller(EditPolicy::IdleOnly);
        timer.set_duration(0, 0, 2);
        timer.start();
        scheduler.advance(Duration::from_secs(2));

        let events = recorder.events.lock().unwrap();
        let notice = events
            .iter()
            .find_map(|e| match e {
                TimerEvent::Completed(n) => Some(n.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(notice.message, "Finish");
        assert_eq!(notice.duration.total_seconds(), 2);
    }

    #[test]
    fn test_reset_while_running_does_not_complete() {
        let (timer, scheduler, recorder) = controller(EditPolicy::IdleOnly);
        timer.set_duration(0, 0, 5);
        timer.start();
        scheduler.advance(Duration::from_secs(2));
        timer.reset();

        scheduler.advance(Duration::from_secs(10));
        assert_eq!(recorder.completions(), 0);
        assert_eq!(timer.state(), TimerState::Idle);
        assert!(!timer.can_start());
    }

    #[test]
    fn test_pause_stops_ticks() {
        let (timer, scheduler, _) = controller(EditPolicy::IdleOnly);
        timer.set_duration(0, 1, 0);
        timer.start();
        scheduler.advance(Duration::from_secs(5));
        let snapshot = timer.pause();
        assert_eq!(snapshot.state, TimerState::Paused);
        assert_eq!(snapshot.remaining_seconds, 55);

        scheduler.advance(Duration::from_secs(30));
        assert_eq!(timer.remaining_seconds(), 55);
        assert_eq!(scheduler.active_loops(), 0);
    }

    #[test]
    fn test_pause_when_idle_is_noop() {
        let (timer, _, recorder) = controller(EditPolicy::IdleOnly);
        timer.pause();
        assert_eq!(timer.state(), TimerState::Idle);
        assert!(recorder.kinds().is_empty());
    }

    #[test]
    fn test_stale_tick_ignored_after_pause() {
        let (timer, _, _) = controller(EditPolicy::IdleOnly);
        timer.set_duration(0, 0, 10);
        timer.start();
        timer.pause();
        timer.tick();
        assert_eq!(timer.remaining_seconds(), 10);
    }

    #[test]
    fn test_in_flight_tick_from_paused_loop_is_ignored() {
        let scheduler = RetainingScheduler::default();
        let timer = TimerController::new(Arc::new(scheduler.clone()), EditPolicy::IdleOnly);
        timer.set_duration(0, 0, 10);

        timer.start();
        timer.pause();
        timer.start();

        scheduler.fire(0);
        assert_eq!(timer.remaining_seconds(), 10);

        scheduler.fire(1);
        assert_eq!(timer.remaining_seconds(), 9);
    }

    #[test]
    fn test_in_flight_tick_from_reset_loop_is_ignored() {
        let scheduler = RetainingScheduler::default();
        let timer = TimerController::new(Arc::new(scheduler.clone()), EditPolicy::IdleOnly);
        timer.set_duration(0, 0, 10);
        timer.start();
        timer.reset();

        timer.set_duration(0, 0, 5);
        timer.start();

        scheduler.fire(0);
        assert_eq!(timer.remaining_seconds(), 5);
        assert_eq!(timer.state(), TimerState::Running);

        scheduler.fire(1);
        assert_eq!(timer.remaining_seconds(), 4);
    }

    #[test]
    fn test_edit_rejected_while_paused_by_default() {
        let (timer, _, _) = controller(EditPolicy::IdleOnly);
        timer.set_duration(0, 0, 30);
        timer.start();
        timer.tick();
        timer.pause();

        let shown = timer.set_duration(0, 5, 0);
        assert_eq!(shown.total_seconds(), 29);
        assert_eq!(timer.remaining_seconds(), 29);
    }

    #[test]
    fn test_edit_while_paused_when_allowed() {
        let (timer, _, _) = controller(EditPolicy::IdleOrPaused);
        timer.set_duration(0, 0, 30);
        timer.start();
        timer.pause();

        let shown = timer.set_duration(0, 2, 0);
        assert_eq!(shown.total_seconds(), 120);
        assert_eq!(timer.remaining_seconds(), 120);
        assert!(!timer.snapshot().view.inputs_read_only);

        timer.start();
        timer.tick();
        assert_eq!(timer.remaining_seconds(), 119);
    }

    #[test]
    fn test_edit_rejected_while_running() {
        let (timer, _, _) = controller(EditPolicy::IdleOrPaused);
        timer.set_duration(0, 0, 30);
        timer.start();
        let shown = timer.set_duration(1, 0, 0);
        assert_eq!(shown.total_seconds(), 30);
        assert_eq!(timer.duration().total_seconds(), 30);
    }

    #[test]
    fn test_dropping_controller_cancels_loop() {
        let scheduler = ManualScheduler::new();
        let timer = TimerController::new(Arc::new(scheduler.clone()), EditPolicy::IdleOnly);
        timer.set_duration(0, 0, 10);
        timer.start();
        assert_eq!(scheduler.active_loops(), 1);

        drop(timer);
        assert_eq!(scheduler.active_loops(), 0);
    }

    #[test]
    fn test_event_kind_serialization() {
        let (timer, _, recorder) = controller(EditPolicy::IdleOnly);
        timer.set_duration(0, 0, 1);
        let events = recorder.events.lock().unwrap();
        let json = serde_json::to_value(&events[0]).unwrap();
        assert_eq!(json["type"], "duration_changed");
        assert_eq!(json["remaining_seconds"], 0);
        assert_eq!(json["view"]["fields"][2], "01");
    }
}
