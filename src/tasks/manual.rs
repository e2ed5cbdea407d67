//! Manually advanced scheduler for deterministic timing

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
    time::Duration,
};

use super::scheduler::{Scheduler, TickCallback, TickHandle};

/// A fake clock. Nothing fires until [`ManualScheduler::advance`] moves time
/// forward, and then every due callback fires in time order.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    inner: Arc<Mutex<ManualClock>>,
}

#[derive(Default)]
struct ManualClock {
    now: Duration,
    next_id: u64,
    loops: BTreeMap<u64, ManualLoop>,
}

struct ManualLoop {
    period: Duration,
    next_fire: Duration,
    /// Taken out while the callback runs
    callback: Option<TickCallback>,
}

fn lock(clock: &Mutex<ManualClock>) -> MutexGuard<'_, ManualClock> {
    clock.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Elapsed fake time
    pub fn now(&self) -> Duration {
        lock(&self.inner).now
    }

    /// Number of loops that have not been cancelled
    pub fn active_loops(&self) -> usize {
        lock(&self.inner).loops.len()
    }

    /// Move time forward, firing every callback that falls due on the way.
    /// Callbacks run without the clock locked, so they may cancel loops.
    pub fn advance(&self, by: Duration) {
        let target = lock(&self.inner).now + by;

        loop {
            let (id, mut callback) = {
                let mut clock = lock(&self.inner);
                let due = clock
                    .loops
                    .iter()
                    .filter(|(_, l)| l.callback.is_some() && l.next_fire <= target)
                    .min_by_key(|(id, l)| (l.next_fire, **id))
                    .map(|(id, _)| *id);

                let Some(id) = due else { break };
                let Some(entry) = clock.loops.get_mut(&id) else { break };
                let fire_at = entry.next_fire;
                entry.next_fire += entry.period;
                let Some(callback) = entry.callback.take() else { break };
                clock.now = fire_at;
                (id, callback)
            };

            callback();

            if let Some(entry) = lock(&self.inner).loops.get_mut(&id) {
                entry.callback = Some(callback);
            }
        }

        lock(&self.inner).now = target;
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_repeating(&self, period: Duration, callback: TickCallback) -> TickHandle {
        let period = period.max(Duration::from_nanos(1));
        let id = {
            let mut clock = lock(&self.inner);
            let id = clock.next_id;
            clock.next_id += 1;
            let next_fire = clock.now + period;
            clock.loops.insert(
                id,
                ManualLoop {
                    period,
                    next_fire,
                    callback: Some(callback),
                },
            );
            id
        };

        let clock: Weak<Mutex<ManualClock>> = Arc::downgrade(&self.inner);
        TickHandle::new(move || {
            if let Some(clock) = clock.upgrade() {
                lock(&clock).loops.remove(&id);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_advance_fires_due_callbacks() {
        let scheduler = ManualScheduler::new();
        let count = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&count);
        let _handle = scheduler.schedule_repeating(
            Duration::from_secs(1),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        scheduler.advance(Duration::from_millis(999));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        scheduler.advance(Duration::from_millis(1));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        scheduler.advance(Duration::from_secs(4));
        assert_eq!(count.load(Ordering::SeqCst), 5);
        assert_eq!(scheduler.now(), Duration::from_secs(5));
    }

    #[test]
    fn test_cancel_from_inside_callback() {
        let scheduler = ManualScheduler::new();
        let count = Arc::new(AtomicU32::new(0));
        let slot: Arc<Mutex<Option<TickHandle>>> = Arc::new(Mutex::new(None));

        let counter = Arc::clone(&count);
        let own_handle = Arc::clone(&slot);
        let handle = scheduler.schedule_repeating(
            Duration::from_secs(1),
            Box::new(move || {
                if counter.fetch_add(1, Ordering::SeqCst) == 1 {
                    if let Some(handle) = own_handle.lock().unwrap().take() {
                        handle.cancel();
                    }
                }
            }),
        );
        *slot.lock().unwrap() = Some(handle);

        scheduler.advance(Duration::from_secs(10));
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.active_loops(), 0);
    }
}
