//! Timer registry: every host timer lives here, addressed by [`TimerId`].
//!
//! Timers are tokio tasks spawned on the runtime the registry was built
//! with, so timers can be armed from any thread. The registry keeps their
//! join handles so any timer can be cancelled by id, and so `shutdown` can
//! abort all of them when the host exits.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use hubkit_domain::id::TimerId;

type Handles = Arc<Mutex<HashMap<TimerId, JoinHandle<()>>>>;

/// Owns recurring and one-shot timers.
#[derive(Debug)]
pub struct TimerRegistry {
    runtime: Handle,
    handles: Handles,
}

impl TimerRegistry {
    #[must_use]
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            handles: Handles::default(),
        }
    }

    /// Current instant on the registry's runtime clock.
    #[must_use]
    pub fn now(&self) -> Instant {
        let _guard = self.runtime.enter();
        Instant::now()
    }

    /// Call `tick` every `period`, starting one period from now.
    ///
    /// Missed ticks are delayed rather than bursted.
    pub fn every<F>(&self, period: Duration, mut tick: F) -> TimerId
    where
        F: FnMut() + Send + 'static,
    {
        let id = TimerId::new();
        let start = self.now() + period;
        let mut handles = self.handles.lock();
        let handle = self.runtime.spawn(async move {
            let mut interval = tokio::time::interval_at(start, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                tick();
            }
        });
        handles.insert(id, handle);
        tracing::trace!(timer = %id, ?period, "recurring timer armed");
        id
    }

    /// Call `fire` once after `delay`. The timer forgets itself before firing.
    pub fn once<F>(&self, delay: Duration, fire: F) -> TimerId
    where
        F: FnOnce() + Send + 'static,
    {
        let id = TimerId::new();
        let handles = Arc::clone(&self.handles);
        let mut guard = self.handles.lock();
        let handle = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            handles.lock().remove(&id);
            fire();
        });
        guard.insert(id, handle);
        tracing::trace!(timer = %id, ?delay, "one-shot timer armed");
        id
    }

    /// Cancel a timer. Returns `false` if it already fired or never existed.
    pub fn cancel(&self, id: TimerId) -> bool {
        match self.handles.lock().remove(&id) {
            Some(handle) => {
                handle.abort();
                tracing::trace!(timer = %id, "timer cancelled");
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn is_active(&self, id: TimerId) -> bool {
        self.handles
            .lock()
            .get(&id)
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Number of timers currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.lock().is_empty()
    }

    /// Abort every timer.
    pub fn shutdown(&self) {
        let drained: Vec<_> = self.handles.lock().drain().collect();
        if !drained.is_empty() {
            tracing::debug!(count = drained.len(), "aborting timers");
        }
        for (_, handle) in drained {
            handle.abort();
        }
    }
}

impl Drop for TimerRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        (Arc::clone(&count), count)
    }

    #[tokio::test(start_paused = true)]
    async fn should_tick_once_per_period() {
        let registry = TimerRegistry::new(Handle::current());
        let (count, seen) = counter();
        registry.every(Duration::from_secs(1), move || {
            count.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(3_500)).await;

        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn should_fire_one_shot_once_and_forget_it() {
        let registry = TimerRegistry::new(Handle::current());
        let (count, seen) = counter();
        let id = registry.once(Duration::from_secs(5), move || {
            count.fetch_add(1, Ordering::SeqCst);
        });
        assert!(registry.is_active(id));

        tokio::time::sleep(Duration::from_secs(6)).await;

        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert!(!registry.is_active(id));
        assert!(registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn should_not_fire_cancelled_timer() {
        let registry = TimerRegistry::new(Handle::current());
        let (count, seen) = counter();
        let id = registry.once(Duration::from_secs(5), move || {
            count.fetch_add(1, Ordering::SeqCst);
        });

        assert!(registry.cancel(id));
        assert!(!registry.cancel(id));
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn should_arm_timers_from_threads_outside_the_runtime() {
        let registry = Arc::new(TimerRegistry::new(Handle::current()));
        let (count, seen) = counter();

        let remote = Arc::clone(&registry);
        let id = std::thread::spawn(move || {
            remote.once(Duration::from_secs(5), move || {
                count.fetch_add(1, Ordering::SeqCst);
            })
        })
        .join()
        .unwrap();
        assert!(registry.is_active(id));

        tokio::time::sleep(Duration::from_secs(6)).await;

        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn should_abort_everything_on_shutdown() {
        let registry = TimerRegistry::new(Handle::current());
        let (count, seen) = counter();
        let recurring = Arc::clone(&count);
        registry.every(Duration::from_secs(1), move || {
            recurring.fetch_add(1, Ordering::SeqCst);
        });
        registry.once(Duration::from_secs(2), move || {
            count.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(registry.len(), 2);

        registry.shutdown();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert!(registry.is_empty());
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }
}
