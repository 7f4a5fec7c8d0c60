//! Scheduler service: one-shot delayed tasks keyed by id.
//!
//! Handlers are bound to an id with [`SchedulerService::register`] and
//! resolved when the task fires, so a handler may be registered after the
//! task was scheduled. Scheduling an id again replaces the pending timer and
//! payload.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::time::Instant;

use hubkit_domain::delay::Due;
use hubkit_domain::error::HubError;
use hubkit_domain::id::TimerId;
use hubkit_domain::service::ServiceStatus;

use crate::guard::call_guarded;
use crate::ports::Clock;
use crate::services::service::Service;
use crate::timer_registry::TimerRegistry;

type TaskHandler = Arc<dyn Fn(Value) + Send + Sync>;

struct PendingTask {
    due: Instant,
    data: Value,
    timer: Option<TimerId>,
    generation: u64,
}

#[derive(Default)]
struct SchedulerState {
    status: ServiceStatus,
    handlers: HashMap<String, TaskHandler>,
    pending: HashMap<String, PendingTask>,
    generation: u64,
}

/// Dispatches one-shot callbacks after a delay.
pub struct SchedulerService {
    clock: Arc<dyn Clock>,
    timers: Arc<TimerRegistry>,
    state: Arc<Mutex<SchedulerState>>,
}

impl SchedulerService {
    pub const NAME: &'static str = "scheduler-service";

    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, timers: Arc<TimerRegistry>) -> Self {
        Self {
            clock,
            timers,
            state: Arc::new(Mutex::new(SchedulerState::default())),
        }
    }

    /// Bind the handler run when the task `id` fires.
    pub fn register<F>(&self, id: impl Into<String>, handler: F)
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        let id = id.into();
        let previous = self.state.lock().handlers.insert(id.clone(), Arc::new(handler));
        if previous.is_some() {
            tracing::debug!(task = %id, "task handler replaced");
        }
    }

    /// Cancel any pending run of `id` and drop its handler.
    ///
    /// Returns `false` if nothing was registered or pending under `id`.
    pub fn unregister(&self, id: &str) -> bool {
        let mut state = self.state.lock();
        let handler = state.handlers.remove(id);
        let pending = state.pending.remove(id);
        if let Some(timer) = pending.as_ref().and_then(|task| task.timer) {
            self.timers.cancel(timer);
        }
        let known = handler.is_some() || pending.is_some();
        if known {
            tracing::debug!(task = %id, "task unregistered");
        }
        known
    }

    /// Run the handler of `id` with `data` once `when` is due.
    ///
    /// A pending run of the same id is replaced. Past timestamps fire
    /// immediately. While the service is stopped the task is kept and armed
    /// by the next `start`.
    pub fn schedule(&self, id: impl Into<String>, when: impl Into<Due>, data: Value) {
        let id = id.into();
        let delay = when.into().remaining(self.clock.now());

        let due = self.timers.now() + delay;

        let mut state = self.state.lock();
        state.generation += 1;
        let generation = state.generation;
        let timer = (state.status == ServiceStatus::Running)
            .then(|| self.arm(id.clone(), delay, generation));
        let task = PendingTask {
            due,
            data,
            timer,
            generation,
        };
        if let Some(previous) = state.pending.insert(id.clone(), task) {
            if let Some(timer) = previous.timer {
                self.timers.cancel(timer);
            }
            tracing::debug!(task = %id, "pending task replaced");
        }
        tracing::debug!(task = %id, ?delay, "task scheduled");
    }

    #[must_use]
    pub fn is_scheduled(&self, id: &str) -> bool {
        self.state.lock().pending.contains_key(id)
    }

    /// Time left before the pending run of `id`.
    #[must_use]
    pub fn due_in(&self, id: &str) -> Option<Duration> {
        self.state
            .lock()
            .pending
            .get(id)
            .map(|task| task.due.saturating_duration_since(self.timers.now()))
    }

    /// Number of pending runs.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.state.lock().pending.len()
    }

    fn arm(&self, id: String, delay: Duration, generation: u64) -> TimerId {
        let state = Arc::clone(&self.state);
        self.timers
            .once(delay, move || fire(&state, &id, generation))
    }
}

fn fire(state: &Mutex<SchedulerState>, id: &str, generation: u64) {
    let (handler, data) = {
        let mut state = state.lock();
        let current = state
            .pending
            .get(id)
            .is_some_and(|task| task.generation == generation);
        if !current {
            return;
        }
        let Some(task) = state.pending.remove(id) else {
            return;
        };
        (state.handlers.get(id).cloned(), task.data)
    };

    let Some(handler) = handler else {
        tracing::warn!(task = %id, "no handler registered for due task");
        return;
    };
    tracing::debug!(task = %id, "task fired");
    if let Err(reason) = call_guarded(|| handler(data)) {
        tracing::error!(task = %id, %reason, "task handler panicked");
    }
}

impl Service for SchedulerService {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn status(&self) -> ServiceStatus {
        self.state.lock().status
    }

    /// Arm every pending task with its remaining delay.
    #[tracing::instrument(skip(self), fields(service = Self::NAME))]
    fn start(&self) -> Result<(), HubError> {
        let mut state = self.state.lock();
        if state.status == ServiceStatus::Running {
            return Err(HubError::AlreadyRunning {
                name: Self::NAME.to_string(),
            });
        }
        let now = self.timers.now();
        for (id, task) in &mut state.pending {
            let delay = task.due.saturating_duration_since(now);
            task.timer = Some(self.arm(id.clone(), delay, task.generation));
        }
        state.status = ServiceStatus::Running;
        tracing::info!(pending = state.pending.len(), "service started");
        Ok(())
    }

    /// Disarm pending tasks; they are kept for the next start.
    #[tracing::instrument(skip(self), fields(service = Self::NAME))]
    fn stop(&self) -> Result<(), HubError> {
        let mut state = self.state.lock();
        for task in state.pending.values_mut() {
            if let Some(timer) = task.timer.take() {
                self.timers.cancel(timer);
            }
        }
        state.status = ServiceStatus::Stopped;
        tracing::info!("service stopped");
        Ok(())
    }
}

impl fmt::Debug for SchedulerService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SchedulerService")
            .field("status", &state.status)
            .field("handlers", &state.handlers.len())
            .field("pending", &state.pending.len())
            .finish_non_exhaustive()
    }
}
