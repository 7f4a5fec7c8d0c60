//! Plugin facades: the narrow surface plugins use to reach the timing
//! services, plus the public constants they match on.

use std::sync::Arc;

use serde_json::Value;

use hubkit_domain::delay::Due;
use hubkit_domain::recurrence::Recurrence;
use hubkit_domain::time::Tick;
use hubkit_domain::trigger::TriggerKey;

pub use hubkit_domain::delay::{
    IN_A_DAY, IN_A_HOUR, IN_A_MINUTE, IN_FIVE_MINUTES, IN_TEN_MINUTES, IN_THIRTY_MINUTES,
    IN_TWELVE_HOUR,
};
pub use hubkit_domain::error::{
    ERROR_EXTERNAL_COMMAND_UNDEF, ERROR_STRINGIFY_FUNCTION_THREAD, ERROR_UNDEFINED_THREADS_MANAGER,
    ERROR_UNKNOWN_IDENTIFIER,
};
pub use hubkit_domain::recurrence::{
    CUSTOM, EVERY_DAYS, EVERY_FIFTEEN_MINUTES, EVERY_FIVE_MINUTES, EVERY_HOURS,
    EVERY_HOURS_INACCURATE, EVERY_MINUTES, EVERY_SECONDS, EVERY_TEN_SECONDS, EVERY_THIRTY_MINUTES,
};
pub use hubkit_domain::service::{
    RUNNING, SERVICE_MODE_CLASSIC, SERVICE_MODE_EXTERNAL, SERVICE_MODE_THREADED, STOPPED,
};

use crate::services::{SchedulerService, TimeEventService};

/// Recurring triggers, as seen by a plugin.
#[derive(Debug, Clone)]
pub struct TimeEventApi {
    service: Arc<TimeEventService>,
}

impl TimeEventApi {
    #[must_use]
    pub fn new(service: Arc<TimeEventService>) -> Self {
        Self { service }
    }

    /// Register a recurring callback. The derived key identifies the
    /// plugin's own call site.
    #[track_caller]
    pub fn register<C, F>(
        &self,
        callback: F,
        context: C,
        recurrence: Recurrence,
        key: Option<&str>,
    ) -> TriggerKey
    where
        C: Send + Sync + 'static,
        F: Fn(&C, Tick) + Send + Sync + 'static,
    {
        self.service.register(callback, context, recurrence, key)
    }

    pub fn unregister(&self, key: &TriggerKey) -> bool {
        self.service.unregister(key)
    }
}

/// One-shot tasks, as seen by a plugin.
#[derive(Debug, Clone)]
pub struct SchedulerApi {
    service: Arc<SchedulerService>,
}

impl SchedulerApi {
    #[must_use]
    pub fn new(service: Arc<SchedulerService>) -> Self {
        Self { service }
    }

    pub fn register<F>(&self, id: impl Into<String>, handler: F)
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        self.service.register(id, handler);
    }

    pub fn schedule(&self, id: impl Into<String>, when: impl Into<Due>, data: Value) {
        self.service.schedule(id, when, data);
    }

    pub fn unregister(&self, id: &str) -> bool {
        self.service.unregister(id)
    }
}
