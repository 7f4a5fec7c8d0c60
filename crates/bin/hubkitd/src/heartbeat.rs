//! Heartbeat: a built-in threaded service pinged once a minute.
//!
//! The worker counts the beats it receives and reports each one back, so a
//! stuck or crashed worker pool shows up in the logs (and is restarted by
//! the watchdog).

use std::sync::Arc;

use serde_json::{Value, json};

use hubkit_app::ports::WorkerPool;
use hubkit_app::services::{ManagedService, Service, ServiceBody, ServicesManager, TimeEventService};
use hubkit_app::worker::{Emitter, TaskRegistry, WorkerTask, WorkerTaskError};
use hubkit_domain::error::HubError;
use hubkit_domain::recurrence::EVERY_MINUTES;
use hubkit_domain::service::{ServiceMode, ServiceStatus};
use hubkit_domain::time::Tick;

/// Service name, worker identifier and task name.
pub const HEARTBEAT: &str = "heartbeat";

const EVENT_BEAT: &str = "beat";

#[derive(Debug, Default)]
struct HeartbeatTask {
    beats: u64,
}

impl WorkerTask for HeartbeatTask {
    fn on_event(
        &mut self,
        event: &str,
        data: Value,
        emitter: &Emitter,
    ) -> Result<(), WorkerTaskError> {
        match event {
            EVENT_BEAT => {
                self.beats += 1;
                emitter.emit(&json!({"beats": self.beats, "at": data}));
                Ok(())
            }
            other => Err(WorkerTaskError::UnhandledEvent(other.to_string())),
        }
    }
}

struct HeartbeatBody;

impl ServiceBody for HeartbeatBody {
    fn on_worker_message(&self, message: Value) {
        tracing::debug!(%message, "heartbeat");
    }
}

/// Tasks the daemon's worker pool can run.
#[must_use]
pub fn tasks() -> TaskRegistry {
    TaskRegistry::new().with_task(HEARTBEAT, |_, _| Box::new(HeartbeatTask::default()))
}

/// Add the heartbeat service to `manager` and ping it every minute.
///
/// # Errors
///
/// Returns [`HubError::Validation`] if the service cannot be built.
pub fn install(
    manager: &ServicesManager,
    time_events: &TimeEventService,
    workers: Arc<dyn WorkerPool>,
) -> Result<Arc<ManagedService>, HubError> {
    let service = Arc::new(
        ManagedService::builder()
            .name(HEARTBEAT)
            .mode(ServiceMode::Threaded)
            .workers(workers)
            .body(HeartbeatBody)
            .build()?,
    );
    manager.add(Arc::clone(&service) as Arc<dyn Service>);
    time_events.register(beat, Arc::clone(&service), EVERY_MINUTES, Some(HEARTBEAT));
    Ok(service)
}

fn beat(service: &Arc<ManagedService>, tick: Tick) {
    if service.status() != ServiceStatus::Running {
        return;
    }
    if let Err(err) = service.send(EVENT_BEAT, json!(tick.to_string())) {
        tracing::warn!(error = %err, "heartbeat not delivered");
    }
}
