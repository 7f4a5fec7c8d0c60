//! Services manager: bulk lifecycle and the liveness watchdog.

use std::sync::Arc;

use parking_lot::Mutex;

use hubkit_domain::recurrence::EVERY_TEN_SECONDS;
use hubkit_domain::service::{ServiceMode, ServiceStatus};
use hubkit_domain::time::Tick;
use hubkit_domain::trigger::TriggerKey;

use crate::services::service::Service;
use crate::services::time_event_service::TimeEventService;

/// Key the watchdog trigger is registered under.
pub const WATCHDOG_KEY: &str = "services-watchdog";

type Services = Arc<Mutex<Vec<Arc<dyn Service>>>>;

/// Owns the hub's services, in insertion order.
#[derive(Default)]
pub struct ServicesManager {
    services: Services,
}

impl ServicesManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a manager whose watchdog runs every ten seconds on `time_events`.
    #[must_use]
    pub fn with_watchdog(time_events: &TimeEventService) -> Self {
        let manager = Self::new();
        manager.watch(time_events);
        manager
    }

    /// Register the watchdog on `time_events`. Calling it twice is a no-op.
    pub fn watch(&self, time_events: &TimeEventService) -> TriggerKey {
        time_events.register(
            watchdog,
            Arc::clone(&self.services),
            EVERY_TEN_SECONDS,
            Some(WATCHDOG_KEY),
        )
    }

    /// Add a service. A second service with the same name is ignored.
    pub fn add(&self, service: Arc<dyn Service>) -> bool {
        let mut services = self.services.lock();
        if services.iter().any(|known| known.name() == service.name()) {
            tracing::warn!(service = %service.name(), "service already managed");
            return false;
        }
        tracing::debug!(service = %service.name(), mode = %service.mode(), "service added");
        services.push(service);
        true
    }

    pub fn remove(&self, name: &str) -> Option<Arc<dyn Service>> {
        let mut services = self.services.lock();
        let index = services.iter().position(|service| service.name() == name)?;
        Some(services.remove(index))
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Service>> {
        self.services
            .lock()
            .iter()
            .find(|service| service.name() == name)
            .cloned()
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.services
            .lock()
            .iter()
            .map(|service| service.name().to_string())
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.services.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.lock().is_empty()
    }

    /// Start every stopped service. Returns the names of those that failed.
    pub fn start_all(&self) -> Vec<String> {
        let mut failed = Vec::new();
        for service in self.snapshot() {
            if service.status() == ServiceStatus::Running {
                continue;
            }
            if let Err(err) = service.start() {
                tracing::error!(service = %service.name(), error = %err, "service failed to start");
                failed.push(service.name().to_string());
            }
        }
        failed
    }

    /// Stop every service. Returns the names of those that failed.
    pub fn stop_all(&self) -> Vec<String> {
        let mut failed = Vec::new();
        for service in self.snapshot() {
            if let Err(err) = service.stop() {
                tracing::error!(service = %service.name(), error = %err, "service failed to stop");
                failed.push(service.name().to_string());
            }
        }
        failed
    }

    /// Restart every service. Returns the names of those that failed.
    pub fn restart_all(&self) -> Vec<String> {
        let mut failed = Vec::new();
        for service in self.snapshot() {
            if let Err(err) = service.restart() {
                tracing::error!(service = %service.name(), error = %err, "service failed to restart");
                failed.push(service.name().to_string());
            }
        }
        failed
    }

    /// Run one watchdog pass now. Returns the names of restarted services.
    pub fn revive_dead(&self) -> Vec<String> {
        revive_dead(&self.services)
    }

    fn snapshot(&self) -> Vec<Arc<dyn Service>> {
        self.services.lock().clone()
    }
}

fn watchdog(services: &Services, _tick: Tick) {
    revive_dead(services);
}

fn revive_dead(services: &Services) -> Vec<String> {
    let snapshot = services.lock().clone();
    let mut revived = Vec::new();
    for service in snapshot {
        if service.mode() == ServiceMode::Classic
            || service.status() != ServiceStatus::Running
            || service.is_alive()
        {
            continue;
        }
        tracing::warn!(service = %service.name(), mode = %service.mode(), "service died, restarting");
        match service.restart() {
            Ok(()) => revived.push(service.name().to_string()),
            Err(err) => {
                tracing::error!(service = %service.name(), error = %err, "service restart failed");
            }
        }
    }
    revived
}
