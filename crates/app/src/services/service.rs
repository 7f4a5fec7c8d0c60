//! The lifecycle contract shared by every service the hub manages.

use hubkit_domain::error::HubError;
use hubkit_domain::id::Pid;
use hubkit_domain::service::{ServiceMode, ServiceStatus};

/// A long-running unit of work with a start/stop lifecycle.
///
/// Lifecycle calls are made from one control thread at a time.
pub trait Service: Send + Sync {
    /// Unique name, also used as the worker identifier in threaded mode.
    fn name(&self) -> &str;

    fn mode(&self) -> ServiceMode {
        ServiceMode::Classic
    }

    fn status(&self) -> ServiceStatus;

    /// Process id of the child or worker backing the service, if any.
    fn pid(&self) -> Option<Pid> {
        None
    }

    /// Start the service.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::AlreadyRunning`] when the service is running, or
    /// the error that prevented it from starting. The status is left
    /// untouched on error.
    fn start(&self) -> Result<(), HubError>;

    /// Stop the service. The status is always `Stopped` afterwards.
    ///
    /// # Errors
    ///
    /// Implementations may report teardown failures; the built-in services
    /// log them instead.
    fn stop(&self) -> Result<(), HubError>;

    /// Stop then start.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`Service::stop`] and [`Service::start`].
    fn restart(&self) -> Result<(), HubError> {
        self.stop()?;
        self.start()
    }

    /// Whether the backing execution context is still alive.
    ///
    /// Only meaningful for threaded and external services; the watchdog
    /// ignores classic ones.
    fn is_alive(&self) -> bool {
        self.status() == ServiceStatus::Running
    }
}

/// Observer of a service's status transitions.
pub trait ServiceDelegate: Send + Sync {
    fn on_status_changed(&self, service: &str, status: ServiceStatus);
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recording {
        calls: Mutex<Vec<&'static str>>,
    }

    impl Service for Recording {
        fn name(&self) -> &str {
            "recording"
        }

        fn status(&self) -> ServiceStatus {
            ServiceStatus::Stopped
        }

        fn start(&self) -> Result<(), HubError> {
            self.calls.lock().push("start");
            Ok(())
        }

        fn stop(&self) -> Result<(), HubError> {
            self.calls.lock().push("stop");
            Ok(())
        }
    }

    #[test]
    fn should_stop_before_starting_on_restart() {
        let service = Recording::default();

        service.restart().unwrap();

        assert_eq!(*service.calls.lock(), vec!["stop", "start"]);
    }

    #[test]
    fn should_default_to_classic_without_pid() {
        let service = Recording::default();
        assert_eq!(service.mode(), ServiceMode::Classic);
        assert_eq!(service.pid(), None);
        assert!(!service.is_alive());
    }
}
