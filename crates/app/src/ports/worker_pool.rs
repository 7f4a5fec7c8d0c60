//! Worker pool port: isolated workers addressed by a string identifier.

use std::sync::Arc;

use serde_json::Value;

use hubkit_domain::error::HubError;
use hubkit_domain::id::Pid;

/// Receives every message a worker emits, on the host side.
pub type WorkerCallback = Arc<dyn Fn(Value) + Send + Sync>;

/// Runs named tasks in isolated workers.
///
/// Identifiers are unique among live workers. Messages travel as
/// [`serde_json::Value`], so nothing shares memory with a worker.
pub trait WorkerPool: Send + Sync {
    /// Start a worker running the registered task `task` under `identifier`.
    ///
    /// `data` is handed to the task when it is built; `callback` receives
    /// every message the worker emits.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Marshaling`] if `task` is not registered, or
    /// [`HubError::AlreadyRunning`] if a live worker already uses `identifier`.
    fn run(
        &self,
        task: &str,
        identifier: &str,
        data: Value,
        callback: Option<WorkerCallback>,
    ) -> Result<(), HubError>;

    /// Deliver `event` with `data` to a live worker.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::UnknownIdentifier`] if no live worker has `identifier`.
    fn send(&self, identifier: &str, event: &str, data: Value) -> Result<(), HubError>;

    /// Terminate a worker and forget it.
    ///
    /// The identifier is free again once this returns, but an implementation
    /// may let a handler call that is already running finish first.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::UnknownIdentifier`] if no live worker has `identifier`.
    fn kill(&self, identifier: &str) -> Result<(), HubError>;

    /// Terminate every worker. Individual failures are logged, not returned.
    fn kill_all(&self);

    /// Pseudo-pid of the worker, if it is known.
    fn pid(&self, identifier: &str) -> Option<Pid>;

    /// Whether a worker with `identifier` exists and is still alive.
    fn is_running(&self, identifier: &str) -> bool;
}

impl<T: WorkerPool + ?Sized> WorkerPool for Arc<T> {
    fn run(
        &self,
        task: &str,
        identifier: &str,
        data: Value,
        callback: Option<WorkerCallback>,
    ) -> Result<(), HubError> {
        (**self).run(task, identifier, data, callback)
    }

    fn send(&self, identifier: &str, event: &str, data: Value) -> Result<(), HubError> {
        (**self).send(identifier, event, data)
    }

    fn kill(&self, identifier: &str) -> Result<(), HubError> {
        (**self).kill(identifier)
    }

    fn kill_all(&self) {
        (**self).kill_all();
    }

    fn pid(&self, identifier: &str) -> Option<Pid> {
        (**self).pid(identifier)
    }

    fn is_running(&self, identifier: &str) -> bool {
        (**self).is_running(identifier)
    }
}
