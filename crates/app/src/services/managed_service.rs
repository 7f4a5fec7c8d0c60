//! Managed service: one lifecycle, three places the work can run.
//!
//! | Mode | `start` | `stop` | `is_alive` |
//! |------|---------|--------|------------|
//! | classic | runs the body in-process | flips the status | status is running |
//! | threaded | runs the worker task | kills the worker | worker is alive |
//! | external | spawns the shell command | kills the child | child is alive |

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use hubkit_domain::error::{ConfigurationError, HubError, ValidationError};
use hubkit_domain::id::Pid;
use hubkit_domain::service::{ServiceMode, ServiceStatus};

use crate::ports::{ChildProcess, ProcessSpawner, WorkerCallback, WorkerPool};
use crate::services::service::{Service, ServiceDelegate};

/// The work a service performs, whatever its mode.
pub trait ServiceBody: Send + Sync + 'static {
    /// Runs in-process when a classic service starts.
    fn run(&self) {}

    /// Payload handed to the worker task of a threaded service.
    fn initial_data(&self) -> Value {
        Value::Null
    }

    /// Receives every message emitted by the worker of a threaded service.
    fn on_worker_message(&self, _message: Value) {}
}

impl ServiceBody for () {}

#[derive(Default)]
struct ServiceState {
    status: ServiceStatus,
    pid: Option<Pid>,
    child: Option<Box<dyn ChildProcess>>,
}

/// A service whose execution context is chosen by its [`ServiceMode`].
pub struct ManagedService {
    name: String,
    mode: ServiceMode,
    command: Option<String>,
    worker_task: String,
    workers: Option<Arc<dyn WorkerPool>>,
    spawner: Option<Arc<dyn ProcessSpawner>>,
    body: Arc<dyn ServiceBody>,
    state: Mutex<ServiceState>,
    delegates: Mutex<Vec<Arc<dyn ServiceDelegate>>>,
}

impl ManagedService {
    /// Create a builder for constructing a [`ManagedService`].
    #[must_use]
    pub fn builder() -> ManagedServiceBuilder {
        ManagedServiceBuilder::default()
    }

    /// Shell command of an external service.
    #[must_use]
    pub fn command(&self) -> Option<&str> {
        self.command.as_deref()
    }

    /// Registered task name the worker of a threaded service runs.
    #[must_use]
    pub fn worker_task(&self) -> &str {
        &self.worker_task
    }

    /// Forward an event to this service's own worker.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Configuration`] if no worker pool is bound, or
    /// [`HubError::UnknownIdentifier`] if the worker is not alive.
    pub fn send(&self, event: &str, data: Value) -> Result<(), HubError> {
        let workers = self
            .workers
            .as_ref()
            .ok_or(ConfigurationError::UndefinedThreadsManager)?;
        workers.send(&self.name, event, data)
    }

    /// Add an observer of status changes. Registering the same observer
    /// twice is a no-op.
    pub fn register_delegate(&self, delegate: Arc<dyn ServiceDelegate>) {
        let mut delegates = self.delegates.lock();
        if delegates.iter().any(|known| Arc::ptr_eq(known, &delegate)) {
            tracing::warn!(service = %self.name, "delegate already registered");
            return;
        }
        delegates.push(delegate);
    }

    /// Remove an observer. Returns `false` if it was not registered.
    pub fn unregister_delegate(&self, delegate: &Arc<dyn ServiceDelegate>) -> bool {
        let mut delegates = self.delegates.lock();
        let before = delegates.len();
        delegates.retain(|known| !Arc::ptr_eq(known, delegate));
        before != delegates.len()
    }

    fn start_threaded(&self) -> Result<Option<Pid>, HubError> {
        let workers = self
            .workers
            .as_ref()
            .ok_or(ConfigurationError::UndefinedThreadsManager)?;
        let body = Arc::clone(&self.body);
        let callback: WorkerCallback = Arc::new(move |message| body.on_worker_message(message));
        workers.run(
            &self.worker_task,
            &self.name,
            self.body.initial_data(),
            Some(callback),
        )?;
        Ok(workers.pid(&self.name))
    }

    fn start_external(&self) -> Result<Box<dyn ChildProcess>, HubError> {
        let command = self
            .command
            .as_deref()
            .map(str::trim)
            .filter(|command| !command.is_empty())
            .ok_or(ConfigurationError::ExternalCommandUndefined)?;
        let spawner = self
            .spawner
            .as_ref()
            .ok_or(ConfigurationError::UndefinedProcessSpawner)?;
        spawner.spawn(&self.name, command)
    }

    fn notify(&self, status: ServiceStatus) {
        let delegates = self.delegates.lock().clone();
        for delegate in delegates {
            delegate.on_status_changed(&self.name, status);
        }
    }
}

impl Service for ManagedService {
    fn name(&self) -> &str {
        &self.name
    }

    fn mode(&self) -> ServiceMode {
        self.mode
    }

    fn status(&self) -> ServiceStatus {
        self.state.lock().status
    }

    fn pid(&self) -> Option<Pid> {
        self.state.lock().pid
    }

    #[tracing::instrument(skip(self), fields(service = %self.name, mode = %self.mode))]
    fn start(&self) -> Result<(), HubError> {
        if self.status() == ServiceStatus::Running {
            return Err(HubError::AlreadyRunning {
                name: self.name.clone(),
            });
        }

        let (pid, child) = match self.mode {
            ServiceMode::Classic => {
                self.body.run();
                (None, None)
            }
            ServiceMode::Threaded => (self.start_threaded()?, None),
            ServiceMode::External => {
                let child = self.start_external()?;
                (child.pid(), Some(child))
            }
        };

        {
            let mut state = self.state.lock();
            state.status = ServiceStatus::Running;
            state.pid = pid;
            state.child = child;
        }
        match pid {
            Some(pid) => tracing::info!(%pid, "service started"),
            None => tracing::info!("service started"),
        }
        self.notify(ServiceStatus::Running);
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(service = %self.name, mode = %self.mode))]
    fn stop(&self) -> Result<(), HubError> {
        let (was_running, child) = {
            let mut state = self.state.lock();
            let was_running = state.status == ServiceStatus::Running;
            state.status = ServiceStatus::Stopped;
            state.pid = None;
            (was_running, state.child.take())
        };

        match self.mode {
            ServiceMode::Classic => {}
            ServiceMode::Threaded => {
                if let Some(workers) = &self.workers {
                    if !workers.is_running(&self.name) {
                        tracing::debug!("worker already gone");
                    } else if let Err(err) = workers.kill(&self.name) {
                        tracing::warn!(error = %err, "could not kill worker");
                    }
                }
            }
            ServiceMode::External => match child {
                Some(mut child) => {
                    if let Err(err) = child.kill() {
                        tracing::error!(error = %err, "could not kill process");
                    }
                }
                None if was_running => tracing::warn!("no process to stop"),
                None => {}
            },
        }

        tracing::info!("service stopped");
        self.notify(ServiceStatus::Stopped);
        Ok(())
    }

    fn is_alive(&self) -> bool {
        match self.mode {
            ServiceMode::Classic => self.status() == ServiceStatus::Running,
            ServiceMode::Threaded => self
                .workers
                .as_ref()
                .is_some_and(|workers| workers.is_running(&self.name)),
            ServiceMode::External => self
                .state
                .lock()
                .child
                .as_mut()
                .is_some_and(|child| child.is_alive()),
        }
    }
}

impl fmt::Debug for ManagedService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedService")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("command", &self.command)
            .field("worker_task", &self.worker_task)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

/// Step-by-step builder for [`ManagedService`].
#[derive(Default)]
pub struct ManagedServiceBuilder {
    name: Option<String>,
    mode: ServiceMode,
    command: Option<String>,
    worker_task: Option<String>,
    workers: Option<Arc<dyn WorkerPool>>,
    spawner: Option<Arc<dyn ProcessSpawner>>,
    body: Option<Arc<dyn ServiceBody>>,
}

impl ManagedServiceBuilder {
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn mode(mut self, mode: ServiceMode) -> Self {
        self.mode = mode;
        self
    }

    /// Shell command run by an external service.
    #[must_use]
    pub fn command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    /// Registered task run by a threaded service. Defaults to the name.
    #[must_use]
    pub fn worker_task(mut self, task: impl Into<String>) -> Self {
        self.worker_task = Some(task.into());
        self
    }

    #[must_use]
    pub fn workers(mut self, workers: Arc<dyn WorkerPool>) -> Self {
        self.workers = Some(workers);
        self
    }

    #[must_use]
    pub fn spawner(mut self, spawner: Arc<dyn ProcessSpawner>) -> Self {
        self.spawner = Some(spawner);
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl ServiceBody) -> Self {
        self.body = Some(Arc::new(body));
        self
    }

    /// Consume the builder, validate, and return a [`ManagedService`].
    ///
    /// Missing collaborators are only reported by `start`, so a service can
    /// be declared before the pool or spawner it needs exists.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] if `name` is missing or empty.
    pub fn build(self) -> Result<ManagedService, HubError> {
        let name = self.name.unwrap_or_default();
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        Ok(ManagedService {
            worker_task: self.worker_task.unwrap_or_else(|| name.clone()),
            name,
            mode: self.mode,
            command: self.command,
            workers: self.workers,
            spawner: self.spawner,
            body: self.body.unwrap_or_else(|| Arc::new(())),
            state: Mutex::new(ServiceState::default()),
            delegates: Mutex::new(Vec::new()),
        })
    }
}
