//! Worker-side contract: the code that runs inside an isolated worker.
//!
//! A worker never receives a closure from the host. It is built from a
//! named factory registered in a [`TaskRegistry`] at startup, then driven by
//! `(event, data)` messages. Everything crossing the boundary is a
//! [`serde_json::Value`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

/// Errors raised by a task while handling an event.
#[derive(Debug, thiserror::Error)]
pub enum WorkerTaskError {
    /// The task has no handler for this event.
    #[error("unhandled event {0:?}")]
    UnhandledEvent(String),

    /// The handler failed.
    #[error("task failed")]
    Failed(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// A task executed inside a worker.
pub trait WorkerTask: Send {
    /// Handle one `(event, data)` message sent by the host.
    ///
    /// # Errors
    ///
    /// Errors are logged by the worker loop; the worker keeps running.
    fn on_event(&mut self, event: &str, data: Value, emitter: &Emitter)
    -> Result<(), WorkerTaskError>;
}

/// Builds a task from the initial data handed to `run`.
pub type TaskFactory = Arc<dyn Fn(Value, &Emitter) -> Box<dyn WorkerTask> + Send + Sync>;

/// Sends messages from a worker back to its host-side callback.
#[derive(Clone)]
pub struct Emitter {
    identifier: Arc<str>,
    sender: mpsc::UnboundedSender<Value>,
}

impl Emitter {
    #[must_use]
    pub fn new(identifier: &str, sender: mpsc::UnboundedSender<Value>) -> Self {
        Self {
            identifier: Arc::from(identifier),
            sender,
        }
    }

    /// Identifier of the worker this emitter belongs to.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Send a message to the host.
    ///
    /// Returns `false` when the payload cannot be serialized or the host
    /// side is gone.
    pub fn emit<T: Serialize>(&self, message: &T) -> bool {
        let value = match serde_json::to_value(message) {
            Ok(value) => value,
            Err(err) => {
                tracing::error!(worker = %self.identifier, error = %err, "unserializable worker message");
                return false;
            }
        };
        self.sender.send(value).is_ok()
    }
}

impl fmt::Debug for Emitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("identifier", &self.identifier)
            .finish_non_exhaustive()
    }
}

/// Static table of tasks a worker pool can run, keyed by name.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    tasks: HashMap<String, TaskFactory>,
}

impl TaskRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task factory under `name`, replacing any previous one.
    #[must_use]
    pub fn with_task<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(Value, &Emitter) -> Box<dyn WorkerTask> + Send + Sync + 'static,
    {
        self.tasks.insert(name.into(), Arc::new(factory));
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<TaskFactory> {
        self.tasks.get(name).cloned()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    /// Registered task names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tasks.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("tasks", &self.names())
            .finish()
    }
}
