//! # hubkit-adapter-workers
//!
//! Worker adapter: runs registered tasks on dedicated OS threads.
//!
//! ## Responsibilities
//! - Implement the `WorkerPool` port
//! - Resolve task names against the static `TaskRegistry`
//! - Carry `(event, data)` messages in and emitted messages out, as JSON values
//! - Report liveness by polling the worker's OS thread
//!
//! ## Dependency rule
//! Same as other adapters: depends on `hubkit-app` and `hubkit-domain`.

pub mod error;
mod worker;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use hubkit_app::guard::call_guarded;
use hubkit_app::ports::{WorkerCallback, WorkerPool};
use hubkit_app::worker::{Emitter, TaskRegistry};
use hubkit_domain::error::{HubError, MarshalingError, UnknownIdentifierError};
use hubkit_domain::id::Pid;

use crate::error::WorkerError;
use crate::worker::Envelope;

const FIRST_PID: u32 = 1;

struct WorkerHandle {
    pid: Pid,
    inbox: mpsc::UnboundedSender<Envelope>,
    thread: thread::JoinHandle<()>,
    forwarder: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    fn is_alive(&self) -> bool {
        !self.thread.is_finished()
    }

    /// Close the inbox and detach the thread. A worker blocked in handler
    /// code finishes that call, then exits.
    fn terminate(self) {
        if let Some(forwarder) = self.forwarder {
            forwarder.abort();
        }
        drop(self.inbox);
    }
}

/// Thread-backed [`WorkerPool`].
pub struct ThreadsManager {
    tasks: TaskRegistry,
    runtime: Handle,
    workers: Mutex<HashMap<String, WorkerHandle>>,
    next_pid: AtomicU32,
}

impl ThreadsManager {
    /// Create a pool running tasks from `tasks`; worker messages are
    /// delivered to callbacks on `runtime`.
    #[must_use]
    pub fn new(tasks: TaskRegistry, runtime: Handle) -> Self {
        Self {
            tasks,
            runtime,
            workers: Mutex::new(HashMap::new()),
            next_pid: AtomicU32::new(FIRST_PID),
        }
    }

    /// Identifiers of the workers currently held, sorted.
    #[must_use]
    pub fn identifiers(&self) -> Vec<String> {
        let mut identifiers: Vec<String> = self.workers.lock().keys().cloned().collect();
        identifiers.sort_unstable();
        identifiers
    }

    fn unknown(identifier: &str) -> HubError {
        UnknownIdentifierError {
            identifier: identifier.to_string(),
        }
        .into()
    }
}

async fn forward(
    identifier: String,
    mut outbox: mpsc::UnboundedReceiver<Value>,
    callback: WorkerCallback,
) {
    while let Some(message) = outbox.recv().await {
        if let Err(reason) = call_guarded(|| callback(message)) {
            tracing::error!(worker = %identifier, %reason, "worker callback panicked");
        }
    }
}

impl WorkerPool for ThreadsManager {
    #[tracing::instrument(skip(self, data, callback))]
    fn run(
        &self,
        task: &str,
        identifier: &str,
        data: Value,
        callback: Option<WorkerCallback>,
    ) -> Result<(), HubError> {
        let factory = self.tasks.get(task).ok_or_else(|| MarshalingError {
            task: task.to_string(),
        })?;

        let mut workers = self.workers.lock();
        if workers.get(identifier).is_some_and(WorkerHandle::is_alive) {
            return Err(HubError::AlreadyRunning {
                name: identifier.to_string(),
            });
        }
        if let Some(dead) = workers.remove(identifier) {
            dead.terminate();
        }

        let (inbox, inbox_rx) = mpsc::unbounded_channel();
        let (outbox, outbox_rx) = mpsc::unbounded_channel();
        let emitter = Emitter::new(identifier, outbox);
        let forwarder = callback.map(|callback| {
            self.runtime
                .spawn(forward(identifier.to_string(), outbox_rx, callback))
        });

        let name = identifier.to_string();
        let spawned = thread::Builder::new()
            .name(format!("worker-{identifier}"))
            .spawn(move || worker::run(&name, &factory, data, &emitter, inbox_rx));
        let thread = match spawned {
            Ok(thread) => thread,
            Err(err) => {
                if let Some(forwarder) = forwarder {
                    forwarder.abort();
                }
                return Err(WorkerError::Spawn(err).into());
            }
        };

        let pid = Pid::new(self.next_pid.fetch_add(1, Ordering::Relaxed));
        workers.insert(
            identifier.to_string(),
            WorkerHandle {
                pid,
                inbox,
                thread,
                forwarder,
            },
        );
        tracing::info!(%pid, "worker started");
        Ok(())
    }

    fn send(&self, identifier: &str, event: &str, data: Value) -> Result<(), HubError> {
        let workers = self.workers.lock();
        let handle = workers
            .get(identifier)
            .filter(|handle| handle.is_alive())
            .ok_or_else(|| Self::unknown(identifier))?;
        handle
            .inbox
            .send(Envelope {
                event: event.to_string(),
                data,
            })
            .map_err(|_| Self::unknown(identifier))
    }

    /// Close the worker's inbox and forget its handle.
    ///
    /// Threads cannot be preempted: a worker blocked inside a handler keeps
    /// its thread, and whatever the handler holds, until that call returns.
    /// A `run` under the same identifier right after `kill` can therefore
    /// overlap with the old instance for the duration of that call.
    #[tracing::instrument(skip(self))]
    fn kill(&self, identifier: &str) -> Result<(), HubError> {
        let handle = self
            .workers
            .lock()
            .remove(identifier)
            .ok_or_else(|| Self::unknown(identifier))?;
        let alive = handle.is_alive();
        handle.terminate();
        if !alive {
            tracing::debug!("removed dead worker");
            return Err(Self::unknown(identifier));
        }
        tracing::info!("worker killed");
        Ok(())
    }

    fn kill_all(&self) {
        let drained: Vec<_> = self.workers.lock().drain().collect();
        for (identifier, handle) in drained {
            tracing::debug!(worker = %identifier, "killing worker");
            handle.terminate();
        }
    }

    fn pid(&self, identifier: &str) -> Option<Pid> {
        self.workers.lock().get(identifier).map(|handle| handle.pid)
    }

    fn is_running(&self, identifier: &str) -> bool {
        self.workers
            .lock()
            .get(identifier)
            .is_some_and(WorkerHandle::is_alive)
    }
}

impl Drop for ThreadsManager {
    fn drop(&mut self) {
        self.kill_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hubkit_app::worker::{WorkerTask, WorkerTaskError};
    use hubkit_domain::error::{ERROR_STRINGIFY_FUNCTION_THREAD, ERROR_UNKNOWN_IDENTIFIER};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    /// Echoes `echo` events, panics on `crash`, blocks on `stall`, emits its
    /// initial data when built.
    struct Echo;

    impl WorkerTask for Echo {
        fn on_event(
            &mut self,
            event: &str,
            data: Value,
            emitter: &Emitter,
        ) -> Result<(), WorkerTaskError> {
            match event {
                "echo" => {
                    emitter.emit(&json!({"echo": data}));
                    Ok(())
                }
                "crash" => panic!("worker crashed on purpose"),
                "stall" => {
                    std::thread::sleep(Duration::from_millis(300));
                    Ok(())
                }
                other => Err(WorkerTaskError::UnhandledEvent(other.to_string())),
            }
        }
    }

    fn registry() -> TaskRegistry {
        TaskRegistry::new().with_task("echo", |data, emitter| {
            emitter.emit(&json!({"ready": data}));
            Box::new(Echo)
        })
    }

    fn collector() -> (WorkerCallback, Arc<Mutex<Vec<Value>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: WorkerCallback = Arc::new(move |message| sink.lock().push(message));
        (callback, seen)
    }

    async fn eventually(condition: impl Fn() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not met in time");
    }

    #[tokio::test]
    async fn should_reject_unregistered_task() {
        let pool = ThreadsManager::new(registry(), Handle::current());

        let err = pool.run("missing", "w1", Value::Null, None).unwrap_err();

        assert!(matches!(err, HubError::Marshaling(_)));
        assert_eq!(
            err.to_string(),
            format!("{ERROR_STRINGIFY_FUNCTION_THREAD} missing")
        );
        assert!(!pool.is_running("w1"));
    }

    #[tokio::test]
    async fn should_deliver_initial_data_and_replies_to_callback() {
        let pool = ThreadsManager::new(registry(), Handle::current());
        let (callback, seen) = collector();

        pool.run("echo", "w1", json!("boot"), Some(callback)).unwrap();
        pool.send("w1", "echo", json!(42)).unwrap();

        eventually(|| seen.lock().len() == 2).await;
        assert_eq!(
            *seen.lock(),
            vec![json!({"ready": "boot"}), json!({"echo": 42})]
        );
        assert!(pool.is_running("w1"));
        assert!(pool.pid("w1").is_some());
    }

    #[tokio::test]
    async fn should_keep_running_after_unhandled_event() {
        let pool = ThreadsManager::new(registry(), Handle::current());
        let (callback, seen) = collector();
        pool.run("echo", "w1", Value::Null, Some(callback)).unwrap();

        pool.send("w1", "unknown", Value::Null).unwrap();
        pool.send("w1", "echo", json!(1)).unwrap();

        eventually(|| seen.lock().len() == 2).await;
        assert!(pool.is_running("w1"));
    }

    #[tokio::test]
    async fn should_refuse_second_live_worker_with_same_identifier() {
        let pool = ThreadsManager::new(registry(), Handle::current());
        pool.run("echo", "w1", Value::Null, None).unwrap();

        let err = pool.run("echo", "w1", Value::Null, None).unwrap_err();

        assert!(matches!(err, HubError::AlreadyRunning { name } if name == "w1"));
    }

    #[tokio::test]
    async fn should_assign_distinct_pids() {
        let pool = ThreadsManager::new(registry(), Handle::current());
        pool.run("echo", "w1", Value::Null, None).unwrap();
        pool.run("echo", "w2", Value::Null, None).unwrap();

        assert_ne!(pool.pid("w1"), pool.pid("w2"));
        assert_eq!(pool.identifiers(), vec!["w1".to_string(), "w2".to_string()]);
    }

    #[tokio::test]
    async fn should_fail_to_address_unknown_identifier() {
        let pool = ThreadsManager::new(registry(), Handle::current());

        let err = pool.send("ghost", "echo", Value::Null).unwrap_err();
        assert_eq!(err.to_string(), format!("{ERROR_UNKNOWN_IDENTIFIER} ghost"));

        let err = pool.kill("ghost").unwrap_err();
        assert!(matches!(err, HubError::UnknownIdentifier(_)));
        assert_eq!(pool.pid("ghost"), None);
    }

    #[tokio::test]
    async fn should_forget_killed_worker() {
        let pool = ThreadsManager::new(registry(), Handle::current());
        pool.run("echo", "w1", Value::Null, None).unwrap();

        pool.kill("w1").unwrap();

        assert!(!pool.is_running("w1"));
        assert!(pool.send("w1", "echo", Value::Null).is_err());
        assert!(pool.kill("w1").is_err());
        pool.run("echo", "w1", Value::Null, None).unwrap();
        assert!(pool.is_running("w1"));
    }

    #[tokio::test]
    async fn should_free_identifier_while_killed_worker_is_still_busy() {
        let pool = ThreadsManager::new(registry(), Handle::current());
        let (callback, seen) = collector();
        pool.run("echo", "w1", Value::Null, Some(callback)).unwrap();
        eventually(|| seen.lock().len() == 1).await;
        pool.send("w1", "stall", Value::Null).unwrap();

        pool.kill("w1").unwrap();
        let (callback, seen) = collector();
        pool.run("echo", "w1", json!("second"), Some(callback)).unwrap();

        eventually(|| seen.lock().len() == 1).await;
        assert_eq!(*seen.lock(), vec![json!({"ready": "second"})]);
        assert!(pool.is_running("w1"));
        assert_eq!(pool.identifiers(), vec!["w1".to_string()]);
    }

    #[tokio::test]
    async fn should_detect_silently_crashed_worker() {
        let pool = ThreadsManager::new(registry(), Handle::current());
        pool.run("echo", "w1", Value::Null, None).unwrap();

        pool.send("w1", "crash", Value::Null).unwrap();
        eventually(|| !pool.is_running("w1")).await;

        assert!(pool.send("w1", "echo", Value::Null).is_err());
        assert!(matches!(
            pool.kill("w1"),
            Err(HubError::UnknownIdentifier(_))
        ));
        assert!(pool.identifiers().is_empty());
    }

    #[tokio::test]
    async fn should_replace_dead_worker_on_run() {
        let pool = ThreadsManager::new(registry(), Handle::current());
        pool.run("echo", "w1", Value::Null, None).unwrap();
        pool.send("w1", "crash", Value::Null).unwrap();
        eventually(|| !pool.is_running("w1")).await;

        pool.run("echo", "w1", Value::Null, None).unwrap();

        assert!(pool.is_running("w1"));
    }

    #[tokio::test]
    async fn should_kill_every_worker() {
        let pool = ThreadsManager::new(registry(), Handle::current());
        pool.run("echo", "w1", Value::Null, None).unwrap();
        pool.run("echo", "w2", Value::Null, None).unwrap();

        pool.kill_all();

        assert!(pool.identifiers().is_empty());
        assert!(!pool.is_running("w1"));
    }
}
