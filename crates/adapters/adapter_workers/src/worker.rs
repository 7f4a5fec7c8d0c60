//! The loop a worker thread runs.

use hubkit_app::guard::call_guarded;
use hubkit_app::worker::{Emitter, TaskFactory};
use serde_json::Value;
use tokio::sync::mpsc;

/// A message addressed to a worker.
#[derive(Debug)]
pub(crate) struct Envelope {
    pub event: String,
    pub data: Value,
}

/// Build the task, then feed it events until the inbox closes.
///
/// A panic while building the task or handling an event ends the worker.
/// Liveness is observed from outside by polling the thread handle.
pub(crate) fn run(
    identifier: &str,
    factory: &TaskFactory,
    data: Value,
    emitter: &Emitter,
    mut inbox: mpsc::UnboundedReceiver<Envelope>,
) {
    let mut task = match call_guarded(|| factory(data, emitter)) {
        Ok(task) => task,
        Err(reason) => {
            tracing::error!(worker = %identifier, %reason, "worker task panicked while starting");
            return;
        }
    };

    while let Some(Envelope { event, data }) = inbox.blocking_recv() {
        match call_guarded(|| task.on_event(&event, data, emitter)) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::warn!(worker = %identifier, %event, error = %err, "worker event failed");
            }
            Err(reason) => {
                tracing::error!(worker = %identifier, %event, %reason, "worker task panicked");
                return;
            }
        }
    }
    tracing::debug!(worker = %identifier, "worker inbox closed");
}
