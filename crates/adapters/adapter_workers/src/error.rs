//! Worker adapter error types.

use hubkit_domain::error::HubError;

/// Errors specific to the worker adapter.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// The OS refused to create the worker thread.
    #[error("failed to spawn worker thread")]
    Spawn(#[source] std::io::Error),
}

impl WorkerError {
    /// Convert into a [`HubError::Process`] for propagation across port
    /// boundaries.
    pub fn into_domain(self) -> HubError {
        HubError::Process(Box::new(self))
    }
}

impl From<WorkerError> for HubError {
    fn from(err: WorkerError) -> Self {
        err.into_domain()
    }
}
