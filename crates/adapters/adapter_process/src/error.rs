//! Process adapter error types.

use hubkit_domain::error::HubError;

/// Errors specific to the process adapter.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// The shell could not be spawned.
    #[error("failed to spawn {command:?}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The kill signal could not be delivered.
    #[error("failed to kill process")]
    Kill(#[source] std::io::Error),
}

impl ProcessError {
    /// Convert into a [`HubError::Process`] for propagation across port
    /// boundaries.
    pub fn into_domain(self) -> HubError {
        HubError::Process(Box::new(self))
    }
}

impl From<ProcessError> for HubError {
    fn from(err: ProcessError) -> Self {
        err.into_domain()
    }
}
