//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into [`HubError`]
//! via `#[from]`. The `ERROR_*` constants are the stable messages plugins
//! match on.

/// Message of [`UnknownIdentifierError`], followed by the identifier.
pub const ERROR_UNKNOWN_IDENTIFIER: &str = "Unknown thread identifier";
/// Message of [`MarshalingError`], followed by the task name.
pub const ERROR_STRINGIFY_FUNCTION_THREAD: &str = "Unknown worker task";
/// Message of [`ConfigurationError::UndefinedThreadsManager`].
pub const ERROR_UNDEFINED_THREADS_MANAGER: &str = "Undefined threads manager";
/// Message of [`ConfigurationError::ExternalCommandUndefined`].
pub const ERROR_EXTERNAL_COMMAND_UNDEF: &str = "Undefined external command";

/// Top-level error type shared by every hubkit crate.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// A service was started without the collaborators its mode needs.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// A worker handler could not be resolved for isolated execution.
    #[error(transparent)]
    Marshaling(#[from] MarshalingError),

    /// A worker identifier is unknown or no longer alive.
    #[error(transparent)]
    UnknownIdentifier(#[from] UnknownIdentifierError),

    #[error("validation error")]
    Validation(#[from] ValidationError),

    /// The service or worker is already running.
    #[error("{name} is already running")]
    AlreadyRunning { name: String },

    /// An OS-level process or thread operation failed.
    #[error("process error")]
    Process(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Missing collaborators detected when a service starts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    /// A threaded service has no worker pool bound.
    #[error("{}", ERROR_UNDEFINED_THREADS_MANAGER)]
    UndefinedThreadsManager,

    /// An external service has no (or an empty) command bound.
    #[error("{}", ERROR_EXTERNAL_COMMAND_UNDEF)]
    ExternalCommandUndefined,

    /// An external service has no process spawner bound.
    #[error("Undefined process spawner")]
    UndefinedProcessSpawner,
}

/// The named worker task is not present in the task registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{prefix} {task}", prefix = ERROR_STRINGIFY_FUNCTION_THREAD)]
pub struct MarshalingError {
    pub task: String,
}

/// A worker identifier that is not registered or whose worker is dead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{prefix} {identifier}", prefix = ERROR_UNKNOWN_IDENTIFIER)]
pub struct UnknownIdentifierError {
    pub identifier: String,
}

/// Domain invariant violations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    /// A schedule field is neither `*`, an integer, nor `*/N`.
    #[error("invalid {field} pattern {value:?}")]
    InvalidPattern { field: &'static str, value: String },

    /// An exact schedule value exceeds the field range.
    #[error("{field} value {value} is out of range (max {max})")]
    OutOfRange {
        field: &'static str,
        value: u32,
        max: u32,
    },

    /// A `*/0` stride.
    #[error("{field} stride must be greater than zero")]
    ZeroStride { field: &'static str },
}
