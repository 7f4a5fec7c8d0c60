//! Service: lifecycle states and execution modes of a long-running service.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ServiceStatus {
    #[default]
    Stopped = 0,
    Running = 1,
}

pub const STOPPED: ServiceStatus = ServiceStatus::Stopped;
pub const RUNNING: ServiceStatus = ServiceStatus::Running;

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => f.write_str("stopped"),
            Self::Running => f.write_str("running"),
        }
    }
}

/// Where a service's work executes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceMode {
    /// In-process, on the host runtime.
    #[default]
    Classic,
    /// In an isolated worker managed by a worker pool.
    Threaded,
    /// In a child OS process running a shell command.
    External,
}

pub const SERVICE_MODE_CLASSIC: ServiceMode = ServiceMode::Classic;
pub const SERVICE_MODE_THREADED: ServiceMode = ServiceMode::Threaded;
pub const SERVICE_MODE_EXTERNAL: ServiceMode = ServiceMode::External;

impl fmt::Display for ServiceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Classic => f.write_str("classic"),
            Self::Threaded => f.write_str("threaded"),
            Self::External => f.write_str("external"),
        }
    }
}
