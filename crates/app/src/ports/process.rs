//! Process port: spawning external shell commands.

use hubkit_domain::error::HubError;
use hubkit_domain::id::Pid;

/// Spawns external services as child processes.
pub trait ProcessSpawner: Send + Sync {
    /// Run `command` through the system shell on behalf of service `name`.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Process`] if the OS refuses to spawn the process.
    fn spawn(&self, name: &str, command: &str) -> Result<Box<dyn ChildProcess>, HubError>;
}

/// Handle on a spawned child process.
pub trait ChildProcess: Send {
    /// OS process id, or `None` once the process has been reaped.
    fn pid(&self) -> Option<Pid>;

    /// Whether the process has not exited yet.
    fn is_alive(&mut self) -> bool;

    /// Ask the OS to terminate the process.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Process`] if the signal cannot be delivered.
    fn kill(&mut self) -> Result<(), HubError>;
}
