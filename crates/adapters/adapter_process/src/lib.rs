//! # hubkit-adapter-process
//!
//! Process adapter: runs external services as shell commands.
//!
//! ## Responsibilities
//! - Implement the `ProcessSpawner` / `ChildProcess` ports
//! - Run each command through `sh -c`, killed when its handle is dropped
//! - Forward the child's stdout and stderr into `tracing`
//!
//! ## Dependency rule
//! Same as other adapters: depends on `hubkit-app` and `hubkit-domain`.

pub mod error;

use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use hubkit_app::ports::{ChildProcess, ProcessSpawner};
use hubkit_domain::error::HubError;
use hubkit_domain::id::Pid;

use crate::error::ProcessError;

const SHELL: &str = "sh";

/// Spawns commands through the system shell.
#[derive(Debug, Clone)]
pub struct ShellSpawner {
    runtime: Handle,
}

impl ShellSpawner {
    /// Create a spawner whose children are reaped and logged on `runtime`.
    #[must_use]
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }
}

impl ProcessSpawner for ShellSpawner {
    #[tracing::instrument(skip(self))]
    fn spawn(&self, name: &str, command: &str) -> Result<Box<dyn ChildProcess>, HubError> {
        let _runtime = self.runtime.enter();
        let mut child = Command::new(SHELL)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                command: command.to_string(),
                source,
            })?;

        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(tokio::spawn(log_lines(name.to_string(), stdout, false)));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(tokio::spawn(log_lines(name.to_string(), stderr, true)));
        }

        let pid = child.id().map(Pid::new);
        tracing::info!(?pid, "process spawned");
        Ok(Box::new(ShellChild { child, readers }))
    }
}

async fn log_lines<R>(service: String, stream: R, is_stderr: bool)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if is_stderr => tracing::error!(%service, "{line}"),
            Ok(Some(line)) => tracing::debug!(%service, "{line}"),
            Ok(None) => break,
            Err(err) => {
                tracing::warn!(%service, error = %err, "could not read process output");
                break;
            }
        }
    }
}

/// A child spawned by [`ShellSpawner`]. Dropping it kills the process.
#[derive(Debug)]
pub struct ShellChild {
    child: Child,
    readers: Vec<JoinHandle<()>>,
}

impl ChildProcess for ShellChild {
    fn pid(&self) -> Option<Pid> {
        self.child.id().map(Pid::new)
    }

    fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    fn kill(&mut self) -> Result<(), HubError> {
        if !self.is_alive() {
            return Ok(());
        }
        self.child.start_kill().map_err(ProcessError::Kill)?;
        tracing::debug!("kill signal sent");
        Ok(())
    }
}

impl Drop for ShellChild {
    fn drop(&mut self) {
        for reader in &self.readers {
            reader.abort();
        }
    }
}
