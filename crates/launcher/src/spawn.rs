//! Detached process spawning with output redirected to a log file.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, info};

use crate::command::CommandSpec;
use crate::error::{Error, Result};

/// Identity of a process started by a [`Launcher`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessHandle {
    command: String,
    log_path: PathBuf,
    pid: u32,
}

impl ProcessHandle {
    /// Creates a new `ProcessHandle`.
    #[must_use]
    pub fn new(pid: u32, log_path: impl Into<PathBuf>, command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            log_path: log_path.into(),
            pid,
        }
    }

    /// Returns the process ID.
    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    /// Returns the file receiving the process's stdout and stderr.
    #[must_use]
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Returns the rendered command line the process was started with.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }
}

impl fmt::Display for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pid {} ({})", self.pid, self.command)
    }
}

/// Starts long-running processes without waiting for them.
#[async_trait]
pub trait Launcher: Send + Sync + 'static {
    /// Spawns `command`, sending both output streams to `log_path`.
    ///
    /// Returns as soon as the operating system has created the process.
    ///
    /// # Errors
    ///
    /// Returns an error if the log file cannot be created or the process cannot be spawned.
    async fn spawn(&self, command: &CommandSpec, log_path: &Path) -> Result<ProcessHandle>;
}

/// Launches processes in their own process group so they outlive the launcher.
#[derive(Clone, Copy, Debug, Default)]
pub struct DetachedLauncher;

#[async_trait]
impl Launcher for DetachedLauncher {
    async fn spawn(&self, command: &CommandSpec, log_path: &Path) -> Result<ProcessHandle> {
        if let Some(parent) = log_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| Error::LogFile {
                    path: log_path.to_path_buf(),
                    source,
                })?;
        }

        // Both handles are closed when this function returns, whatever the outcome.
        let stdout = fs::File::create(log_path)
            .await
            .map_err(|source| Error::LogFile {
                path: log_path.to_path_buf(),
                source,
            })?
            .into_std()
            .await;
        let stderr = stdout.try_clone().map_err(|source| Error::LogFile {
            path: log_path.to_path_buf(),
            source,
        })?;

        let mut cmd = command.to_command();
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::from(stdout));
        cmd.stderr(Stdio::from(stderr));
        cmd.kill_on_drop(false);

        #[cfg(unix)]
        cmd.process_group(0);

        debug!("Spawning process: {:?}", cmd);

        let child = cmd.spawn().map_err(|source| Error::Launch {
            command: command.to_string(),
            source,
        })?;

        let pid = child
            .id()
            .ok_or_else(|| Error::MissingPid(command.to_string()))?;

        info!(
            "Started `{}` with PID {} (log: {})",
            command,
            pid,
            log_path.display()
        );

        Ok(ProcessHandle::new(pid, log_path, command.to_string()))
    }
}
