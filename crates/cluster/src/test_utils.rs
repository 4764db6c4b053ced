//! Test doubles for driving a cluster start without real binaries.

use std::collections::HashSet;
use std::io;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use xlite_launcher::{
    CommandOutput, CommandRunner, CommandSpec, Error, Launcher, ProcessHandle, Result,
};
use xlite_process_table_mock::MockProcessTable;

/// A spawn request seen by [`RecordingLauncher`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpawnRecord {
    /// What was launched.
    pub command: CommandSpec,

    /// Where its output would have gone.
    pub log_path: PathBuf,

    /// PID handed back.
    pub pid: u32,
}

#[derive(Debug, Default)]
struct LauncherState {
    failing: Vec<String>,
    listeners: Vec<TcpListener>,
    silent_ports: HashSet<u16>,
    spawned: Vec<SpawnRecord>,
}

/// Launcher that registers fake processes in a [`MockProcessTable`].
///
/// When a command carries `--port N`, a listener is bound on `127.0.0.1:N` so
/// readiness probes succeed, unless the port was marked silent.
#[derive(Clone, Debug, Default)]
pub struct RecordingLauncher {
    state: Arc<Mutex<LauncherState>>,
    table: MockProcessTable,
}

impl RecordingLauncher {
    /// Creates a launcher with its own process table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a launcher that registers processes in `table`.
    #[must_use]
    pub fn with_table(table: MockProcessTable) -> Self {
        Self {
            state: Arc::default(),
            table,
        }
    }

    /// Processes launched on `port` never start listening.
    #[must_use]
    pub fn with_silent_port(self, port: u16) -> Self {
        self.state.lock().silent_ports.insert(port);
        self
    }

    /// Launching any command containing `pattern` fails.
    #[must_use]
    pub fn failing_on(self, pattern: impl Into<String>) -> Self {
        self.state.lock().failing.push(pattern.into());
        self
    }

    /// The process table fake processes are registered in.
    #[must_use]
    pub fn table(&self) -> MockProcessTable {
        self.table.clone()
    }

    /// All spawn requests, in order.
    #[must_use]
    pub fn spawned(&self) -> Vec<SpawnRecord> {
        self.state.lock().spawned.clone()
    }

    /// Rendered command lines of all spawn requests, in order.
    #[must_use]
    pub fn commands(&self) -> Vec<String> {
        self.spawned()
            .iter()
            .map(|record| record.command.to_string())
            .collect()
    }

    /// Closes every listener opened on behalf of fake processes.
    pub fn close_listeners(&self) {
        self.state.lock().listeners.clear();
    }
}

#[async_trait]
impl Launcher for RecordingLauncher {
    async fn spawn(&self, command: &CommandSpec, log_path: &Path) -> Result<ProcessHandle> {
        let rendered = command.to_string();
        let mut state = self.state.lock();

        if state.failing.iter().any(|p| rendered.contains(p.as_str())) {
            return Err(Error::Launch {
                command: rendered,
                source: io::Error::new(io::ErrorKind::NotFound, "scripted launch failure"),
            });
        }

        if let Some(port) = command.arg_value("--port").and_then(|p| p.parse::<u16>().ok()) {
            if !state.silent_ports.contains(&port) {
                let listener = TcpListener::bind(("127.0.0.1", port))
                    .map_err(|e| Error::Io("failed to bind fake listener", e))?;
                state.listeners.push(listener);
            }
        }

        let pid = self.table.spawn(rendered.clone());
        state.spawned.push(SpawnRecord {
            command: command.clone(),
            log_path: log_path.to_path_buf(),
            pid,
        });

        Ok(ProcessHandle::new(pid, log_path, rendered))
    }
}

#[derive(Debug, Default)]
struct RunnerState {
    calls: Vec<CommandSpec>,
    rules: Vec<(String, Option<CommandOutput>)>,
}

/// Command runner with canned responses.
///
/// The first rule whose pattern occurs in the rendered command decides the
/// outcome; unmatched commands succeed with empty output.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    state: Arc<Mutex<RunnerState>>,
}

impl ScriptedRunner {
    /// Creates a runner where every command succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands containing `pattern` produce `output`.
    #[must_use]
    pub fn respond(self, pattern: impl Into<String>, output: CommandOutput) -> Self {
        self.state.lock().rules.push((pattern.into(), Some(output)));
        self
    }

    /// Commands containing `pattern` cannot be started.
    #[must_use]
    pub fn unavailable(self, pattern: impl Into<String>) -> Self {
        self.state.lock().rules.push((pattern.into(), None));
        self
    }

    /// Every command run so far.
    #[must_use]
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.state.lock().calls.clone()
    }

    /// Rendered command lines of every command run so far.
    #[must_use]
    pub fn commands(&self) -> Vec<String> {
        self.calls().iter().map(ToString::to_string).collect()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, command: &CommandSpec) -> Result<CommandOutput> {
        let rendered = command.to_string();
        let mut state = self.state.lock();
        state.calls.push(command.clone());

        let rule = state
            .rules
            .iter()
            .find(|(pattern, _)| rendered.contains(pattern.as_str()))
            .map(|(_, output)| output.clone());

        match rule {
            Some(Some(output)) => Ok(output),
            Some(None) => Err(Error::Launch {
                command: rendered,
                source: io::Error::new(io::ErrorKind::NotFound, "scripted launch failure"),
            }),
            None => Ok(CommandOutput::success("")),
        }
    }
}
