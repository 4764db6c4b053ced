//! Command descriptions and run-to-completion execution.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Error, Result};

/// A program, its arguments and the directory to run it in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    /// The arguments to pass to the program.
    pub args: Vec<String>,

    /// Environment variables to set.
    pub env: HashMap<String, String>,

    /// The program to run.
    pub program: PathBuf,

    /// The working directory for the process.
    pub working_dir: Option<PathBuf>,
}

impl CommandSpec {
    /// Creates a new `CommandSpec`.
    #[must_use]
    pub fn new<P: AsRef<Path>, A: AsRef<OsStr>>(
        program: P,
        args: impl IntoIterator<Item = A>,
    ) -> Self {
        Self {
            args: args
                .into_iter()
                .map(|a| a.as_ref().to_string_lossy().to_string())
                .collect(),
            env: HashMap::new(),
            program: program.as_ref().to_path_buf(),
            working_dir: None,
        }
    }

    /// Sets the working directory for the process.
    #[must_use]
    pub fn with_working_dir<P: AsRef<Path>>(mut self, working_dir: P) -> Self {
        self.working_dir = Some(working_dir.as_ref().to_path_buf());
        self
    }

    /// Sets an environment variable for the process.
    #[must_use]
    pub fn with_env<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Appends arguments.
    #[must_use]
    pub fn with_args<A: AsRef<OsStr>>(mut self, args: impl IntoIterator<Item = A>) -> Self {
        self.args.extend(
            args.into_iter()
                .map(|a| a.as_ref().to_string_lossy().to_string()),
        );
        self
    }

    /// Returns the value following `flag` in the argument list, if any.
    #[must_use]
    pub fn arg_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    pub(crate) fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        if let Some(ref working_dir) = self.working_dir {
            cmd.current_dir(working_dir);
        }

        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        cmd
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured result of a command that ran to completion.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` if the process was terminated by a signal.
    pub code: Option<i32>,

    /// Captured standard error.
    pub stderr: String,

    /// Captured standard output.
    pub stdout: String,
}

impl CommandOutput {
    /// A successful output with the given stdout.
    #[must_use]
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stderr: String::new(),
            stdout: stdout.into(),
        }
    }

    /// A failed output with the given exit code and stderr.
    #[must_use]
    pub fn failure(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stderr: stderr.into(),
            stdout: String::new(),
        }
    }

    /// Whether the command exited with status zero.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.code, Some(0))
    }

    /// The most useful diagnostic text: stderr if present, otherwise stdout.
    #[must_use]
    pub fn diagnostic(&self) -> &str {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim()
        } else {
            stderr
        }
    }
}

/// Runs commands to completion and captures their output.
#[async_trait]
pub trait CommandRunner: Send + Sync + 'static {
    /// Runs `command` and waits for it to exit.
    ///
    /// A nonzero exit is reported through [`CommandOutput::code`], not as an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the process could not be started at all.
    async fn run(&self, command: &CommandSpec) -> Result<CommandOutput>;
}

/// Runs commands as real child processes.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemCommandRunner;

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, command: &CommandSpec) -> Result<CommandOutput> {
        let mut cmd = command.to_command();
        cmd.stdin(Stdio::null());

        debug!("Running command: {}", command);

        let output = cmd.output().await.map_err(|source| Error::Launch {
            command: command.to_string(),
            source,
        })?;

        Ok(CommandOutput {
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }
}
