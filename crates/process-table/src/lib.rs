//! Inspection and signalling of live processes.
//!
//! [`ProcessTable`] is the capability the shutdown logic depends on: list
//! processes with their command lines, send a signal, and ask whether a PID is
//! still alive. [`SystemProcessTable`] backs it with the real process table.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
mod system;

pub use error::SignalError;
pub use system::SystemProcessTable;

use std::fmt;

/// Signals the shutdown logic sends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Signal {
    /// Forced termination (SIGKILL).
    Kill,

    /// Graceful termination request (SIGTERM).
    Terminate,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kill => write!(f, "SIGKILL"),
            Self::Terminate => write!(f, "SIGTERM"),
        }
    }
}

/// A live process and the command line it was invoked with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessEntry {
    /// Arguments joined with single spaces.
    pub command_line: String,

    /// Process ID.
    pub pid: u32,
}

impl ProcessEntry {
    /// Creates a new `ProcessEntry`.
    pub fn new(pid: u32, command_line: impl Into<String>) -> Self {
        Self {
            command_line: command_line.into(),
            pid,
        }
    }

    /// Whether the command line contains any of `patterns` as a substring.
    #[must_use]
    pub fn matches_any<S: AsRef<str>>(&self, patterns: &[S]) -> bool {
        patterns
            .iter()
            .any(|pattern| self.command_line.contains(pattern.as_ref()))
    }
}

/// A view of the live processes that can also deliver signals.
pub trait ProcessTable: Send + Sync + 'static {
    /// Lists live processes, excluding the caller itself.
    fn processes(&self) -> Vec<ProcessEntry>;

    /// Sends `signal` to `pid`.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::NotFound`] if the process does not exist and
    /// [`SignalError::AccessDenied`] if the caller may not signal it.
    fn signal(&self, pid: u32, signal: Signal) -> Result<(), SignalError>;

    /// Whether `pid` still refers to a running process.
    fn is_alive(&self, pid: u32) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_any_substring() {
        let entry = ProcessEntry::new(10, "./bin/server -id node2 -port 501");

        assert!(entry.matches_any(&["cmd/server/main.go", "bin/server"]));
        assert!(!entry.matches_any(&["vector_xlite_grpc", "standalone/server"]));
        assert!(!entry.matches_any::<&str>(&[]));
    }
}
