//! Mock implementation of the process table for testing purposes.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use xlite_process_table::{ProcessEntry, ProcessTable, Signal, SignalError};

const FIRST_PID: u32 = 1000;

#[derive(Debug)]
struct FakeProcess {
    command_line: String,
    ignores_terminate: bool,
    protected: bool,
}

#[derive(Debug)]
struct State {
    next_pid: u32,
    processes: BTreeMap<u32, FakeProcess>,
    signals: Vec<(u32, Signal)>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            next_pid: FIRST_PID,
            processes: BTreeMap::new(),
            signals: Vec::new(),
        }
    }
}

/// Mock process table.
///
/// Processes exist only in memory. A SIGTERM ends them immediately unless they
/// were spawned as stubborn, and SIGKILL always ends them. Clones share state.
#[derive(Clone, Debug, Default)]
pub struct MockProcessTable {
    state: Arc<Mutex<State>>,
}

impl MockProcessTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a process that exits on SIGTERM and returns its PID.
    pub fn spawn(&self, command_line: impl Into<String>) -> u32 {
        self.insert(command_line.into(), false, false)
    }

    /// Adds a process that ignores SIGTERM and only dies to SIGKILL.
    pub fn spawn_stubborn(&self, command_line: impl Into<String>) -> u32 {
        self.insert(command_line.into(), true, false)
    }

    /// Adds a process the caller is not permitted to signal.
    pub fn spawn_protected(&self, command_line: impl Into<String>) -> u32 {
        self.insert(command_line.into(), false, true)
    }

    fn insert(&self, command_line: String, ignores_terminate: bool, protected: bool) -> u32 {
        let mut state = self.state.lock();
        let pid = state.next_pid;
        state.next_pid += 1;
        state.processes.insert(
            pid,
            FakeProcess {
                command_line,
                ignores_terminate,
                protected,
            },
        );
        pid
    }

    /// Every signal successfully delivered, in order.
    #[must_use]
    pub fn signals(&self) -> Vec<(u32, Signal)> {
        self.state.lock().signals.clone()
    }

    /// PIDs of the processes still running.
    #[must_use]
    pub fn live_pids(&self) -> HashSet<u32> {
        self.state.lock().processes.keys().copied().collect()
    }
}

impl ProcessTable for MockProcessTable {
    fn processes(&self) -> Vec<ProcessEntry> {
        self.state
            .lock()
            .processes
            .iter()
            .map(|(pid, process)| ProcessEntry::new(*pid, process.command_line.clone()))
            .collect()
    }

    fn signal(&self, pid: u32, signal: Signal) -> Result<(), SignalError> {
        let mut state = self.state.lock();

        let process = state.processes.get(&pid).ok_or(SignalError::NotFound(pid))?;
        if process.protected {
            return Err(SignalError::AccessDenied(pid));
        }

        let exits = match signal {
            Signal::Kill => true,
            Signal::Terminate => !process.ignores_terminate,
        };

        state.signals.push((pid, signal));
        if exits {
            state.processes.remove(&pid);
        }

        Ok(())
    }

    fn is_alive(&self, pid: u32) -> bool {
        self.state.lock().processes.contains_key(&pid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminate_ends_ordinary_process() {
        let table = MockProcessTable::new();
        let pid = table.spawn("./bin/server -id node1");

        table.signal(pid, Signal::Terminate).unwrap();

        assert!(!table.is_alive(pid));
        assert_eq!(table.signals(), vec![(pid, Signal::Terminate)]);
        assert_eq!(
            table.signal(pid, Signal::Terminate),
            Err(SignalError::NotFound(pid))
        );
    }

    #[test]
    fn test_stubborn_process_needs_kill() {
        let table = MockProcessTable::new();
        let pid = table.spawn_stubborn("vector_xlite_grpc --port 5003");

        table.signal(pid, Signal::Terminate).unwrap();
        assert!(table.is_alive(pid));

        table.signal(pid, Signal::Kill).unwrap();
        assert!(!table.is_alive(pid));
    }

    #[test]
    fn test_protected_process_is_denied() {
        let table = MockProcessTable::new();
        let pid = table.spawn_protected("bin/server");

        assert_eq!(
            table.signal(pid, Signal::Kill),
            Err(SignalError::AccessDenied(pid))
        );
        assert!(table.is_alive(pid));
        assert!(table.signals().is_empty());
    }

    #[test]
    fn test_processes_lists_in_pid_order() {
        let table = MockProcessTable::new();
        let first = table.spawn("a");
        let second = table.spawn("b");

        let pids: Vec<_> = table.processes().iter().map(|p| p.pid).collect();
        assert_eq!(pids, vec![first, second]);
    }
}
