//! Process table backed by the operating system.

use nix::errno::Errno;
use nix::sys::signal::{self, Signal as NixSignal};
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;
use sysinfo::{ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System, UpdateKind};
use tracing::{debug, warn};

use crate::{ProcessEntry, ProcessTable, Signal, SignalError};

/// The real process table.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemProcessTable;

impl SystemProcessTable {
    /// Creates a new `SystemProcessTable`.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Reaps `pid` if it is an exited child of the current process.
    ///
    /// Returns `Some(false)` if it was reaped, `Some(true)` if it is a child that is
    /// still running, and `None` if it is not a child of ours.
    fn reap_child(pid: Pid) -> Option<bool> {
        match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => Some(true),
            Ok(status) => {
                debug!("Reaped child {}: {:?}", pid, status);
                Some(false)
            }
            Err(_) => None,
        }
    }
}

fn to_pid(pid: u32) -> Option<Pid> {
    i32::try_from(pid).ok().filter(|p| *p > 0).map(Pid::from_raw)
}

impl ProcessTable for SystemProcessTable {
    fn processes(&self) -> Vec<ProcessEntry> {
        let mut system = System::new();
        system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing().with_cmd(UpdateKind::Always),
        );

        let own_pid = std::process::id();

        let mut entries: Vec<_> = system
            .processes()
            .iter()
            .filter(|(pid, _)| pid.as_u32() != own_pid)
            .filter(|(_, process)| process.status() != ProcessStatus::Zombie)
            .filter_map(|(pid, process)| {
                let command_line = process
                    .cmd()
                    .iter()
                    .map(|arg| arg.to_string_lossy())
                    .collect::<Vec<_>>()
                    .join(" ");

                if command_line.is_empty() {
                    None
                } else {
                    Some(ProcessEntry::new(pid.as_u32(), command_line))
                }
            })
            .collect();

        entries.sort_by_key(|entry| entry.pid);
        entries
    }

    fn signal(&self, pid: u32, signal: Signal) -> Result<(), SignalError> {
        let target = to_pid(pid).ok_or(SignalError::NotFound(pid))?;
        let nix_signal = match signal {
            Signal::Kill => NixSignal::SIGKILL,
            Signal::Terminate => NixSignal::SIGTERM,
        };

        match signal::kill(target, nix_signal) {
            Ok(()) => Ok(()),
            Err(Errno::ESRCH) => Err(SignalError::NotFound(pid)),
            Err(Errno::EPERM) => Err(SignalError::AccessDenied(pid)),
            Err(e) => Err(SignalError::Other(pid, e.to_string())),
        }
    }

    fn is_alive(&self, pid: u32) -> bool {
        let Some(target) = to_pid(pid) else {
            return false;
        };

        if let Some(alive) = Self::reap_child(target) {
            return alive;
        }

        match signal::kill(target, None::<NixSignal>) {
            Ok(()) => true,
            Err(Errno::ESRCH) => false,
            // Exists, but belongs to someone else.
            Err(Errno::EPERM) => true,
            Err(e) => {
                warn!("Error checking process {}: {}", pid, e);
                false
            }
        }
    }
}
