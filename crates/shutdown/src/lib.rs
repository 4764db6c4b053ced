//! Graceful-then-forced shutdown of tracked processes.
//!
//! [`ShutdownController::stop`] prefers the PIDs persisted in the registry for a
//! role. When that record is missing or empty it falls back to scanning the live
//! process table for command lines containing any of the given patterns.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

pub use error::Error;

use std::fmt;
use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};
use xlite_process_table::{ProcessTable, Signal, SignalError};
use xlite_registry::{ProcessRegistry, RegistryRole};

/// How long a process gets to exit after SIGTERM before it is killed.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// How often liveness is re-checked during the grace period.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// What happened to a single process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Termination {
    /// Exited within the grace period after SIGTERM.
    Terminated,

    /// Ignored SIGTERM and was killed.
    Killed,

    /// Was already gone.
    NotRunning,

    /// The caller may not signal it.
    AccessDenied,

    /// Signalling failed for another reason.
    Failed(String),
}

impl Termination {
    /// Whether this call actually ended the process.
    #[must_use]
    pub const fn stopped(&self) -> bool {
        matches!(self, Self::Terminated | Self::Killed)
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Terminated => write!(f, "terminated"),
            Self::Killed => write!(f, "killed"),
            Self::NotRunning => write!(f, "not running"),
            Self::AccessDenied => write!(f, "access denied"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Where the targeted PIDs came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShutdownSource {
    /// The persisted record for the role.
    Registry,

    /// Pattern matching over the live process table.
    ProcessScan,
}

/// Outcome of stopping one role.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Per-process results, in the order the processes were handled.
    pub outcomes: Vec<(u32, Termination)>,

    /// The role that was stopped.
    pub role: RegistryRole,

    /// Where the PIDs came from.
    pub source: ShutdownSource,
}

impl ShutdownReport {
    /// Number of processes this run actually ended.
    #[must_use]
    pub fn terminated(&self) -> usize {
        self.outcomes.iter().filter(|(_, t)| t.stopped()).count()
    }

    /// Outcomes that deserve the operator's attention.
    pub fn warnings(&self) -> impl Iterator<Item = &(u32, Termination)> {
        self.outcomes
            .iter()
            .filter(|(_, t)| matches!(t, Termination::AccessDenied | Termination::Failed(_)))
    }
}

/// Stops the processes of a role.
#[derive(Clone, Debug)]
pub struct ShutdownController<R, T>
where
    R: ProcessRegistry,
    T: ProcessTable,
{
    grace_period: Duration,
    poll_interval: Duration,
    registry: R,
    table: T,
}

impl<R, T> ShutdownController<R, T>
where
    R: ProcessRegistry,
    T: ProcessTable,
{
    /// Creates a controller with the default grace period.
    pub const fn new(registry: R, table: T) -> Self {
        Self {
            grace_period: DEFAULT_GRACE_PERIOD,
            poll_interval: DEFAULT_POLL_INTERVAL,
            registry,
            table,
        }
    }

    /// Sets how long to wait after SIGTERM before sending SIGKILL.
    #[must_use]
    pub const fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Sets the liveness polling interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Stops every process of `role`.
    ///
    /// Uses the persisted record when it holds any PIDs and deletes it once each
    /// of them has been signalled. Otherwise terminates live processes whose
    /// command line contains one of `patterns`. Running this again once nothing is
    /// left succeeds with zero terminations.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be read or the record cannot be
    /// deleted. Per-process failures are reported in the [`ShutdownReport`].
    pub async fn stop<S: AsRef<str>>(
        &self,
        role: RegistryRole,
        patterns: &[S],
    ) -> Result<ShutdownReport, Error<R::Error>> {
        let recorded = self.registry.read(role).await.map_err(Error::Registry)?;

        let (source, pids): (_, Vec<u32>) = if recorded.is_empty() {
            let matches = self
                .table
                .processes()
                .into_iter()
                .filter(|entry| entry.matches_any(patterns))
                .map(|entry| {
                    debug!("{} matched: {} ({})", role, entry.pid, entry.command_line);
                    entry.pid
                })
                .collect();

            info!("No {} record, scanning process table", role);
            (ShutdownSource::ProcessScan, matches)
        } else {
            info!("Stopping {} {} process(es) from record", recorded.len(), role);
            (ShutdownSource::Registry, recorded.into_iter().collect())
        };

        let mut outcomes = Vec::with_capacity(pids.len());
        for pid in pids {
            let termination = self.terminate(pid).await;
            match &termination {
                Termination::AccessDenied | Termination::Failed(_) => {
                    warn!("Could not stop {} process {}: {}", role, pid, termination);
                }
                _ => info!("{} process {}: {}", role, pid, termination),
            }
            outcomes.push((pid, termination));
        }

        self.registry.delete(role).await.map_err(Error::Registry)?;

        let report = ShutdownReport {
            outcomes,
            role,
            source,
        };
        info!("Stopped {} {} process(es)", report.terminated(), role);

        Ok(report)
    }

    /// Sends SIGTERM to `pid`, waits up to the grace period, then sends SIGKILL.
    pub async fn terminate(&self, pid: u32) -> Termination {
        match self.table.signal(pid, Signal::Terminate) {
            Ok(()) => {}
            Err(e) => return Self::classify(e),
        }

        if self.wait_for_exit(pid, self.grace_period).await {
            return Termination::Terminated;
        }

        debug!("Process {} outlived the grace period, sending {}", pid, Signal::Kill);
        match self.table.signal(pid, Signal::Kill) {
            Ok(()) => {
                self.wait_for_exit(pid, self.poll_interval).await;
                Termination::Killed
            }
            // Exited between the last check and the kill.
            Err(SignalError::NotFound(_)) => Termination::Terminated,
            Err(e) => Self::classify(e),
        }
    }

    async fn wait_for_exit(&self, pid: u32, limit: Duration) -> bool {
        let deadline = Instant::now() + limit;

        loop {
            if !self.table.is_alive(pid) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            sleep(self.poll_interval).await;
        }
    }

    fn classify(error: SignalError) -> Termination {
        match error {
            SignalError::NotFound(_) => Termination::NotRunning,
            SignalError::AccessDenied(_) => Termination::AccessDenied,
            SignalError::Other(_, reason) => Termination::Failed(reason),
        }
    }
}
