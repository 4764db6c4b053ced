use std::path::PathBuf;

use thiserror::Error;
use xlite_registry::RegistryError;

/// Problems with a node layout.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TopologyError {
    /// The first node is not the bootstrap node.
    #[error("bootstrap node must come first, found {0} first")]
    BootstrapNotFirst(String),

    /// Two nodes share an id.
    #[error("duplicate node id {0}")]
    DuplicateId(String),

    /// No nodes at all.
    #[error("topology has no nodes")]
    Empty,

    /// More than one node is flagged as bootstrap.
    #[error("exactly one bootstrap node required, found {0}")]
    MultipleBootstrap(usize),

    /// No node is flagged as bootstrap.
    #[error("no bootstrap node")]
    NoBootstrap,
}

/// Errors that abort a cluster start or stop.
#[derive(Debug, Error)]
pub enum Error<RE: RegistryError> {
    /// A build step exited nonzero.
    #[error("building {target} failed (exit code {code:?}): {diagnostic}")]
    Build {
        /// What was being built.
        target: String,

        /// Exit code of the build tool.
        code: Option<i32>,

        /// Captured build output.
        diagnostic: String,
    },

    /// Start was cancelled between phases.
    #[error("interrupted")]
    Interrupted,

    /// Filesystem operation failed.
    #[error("{0}: {1}")]
    Io(&'static str, #[source] std::io::Error),

    /// A process could not be started.
    #[error(transparent)]
    Launch(#[from] xlite_launcher::Error),

    /// A required directory does not exist.
    #[error("directory not found: {}", .0.display())]
    MissingDirectory(PathBuf),

    /// A dependency did not accept connections in time.
    #[error("{host}:{port} not ready, see {}", log_path.display())]
    ProbeTimeout {
        /// Host that was probed.
        host: String,

        /// Port that was probed.
        port: u16,

        /// Log file of the process expected to listen there.
        log_path: PathBuf,
    },

    /// Reading or writing a process record failed.
    #[error("registry error: {0}")]
    Registry(#[source] RE),

    /// Stopping processes failed.
    #[error(transparent)]
    Shutdown(#[from] xlite_shutdown::Error<RE>),

    /// The node layout is invalid.
    #[error(transparent)]
    Topology(#[from] TopologyError),
}
