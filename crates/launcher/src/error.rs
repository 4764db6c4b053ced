//! Error types for launching and running external commands.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for launcher operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while launching or running external commands.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error.
    #[error("io error: {0} - {1}")]
    Io(&'static str, #[source] io::Error),

    /// The log file for a detached process could not be prepared.
    #[error("failed to prepare log file {}: {source}", .path.display())]
    LogFile {
        /// Log file path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The operating system refused to create the process.
    #[error("failed to launch `{command}`: {source}")]
    Launch {
        /// Rendered command line.
        command: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The process was created but no identity was reported for it.
    #[error("no pid available for spawned process `{0}`")]
    MissingPid(String),
}
