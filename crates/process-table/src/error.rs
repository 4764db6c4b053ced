//! Error types for signalling processes.

use thiserror::Error;

/// Errors that can occur while signalling a process.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SignalError {
    /// The caller lacks permission to signal the process.
    #[error("access denied to process {0}")]
    AccessDenied(u32),

    /// No process with that identity exists.
    #[error("process {0} not found")]
    NotFound(u32),

    /// Any other failure reported by the operating system.
    #[error("failed to signal process {0}: {1}")]
    Other(u32, String),
}
