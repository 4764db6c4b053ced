use std::path::PathBuf;

use thiserror::Error;

/// Errors that prevent the scenario from running at all.
#[derive(Debug, Error)]
pub enum Error {
    /// The cluster client has not been built.
    #[error("client binary not found: {} (start the cluster first)", .0.display())]
    MissingClient(PathBuf),

    /// The cluster directory does not exist.
    #[error("cluster directory not found: {}", .0.display())]
    MissingDirectory(PathBuf),
}
