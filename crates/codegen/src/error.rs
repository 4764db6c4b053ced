use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for code generation.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while generating code.
#[derive(Debug, Error)]
pub enum Error {
    /// The compiler exited nonzero.
    #[error("protoc failed for {} (exit code {code:?}): {diagnostic}", .schema.display())]
    Compiler {
        /// Schema being compiled.
        schema: PathBuf,

        /// Exit code.
        code: Option<i32>,

        /// Captured compiler output.
        diagnostic: String,
    },

    /// IO error.
    #[error("{0}: {1}")]
    Io(&'static str, #[source] io::Error),

    /// The compiler could not be started.
    #[error(transparent)]
    Launch(#[from] xlite_launcher::Error),

    /// The schema file does not exist.
    #[error("schema not found: {}", .0.display())]
    MissingSchema(PathBuf),

    /// The compiler is not installed.
    #[error("protoc not found: {0}")]
    ProtocNotFound(String),
}
