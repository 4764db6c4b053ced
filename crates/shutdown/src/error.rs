use thiserror::Error;
use xlite_registry::RegistryError;

/// Errors that can occur while stopping processes.
#[derive(Debug, Error)]
pub enum Error<RE: RegistryError> {
    /// The process record could not be read or removed.
    #[error("registry error: {0}")]
    Registry(#[source] RE),
}
