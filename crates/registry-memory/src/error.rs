use thiserror::Error;
use xlite_registry::RegistryError;

/// Errors that can occur in this crate.
#[derive(Clone, Debug, Error)]
#[error("registry error")]
pub struct Error;

impl RegistryError for Error {}
