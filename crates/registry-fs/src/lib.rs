//! Implementation of the process registry using files on disk.
//!
//! Each role is a plain text file in the registry directory holding one PID per
//! line, so it can be inspected (or repaired) by hand.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

pub use error::Error;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::{self, AsyncWriteExt};
use tracing::{debug, warn};
use xlite_registry::{ProcessRegistry, RegistryRole, decode, encode};

/// Process registry using files on disk.
#[derive(Clone, Debug)]
pub struct FsRegistry {
    dir: PathBuf,
}

impl FsRegistry {
    /// Creates a new `FsRegistry` rooted at the specified directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the record file for `role`.
    #[must_use]
    pub fn path(&self, role: RegistryRole) -> PathBuf {
        self.dir.join(role.file_name())
    }
}

#[async_trait]
impl ProcessRegistry for FsRegistry {
    type Error = Error;

    async fn record(&self, role: RegistryRole, pids: &BTreeSet<u32>) -> Result<(), Self::Error> {
        record(pids, &self.path(role)).await
    }

    async fn read(&self, role: RegistryRole) -> Result<BTreeSet<u32>, Self::Error> {
        read(&self.path(role)).await
    }

    async fn delete(&self, role: RegistryRole) -> Result<(), Self::Error> {
        delete(&self.path(role)).await
    }
}

/// Writes `pids` to `path`, replacing any previous content.
///
/// The content is written to a sibling file first and renamed into place, so a
/// reader sees either the old record or the new one.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub async fn record(pids: &BTreeSet<u32>, path: &Path) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::Io("error creating registry directory", e))?;
        }
    }

    let staging = staging_path(path);
    let mut file = fs::File::create(&staging)
        .await
        .map_err(|e| Error::Io("error creating registry file", e))?;
    file.write_all(encode(pids).as_bytes())
        .await
        .map_err(|e| Error::Io("error writing registry file", e))?;
    file.sync_all()
        .await
        .map_err(|e| Error::Io("error syncing registry file", e))?;
    drop(file);

    fs::rename(&staging, path)
        .await
        .map_err(|e| Error::Io("error replacing registry file", e))?;

    debug!("Recorded {} PID(s) in {}", pids.len(), path.display());

    Ok(())
}

/// Reads the PIDs stored at `path`.
///
/// A missing file is an empty set. Lines that are not positive integers are
/// skipped with a warning.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read.
pub async fn read(path: &Path) -> Result<BTreeSet<u32>, Error> {
    let text = match fs::read(path).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(ref e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeSet::new()),
        Err(e) => return Err(Error::Io("error reading registry file", e)),
    };

    let decoded = decode(&text);
    for malformed in &decoded.malformed {
        warn!(
            "Skipping malformed line {} in {}: {:?}",
            malformed.line,
            path.display(),
            malformed.content
        );
    }

    Ok(decoded.pids)
}

/// Removes the record at `path`. Removing a missing record succeeds.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be removed.
pub async fn delete(path: &Path) -> Result<(), Error> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(ref e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Io("error deleting registry file", e)),
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::tempdir;

    #[tokio::test]
    async fn test_record_and_read() {
        let dir = tempdir().unwrap();
        let registry = FsRegistry::new(dir.path());
        let pids = BTreeSet::from([4242, 17, 9000]);

        registry.record(RegistryRole::Cluster, &pids).await.unwrap();
        let result = registry.read(RegistryRole::Cluster).await.unwrap();

        assert_eq!(result, pids);
    }

    #[tokio::test]
    async fn test_read_missing_record() {
        let dir = tempdir().unwrap();
        let registry = FsRegistry::new(dir.path());

        let result = registry.read(RegistryRole::Storage).await.unwrap();

        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_record_replaces_previous_content() {
        let dir = tempdir().unwrap();
        let registry = FsRegistry::new(dir.path());

        registry
            .record(RegistryRole::Storage, &BTreeSet::from([1, 2, 3]))
            .await
            .unwrap();
        registry
            .record(RegistryRole::Storage, &BTreeSet::from([10]))
            .await
            .unwrap();

        let result = registry.read(RegistryRole::Storage).await.unwrap();
        assert_eq!(result, BTreeSet::from([10]));
        assert!(!staging_path(&registry.path(RegistryRole::Storage)).exists());
    }

    #[tokio::test]
    async fn test_roles_are_independent() {
        let dir = tempdir().unwrap();
        let registry = FsRegistry::new(dir.path());

        registry
            .record(RegistryRole::Storage, &BTreeSet::from([100]))
            .await
            .unwrap();
        registry
            .record(RegistryRole::Cluster, &BTreeSet::from([200]))
            .await
            .unwrap();
        registry.delete(RegistryRole::Cluster).await.unwrap();

        assert_eq!(
            registry.read(RegistryRole::Storage).await.unwrap(),
            BTreeSet::from([100])
        );
        assert!(registry.read(RegistryRole::Cluster).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let dir = tempdir().unwrap();
        let registry = FsRegistry::new(dir.path());

        registry
            .record(RegistryRole::Cluster, &BTreeSet::from([5]))
            .await
            .unwrap();
        registry.delete(RegistryRole::Cluster).await.unwrap();
        registry.delete(RegistryRole::Cluster).await.unwrap();

        assert!(!registry.path(RegistryRole::Cluster).exists());
    }
}
