//! Stopping a deployment started by [`crate::BootstrapController`].

use tracing::info;
use xlite_process_table::ProcessTable;
use xlite_registry::{ProcessRegistry, RegistryRole};
use xlite_shutdown::{ShutdownController, ShutdownReport};

use crate::config::{NODE_PATTERNS, STORAGE_PATTERNS};
use crate::error::Error;

/// Results of a teardown.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TeardownReport {
    /// Cluster nodes.
    pub nodes: ShutdownReport,

    /// Storage servers, if they were asked to stop.
    pub storage: Option<ShutdownReport>,
}

impl TeardownReport {
    /// Total number of processes ended.
    #[must_use]
    pub fn terminated(&self) -> usize {
        self.nodes.terminated() + self.storage.as_ref().map_or(0, ShutdownReport::terminated)
    }
}

/// Stops the cluster nodes, and the storage servers too when `with_storage` is set.
///
/// # Errors
///
/// Returns an error if a process record cannot be read or deleted.
pub async fn stop_deployment<R, T>(
    shutdown: &ShutdownController<R, T>,
    with_storage: bool,
) -> Result<TeardownReport, Error<R::Error>>
where
    R: ProcessRegistry,
    T: ProcessTable,
{
    info!("Stopping cluster nodes");
    let nodes = shutdown.stop(RegistryRole::Cluster, &NODE_PATTERNS).await?;

    let storage = if with_storage {
        info!("Stopping storage servers");
        Some(shutdown.stop(RegistryRole::Storage, &STORAGE_PATTERNS).await?)
    } else {
        None
    };

    Ok(TeardownReport { nodes, storage })
}
