//! In-memory implementation of the process registry, for tests.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

pub use error::Error;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use xlite_registry::{ProcessRegistry, RegistryRole};

/// In-memory process registry. Clones share the same records.
#[derive(Clone, Debug, Default)]
pub struct MemoryRegistry {
    records: Arc<Mutex<HashMap<RegistryRole, BTreeSet<u32>>>>,
}

impl MemoryRegistry {
    /// Creates a new empty `MemoryRegistry`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a record exists for `role`, including an empty one.
    pub async fn contains(&self, role: RegistryRole) -> bool {
        self.records.lock().await.contains_key(&role)
    }
}

#[async_trait]
impl ProcessRegistry for MemoryRegistry {
    type Error = Error;

    async fn record(&self, role: RegistryRole, pids: &BTreeSet<u32>) -> Result<(), Self::Error> {
        self.records.lock().await.insert(role, pids.clone());
        Ok(())
    }

    async fn read(&self, role: RegistryRole) -> Result<BTreeSet<u32>, Self::Error> {
        Ok(self
            .records
            .lock()
            .await
            .get(&role)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete(&self, role: RegistryRole) -> Result<(), Self::Error> {
        self.records.lock().await.remove(&role);
        Ok(())
    }
}
