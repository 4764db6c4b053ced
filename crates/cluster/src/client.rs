//! Administrative requests issued through the cluster client binary.

use std::fmt::Write;
use std::path::PathBuf;

use tracing::debug;
use xlite_launcher::{CommandOutput, CommandRunner, CommandSpec, Result};

/// Formats a vector the way the client expects it: `1.0,2.0,3.0`.
#[must_use]
pub fn format_vector(values: &[f32]) -> String {
    let mut out = String::new();
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let _ = write!(out, "{value:?}");
    }
    out
}

/// Thin wrapper over `bin/client` subcommands.
///
/// Every request returns the captured [`CommandOutput`]; interpreting a
/// nonzero exit is up to the caller.
#[derive(Clone, Debug)]
pub struct ClusterClient<C: CommandRunner> {
    binary: PathBuf,
    runner: C,
    working_dir: PathBuf,
}

impl<C: CommandRunner> ClusterClient<C> {
    /// Creates a client that runs `binary` from `working_dir`.
    pub fn new(runner: C, binary: impl Into<PathBuf>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            runner,
            working_dir: working_dir.into(),
        }
    }

    fn command<const N: usize>(&self, subcommand: &str, args: [&str; N]) -> CommandSpec {
        CommandSpec::new(&self.binary, [subcommand])
            .with_args(args)
            .with_working_dir(&self.working_dir)
    }

    async fn run(&self, command: CommandSpec) -> Result<CommandOutput> {
        debug!("Running {}", command);
        self.runner.run(&command).await
    }

    /// Asks the node at `addr` to add `node_id`, reachable at `node_addr`.
    ///
    /// # Errors
    ///
    /// Returns an error if the client binary cannot be run.
    pub async fn join(&self, addr: &str, node_id: &str, node_addr: &str) -> Result<CommandOutput> {
        self.run(self.command(
            "join",
            ["-addr", addr, "-node-id", node_id, "-node-addr", node_addr],
        ))
        .await
    }

    /// Queries cluster status from the node at `addr`.
    ///
    /// # Errors
    ///
    /// Returns an error if the client binary cannot be run.
    pub async fn info(&self, addr: &str) -> Result<CommandOutput> {
        self.run(self.command("info", ["-addr", addr])).await
    }

    /// Creates a collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the client binary cannot be run.
    pub async fn create_collection(
        &self,
        addr: &str,
        name: &str,
        dimension: usize,
        schema: &str,
    ) -> Result<CommandOutput> {
        let dimension = dimension.to_string();
        self.run(self.command(
            "create-collection",
            ["-addr", addr, "-name", name, "-dim", dimension.as_str(), "-schema", schema],
        ))
        .await
    }

    /// Inserts a vector together with the row produced by `query`.
    ///
    /// # Errors
    ///
    /// Returns an error if the client binary cannot be run.
    pub async fn insert(
        &self,
        addr: &str,
        name: &str,
        id: u64,
        vector: &[f32],
        query: &str,
    ) -> Result<CommandOutput> {
        let id = id.to_string();
        let vector = format_vector(vector);
        self.run(self.command(
            "insert",
            [
                "-addr",
                addr,
                "-name",
                name,
                "-id",
                id.as_str(),
                "-vector",
                vector.as_str(),
                "-query",
                query,
            ],
        ))
        .await
    }

    /// Returns the `k` nearest rows to `vector`.
    ///
    /// # Errors
    ///
    /// Returns an error if the client binary cannot be run.
    pub async fn search(
        &self,
        addr: &str,
        name: &str,
        vector: &[f32],
        k: usize,
        query: &str,
    ) -> Result<CommandOutput> {
        let vector = format_vector(vector);
        let k = k.to_string();
        self.run(self.command(
            "search",
            [
                "-addr",
                addr,
                "-name",
                name,
                "-vector",
                vector.as_str(),
                "-k",
                k.as_str(),
                "-query",
                query,
            ],
        ))
        .await
    }

    /// Deletes one vector.
    ///
    /// # Errors
    ///
    /// Returns an error if the client binary cannot be run.
    pub async fn delete(&self, addr: &str, name: &str, id: u64) -> Result<CommandOutput> {
        let id = id.to_string();
        self.run(self.command("delete", ["-addr", addr, "-name", name, "-id", id.as_str()]))
            .await
    }

    /// Drops a collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the client binary cannot be run.
    pub async fn delete_collection(&self, addr: &str, name: &str) -> Result<CommandOutput> {
        self.run(self.command("delete-collection", ["-addr", addr, "-name", name]))
            .await
    }
}
