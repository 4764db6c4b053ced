//! Functional smoke test of a running cluster.
//!
//! [`OperationsHarness`] drives a fixed scenario through the cluster client:
//! status, collection creation, inserts, searches on the leader and on a
//! follower, a write sent to a follower, a delete and finally dropping the
//! collection. Every step runs even if an earlier one failed.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

pub use error::Error;

use std::path::Path;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};
use xlite_cluster::{ClusterClient, ClusterTopology};
use xlite_launcher::{CommandOutput, CommandRunner};

/// Collection created by the scenario.
pub const COLLECTION: &str = "users";

/// Vector dimension of [`COLLECTION`].
pub const DIMENSION: usize = 4;

/// Schema of [`COLLECTION`].
pub const SCHEMA: &str = "create table users (rowid integer primary key, name text, age integer)";

/// Query used by the search steps.
pub const SEARCH_QUERY: &str = "select rowid, name, age from users";

/// Default wait between the inserts and the searches.
pub const DEFAULT_REPLICATION_WAIT: Duration = Duration::from_secs(3);

const ROWS: [(u64, [f32; DIMENSION], &str); 3] = [
    (
        1,
        [1.0, 2.0, 3.0, 4.0],
        "insert into users(name, age) values ('Alice', 25)",
    ),
    (
        2,
        [2.0, 3.0, 4.0, 5.0],
        "insert into users(name, age) values ('Bob', 30)",
    ),
    (
        3,
        [1.5, 2.5, 3.5, 4.5],
        "insert into users(name, age) values ('Charlie', 28)",
    ),
];

const FOLLOWER_ROW: (u64, [f32; DIMENSION], &str) = (
    4,
    [3.0, 4.0, 5.0, 6.0],
    "insert into users(name, age) values ('Dave', 35)",
);

const SEARCH_VECTOR: [f32; DIMENSION] = [1.0, 2.0, 3.0, 4.0];

/// Result of one scenario step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepResult {
    /// Diagnostic or output shown to the operator.
    pub detail: String,

    /// Step name.
    pub name: &'static str,

    /// Whether the step passed.
    pub passed: bool,
}

/// Results of the whole scenario.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HarnessReport {
    /// Step results, in execution order.
    pub steps: Vec<StepResult>,
}

impl HarnessReport {
    /// Whether every step passed.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.steps.iter().all(|step| step.passed)
    }

    /// Steps that failed.
    pub fn failures(&self) -> impl Iterator<Item = &StepResult> {
        self.steps.iter().filter(|step| !step.passed)
    }
}

/// Fails unless `cluster_dir` exists and holds the client binary.
///
/// # Errors
///
/// Returns an error naming whichever is missing.
pub fn check_client_binary(cluster_dir: &Path, client_binary: &Path) -> Result<(), Error> {
    if !cluster_dir.is_dir() {
        return Err(Error::MissingDirectory(cluster_dir.to_path_buf()));
    }

    let path = cluster_dir.join(client_binary);
    if path.is_file() {
        Ok(())
    } else {
        Err(Error::MissingClient(path))
    }
}

/// Whether a failed follower write was turned away in favour of the leader.
fn is_leader_redirect(output: &CommandOutput) -> bool {
    let text = format!("{} {}", output.stdout, output.stderr).to_lowercase();
    text.contains("redirect") || text.contains("leader")
}

/// Runs the operations scenario against a cluster.
pub struct OperationsHarness<C: CommandRunner> {
    client: ClusterClient<C>,
    follower_addr: String,
    leader_addr: String,
    replication_wait: Duration,
}

impl<C: CommandRunner> OperationsHarness<C> {
    /// Targets the bootstrap node of `topology` as leader and its first
    /// follower for the follower steps.
    pub fn new(client: ClusterClient<C>, topology: &ClusterTopology) -> Self {
        let leader = topology.bootstrap();
        let follower = topology.followers().first().unwrap_or(leader);

        Self {
            client,
            follower_addr: follower.admin_addr(),
            leader_addr: leader.admin_addr(),
            replication_wait: DEFAULT_REPLICATION_WAIT,
        }
    }

    /// Sets the wait between the inserts and the searches.
    #[must_use]
    pub const fn with_replication_wait(mut self, wait: Duration) -> Self {
        self.replication_wait = wait;
        self
    }

    /// Runs every step and collects the results.
    pub async fn run(&self) -> HarnessReport {
        let mut report = HarnessReport::default();
        let leader = self.leader_addr.as_str();
        let follower = self.follower_addr.as_str();

        let result = self.client.info(leader).await;
        report.steps.push(Self::expect_success("cluster info", result));

        let result = self
            .client
            .create_collection(leader, COLLECTION, DIMENSION, SCHEMA)
            .await;
        report.steps.push(Self::expect_success("create collection", result));

        report.steps.push(self.insert_rows(leader).await);

        info!("Waiting {:?} for replication", self.replication_wait);
        sleep(self.replication_wait).await;

        let result = self
            .client
            .search(leader, COLLECTION, &SEARCH_VECTOR, ROWS.len(), SEARCH_QUERY)
            .await;
        report.steps.push(Self::expect_success("search on leader", result));

        let result = self
            .client
            .search(follower, COLLECTION, &SEARCH_VECTOR, ROWS.len(), SEARCH_QUERY)
            .await;
        report.steps.push(Self::expect_success("search on follower", result));

        report.steps.push(self.write_on_follower(follower).await);

        let result = self.client.delete(leader, COLLECTION, ROWS[0].0).await;
        report.steps.push(Self::expect_success("delete vector", result));

        let result = self.client.delete_collection(leader, COLLECTION).await;
        report.steps.push(Self::expect_success("delete collection", result));

        for step in &report.steps {
            if step.passed {
                info!("PASS {}", step.name);
            } else {
                warn!("FAIL {}: {}", step.name, step.detail);
            }
        }

        report
    }

    async fn insert_rows(&self, addr: &str) -> StepResult {
        let mut failures = Vec::new();

        for (id, vector, query) in &ROWS {
            match self.client.insert(addr, COLLECTION, *id, vector, query).await {
                Ok(output) if output.is_success() => info!("Inserted vector {}", id),
                Ok(output) => failures.push(format!("{id}: {}", output.diagnostic())),
                Err(e) => failures.push(format!("{id}: {e}")),
            }
        }

        StepResult {
            detail: if failures.is_empty() {
                format!("inserted {} vectors", ROWS.len())
            } else {
                failures.join("; ")
            },
            name: "insert vectors",
            passed: failures.is_empty(),
        }
    }

    async fn write_on_follower(&self, addr: &str) -> StepResult {
        let (id, vector, query) = FOLLOWER_ROW;
        let name = "write on follower";

        match self.client.insert(addr, COLLECTION, id, &vector, query).await {
            Ok(output) if output.is_success() => StepResult {
                detail: output.stdout,
                name,
                passed: true,
            },
            Ok(output) if is_leader_redirect(&output) => StepResult {
                detail: format!("redirected to leader: {}", output.diagnostic()),
                name,
                passed: true,
            },
            Ok(output) => StepResult {
                detail: output.diagnostic().to_string(),
                name,
                passed: false,
            },
            Err(e) => StepResult {
                detail: e.to_string(),
                name,
                passed: false,
            },
        }
    }

    fn expect_success(
        name: &'static str,
        result: xlite_launcher::Result<CommandOutput>,
    ) -> StepResult {
        match result {
            Ok(output) if output.is_success() => StepResult {
                detail: output.stdout,
                name,
                passed: true,
            },
            Ok(output) => StepResult {
                detail: output.diagnostic().to_string(),
                name,
                passed: false,
            },
            Err(e) => StepResult {
                detail: e.to_string(),
                name,
                passed: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_matches::assert_matches;
    use xlite_cluster::test_utils::ScriptedRunner;

    fn harness(runner: ScriptedRunner) -> OperationsHarness<ScriptedRunner> {
        OperationsHarness::new(
            ClusterClient::new(runner, "./bin/client", "."),
            &ClusterTopology::standard(),
        )
        .with_replication_wait(Duration::ZERO)
    }

    fn step<'a>(report: &'a HarnessReport, name: &str) -> &'a StepResult {
        report.steps.iter().find(|s| s.name == name).unwrap()
    }

    #[tokio::test]
    async fn test_all_steps_pass() {
        let runner = ScriptedRunner::new();
        let report = harness(runner.clone()).run().await;

        assert!(report.all_passed());
        let names: Vec<_> = report.steps.iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            vec![
                "cluster info",
                "create collection",
                "insert vectors",
                "search on leader",
                "search on follower",
                "write on follower",
                "delete vector",
                "delete collection",
            ]
        );

        let commands = runner.commands();
        assert_eq!(commands.len(), 10);
        assert_eq!(
            commands[1],
            "./bin/client create-collection -addr :5002 -name users -dim 4 -schema \
             create table users (rowid integer primary key, name text, age integer)"
        );
        assert!(commands[6].starts_with("./bin/client search -addr :5012"));
        assert!(commands[7].starts_with("./bin/client insert -addr :5012 -name users -id 4 -vector 3.0,4.0,5.0,6.0"));
        assert_eq!(commands[8], "./bin/client delete -addr :5002 -name users -id 1");
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_later_steps() {
        let runner = ScriptedRunner::new()
            .respond(" info ", CommandOutput::failure(1, "connection refused"))
            .respond("-id 2 ", CommandOutput::failure(1, "constraint failed"));
        let report = harness(runner.clone()).run().await;

        assert!(!report.all_passed());
        let failed: Vec<_> = report.failures().map(|s| s.name).collect();
        assert_eq!(failed, vec!["cluster info", "insert vectors"]);
        assert_eq!(step(&report, "insert vectors").detail, "2: constraint failed");
        assert_eq!(runner.commands().len(), 10);
    }

    #[tokio::test]
    async fn test_follower_write_redirect_is_tolerated() {
        let runner = ScriptedRunner::new().respond(
            "-addr :5012 -name users -id 4",
            CommandOutput::failure(1, "not the leader, redirect to 127.0.0.1:5002"),
        );
        let report = harness(runner).run().await;

        assert!(report.all_passed());
        assert!(step(&report, "write on follower").detail.starts_with("redirected"));
    }

    #[tokio::test]
    async fn test_follower_write_other_failure_fails() {
        let runner = ScriptedRunner::new().respond(
            "-addr :5012 -name users -id 4",
            CommandOutput::failure(1, "collection users does not exist"),
        );
        let report = harness(runner).run().await;

        assert_eq!(report.failures().map(|s| s.name).collect::<Vec<_>>(), vec!["write on follower"]);
    }

    #[test]
    fn test_check_client_binary() {
        let dir = tempfile::tempdir().unwrap();
        let client = Path::new("bin/client");

        assert_matches!(
            check_client_binary(&dir.path().join("missing"), client),
            Err(Error::MissingDirectory(_))
        );
        assert_matches!(
            check_client_binary(dir.path(), client),
            Err(Error::MissingClient(path)) if path.ends_with("bin/client")
        );

        std::fs::create_dir_all(dir.path().join("bin")).unwrap();
        std::fs::write(dir.path().join("bin/client"), "").unwrap();
        assert!(check_client_binary(dir.path(), client).is_ok());
    }
}
