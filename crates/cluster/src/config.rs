//! Deployment layout, commands and timings.

use std::path::{Path, PathBuf};
use std::time::Duration;

use xlite_launcher::CommandSpec;

use crate::topology::{ClusterTopology, NodeConfig};

/// Command-line fragments that identify cluster node processes.
pub const NODE_PATTERNS: [&str; 2] = ["cmd/server/main.go", "bin/server"];

/// Command-line fragments that identify storage server processes.
pub const STORAGE_PATTERNS: [&str; 2] = ["vector_xlite_grpc", "standalone/server"];

/// How a node is judged ready after it has been spawned.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NodeReadiness {
    /// Wait the configured settle delay and assume the node is up.
    #[default]
    FixedDelay,

    /// After the settle delay, also probe the node's admin port.
    Probe {
        /// Attempt budget per node.
        max_attempts: u32,
    },
}

/// Delays and retry budgets used while starting the cluster.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timings {
    /// Wait after the bootstrap node is spawned.
    pub bootstrap_settle: Duration,

    /// Wait after each follower is spawned.
    pub follower_stagger: Duration,

    /// Wait before the first join request.
    pub join_stabilization: Duration,

    /// Wait after the last join request, before the status query.
    pub post_join: Duration,

    /// Spacing of readiness probe attempts.
    pub probe_interval: Duration,

    /// Attempt budget for each storage port.
    pub storage_probe_attempts: u32,

    /// Wait after launching storage servers, before probing them.
    pub storage_settle: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            bootstrap_settle: Duration::from_secs(2),
            follower_stagger: Duration::from_secs(1),
            join_stabilization: Duration::from_secs(5),
            post_join: Duration::from_secs(2),
            probe_interval: Duration::from_secs(1),
            storage_probe_attempts: 30,
            storage_settle: Duration::from_secs(5),
        }
    }
}

impl Timings {
    /// No waiting and a short probe budget. For tests.
    #[must_use]
    pub const fn immediate() -> Self {
        Self {
            bootstrap_settle: Duration::ZERO,
            follower_stagger: Duration::ZERO,
            join_stabilization: Duration::ZERO,
            post_join: Duration::ZERO,
            probe_interval: Duration::from_millis(20),
            storage_probe_attempts: 5,
            storage_settle: Duration::ZERO,
        }
    }
}

/// One binary built before the nodes are launched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildStep {
    /// Build command, run in the cluster directory.
    pub command: CommandSpec,

    /// Name used in diagnostics.
    pub target: String,
}

/// Where everything lives and how it is started.
#[derive(Clone, Debug)]
pub struct DeploymentConfig {
    /// Binaries built before any node starts.
    pub build_steps: Vec<BuildStep>,

    /// Cluster client binary, relative to the cluster directory.
    pub client_binary: PathBuf,

    /// Directory the nodes run in.
    pub cluster_dir: PathBuf,

    /// Node readiness policy.
    pub node_readiness: NodeReadiness,

    /// Directory holding the process records.
    pub registry_dir: PathBuf,

    /// Cluster node binary, relative to the cluster directory.
    pub server_binary: PathBuf,

    /// Directory the storage servers run in.
    pub storage_dir: PathBuf,

    /// Host the storage servers are probed on.
    pub storage_host: String,

    /// Storage server command, without the port arguments.
    pub storage_launch: CommandSpec,

    /// Ports the storage servers listen on, one server each.
    pub storage_ports: Vec<u16>,

    /// Delays and probe budgets.
    pub timings: Timings,

    /// Node layout.
    pub topology: ClusterTopology,
}

impl DeploymentConfig {
    /// Standard layout under a repository root.
    ///
    /// Nodes run in `distributed/cluster`, storage servers in `standalone/server`,
    /// and the process records are kept in the cluster directory.
    pub fn from_root(root_dir: impl AsRef<Path>) -> Self {
        let root_dir = root_dir.as_ref();
        let cluster_dir = root_dir.join("distributed").join("cluster");
        let storage_dir = root_dir.join("standalone").join("server");
        let topology = ClusterTopology::standard();

        Self {
            build_steps: vec![
                BuildStep {
                    command: CommandSpec::new(
                        "go",
                        ["build", "-o", "bin/server", "cmd/server/main.go"],
                    ),
                    target: "server".to_string(),
                },
                BuildStep {
                    command: CommandSpec::new(
                        "go",
                        ["build", "-o", "bin/client", "cmd/cli/main.go"],
                    ),
                    target: "client".to_string(),
                },
            ],
            client_binary: PathBuf::from("./bin/client"),
            node_readiness: NodeReadiness::default(),
            registry_dir: cluster_dir.clone(),
            server_binary: PathBuf::from("./bin/server"),
            storage_host: "127.0.0.1".to_string(),
            storage_launch: CommandSpec::new("cargo", ["run", "--release", "--"])
                .with_working_dir(&storage_dir),
            storage_ports: topology.storage_ports(),
            timings: Timings::default(),
            topology,
            cluster_dir,
            storage_dir,
        }
    }

    /// Command starting the storage server on `port`.
    #[must_use]
    pub fn storage_command(&self, port: u16) -> CommandSpec {
        self.storage_launch
            .clone()
            .with_args(["--port".to_string(), port.to_string()])
    }

    /// Log file of the storage server on `port`.
    #[must_use]
    pub fn storage_log_path(&self, port: u16) -> PathBuf {
        self.storage_dir.join("logs").join(format!("{port}.log"))
    }

    /// Command starting `node`.
    #[must_use]
    pub fn node_command(&self, node: &NodeConfig) -> CommandSpec {
        let mut args = vec![
            "-id".to_string(),
            node.id.clone(),
            "-port".to_string(),
            node.port_prefix.to_string(),
            "-vector-addr".to_string(),
            node.storage_addr(),
            "-data-dir".to_string(),
            node.data_dir.display().to_string(),
        ];
        if node.bootstrap {
            args.push("-bootstrap".to_string());
        }

        CommandSpec::new(&self.server_binary, args).with_working_dir(&self.cluster_dir)
    }

    /// Log file of `node`.
    #[must_use]
    pub fn node_log_path(&self, node: &NodeConfig) -> PathBuf {
        self.logs_dir().join(format!("{}.log", node.id))
    }

    /// Node log directory.
    #[must_use]
    pub fn logs_dir(&self) -> PathBuf {
        self.cluster_dir.join("logs")
    }

    /// Node data directory.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.cluster_dir.join("data")
    }

    /// Build steps with their working directory set to the cluster directory.
    pub fn build_commands(&self) -> impl Iterator<Item = (&str, CommandSpec)> {
        self.build_steps.iter().map(|step| {
            (
                step.target.as_str(),
                step.command.clone().with_working_dir(&self.cluster_dir),
            )
        })
    }

    /// Absolute path of the client binary.
    #[must_use]
    pub fn client_binary_path(&self) -> PathBuf {
        self.cluster_dir.join(&self.client_binary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_root_layout() {
        let config = DeploymentConfig::from_root("/repo");

        assert_eq!(config.cluster_dir, Path::new("/repo/distributed/cluster"));
        assert_eq!(config.registry_dir, config.cluster_dir);
        assert_eq!(config.storage_ports, vec![5003, 5013, 5023]);
        assert_eq!(
            config.storage_log_path(5013),
            Path::new("/repo/standalone/server/logs/5013.log")
        );
        assert_eq!(
            config.client_binary_path(),
            Path::new("/repo/distributed/cluster/./bin/client")
        );
    }

    #[test]
    fn test_storage_command() {
        let config = DeploymentConfig::from_root("/repo");
        let command = config.storage_command(5023);

        assert_eq!(command.to_string(), "cargo run --release -- --port 5023");
        assert_eq!(command.arg_value("--port"), Some("5023"));
        assert_eq!(
            command.working_dir.as_deref(),
            Some(Path::new("/repo/standalone/server"))
        );
    }

    #[test]
    fn test_node_commands() {
        let config = DeploymentConfig::from_root("/repo");
        let [first, second, _] = config.topology.nodes() else {
            panic!("standard topology has three nodes");
        };

        assert_eq!(
            config.node_command(first).to_string(),
            "./bin/server -id node1 -port 500 -vector-addr 0.0.0.0:5003 -data-dir ./data -bootstrap"
        );
        assert_eq!(
            config.node_command(second).to_string(),
            "./bin/server -id node2 -port 501 -vector-addr 0.0.0.0:5013 -data-dir ./data"
        );
        assert_eq!(
            config.node_log_path(second),
            Path::new("/repo/distributed/cluster/logs/node2.log")
        );
    }

    #[test]
    fn test_build_commands_run_in_cluster_dir() {
        let config = DeploymentConfig::from_root("/repo");
        let builds: Vec<_> = config
            .build_commands()
            .map(|(target, command)| (target.to_string(), command.to_string(), command.working_dir))
            .collect();

        assert_eq!(builds.len(), 2);
        assert_eq!(builds[0].0, "server");
        assert_eq!(builds[0].1, "go build -o bin/server cmd/server/main.go");
        assert_eq!(builds[1].1, "go build -o bin/client cmd/cli/main.go");
        assert!(
            builds
                .iter()
                .all(|b| b.2.as_deref() == Some(Path::new("/repo/distributed/cluster")))
        );
    }

    #[test]
    fn test_immediate_timings_do_not_wait() {
        let timings = Timings::immediate();

        assert_eq!(timings.storage_settle, Duration::ZERO);
        assert_eq!(timings.join_stabilization, Duration::ZERO);
        assert!(timings.storage_probe_attempts > 0);
        assert_eq!(Timings::default().storage_probe_attempts, 30);
    }
}
