//! Ordered start of the storage tier and the cluster nodes.

use std::collections::BTreeSet;
use std::time::Duration;

use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use xlite_launcher::{CommandRunner, Launcher, ProcessHandle};
use xlite_probe::ReadinessProber;
use xlite_registry::{ProcessRegistry, RegistryRole};

use crate::client::ClusterClient;
use crate::config::{DeploymentConfig, NodeReadiness};
use crate::error::Error;
use crate::info::ClusterInfo;
use crate::topology::NodeConfig;

const NODE_HOST: &str = "127.0.0.1";

/// What happened on one storage port.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageLaunch {
    /// Something was already listening; nothing was spawned.
    AlreadyRunning(u16),

    /// A storage server was spawned.
    Launched(u16, ProcessHandle),
}

/// Result of one follower's join request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JoinOutcome {
    /// Why the join failed, if it did.
    pub failure: Option<String>,

    /// The follower that asked to join.
    pub node_id: String,
}

/// Result of the final status query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusReport {
    /// Why the query failed, if it did.
    pub failure: Option<String>,

    /// Parsed status, if the output could be parsed.
    pub info: Option<ClusterInfo>,

    /// Raw output of the query.
    pub output: String,
}

/// Everything a successful start did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BootstrapReport {
    /// Join results, in follower order.
    pub joins: Vec<JoinOutcome>,

    /// Spawned nodes, bootstrap node first.
    pub nodes: Vec<ProcessHandle>,

    /// Final status query.
    pub status: StatusReport,

    /// Storage results, in port order.
    pub storage: Vec<StorageLaunch>,
}

impl BootstrapReport {
    /// Joins that did not succeed.
    pub fn failed_joins(&self) -> impl Iterator<Item = &JoinOutcome> {
        self.joins.iter().filter(|join| join.failure.is_some())
    }

    /// Storage servers spawned by this run.
    pub fn launched_storage(&self) -> impl Iterator<Item = &ProcessHandle> {
        self.storage.iter().filter_map(|launch| match launch {
            StorageLaunch::Launched(_, handle) => Some(handle),
            StorageLaunch::AlreadyRunning(_) => None,
        })
    }
}

/// Drives a cluster start phase by phase.
///
/// Phases run strictly in sequence. A fatal error ends the run without
/// stopping anything already spawned, and cancelling the token stops the run at
/// the next phase boundary, delay or readiness probe.
pub struct BootstrapController<L, C, R>
where
    L: Launcher,
    C: CommandRunner + Clone,
    R: ProcessRegistry,
{
    cancellation: CancellationToken,
    client: ClusterClient<C>,
    config: DeploymentConfig,
    launcher: L,
    prober: ReadinessProber,
    registry: R,
    runner: C,
}

impl<L, C, R> BootstrapController<L, C, R>
where
    L: Launcher,
    C: CommandRunner + Clone,
    R: ProcessRegistry,
{
    /// Creates a controller for `config`.
    pub fn new(config: DeploymentConfig, launcher: L, runner: C, registry: R) -> Self {
        let client = ClusterClient::new(
            runner.clone(),
            config.client_binary.clone(),
            config.cluster_dir.clone(),
        );
        let prober = ReadinessProber::new().with_interval(config.timings.probe_interval);

        Self {
            cancellation: CancellationToken::new(),
            client,
            config,
            launcher,
            prober,
            registry,
            runner,
        }
    }

    /// Stops the run when `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Runs every phase.
    ///
    /// # Errors
    ///
    /// Returns an error if the workspace is missing, a process cannot be
    /// launched, a storage server or node never becomes reachable, a build fails,
    /// a process record cannot be written, or the run is cancelled. Join and
    /// status query failures are reported in the [`BootstrapReport`] instead.
    pub async fn start(&self) -> Result<BootstrapReport, Error<R::Error>> {
        self.prepare_workspace().await?;

        let storage = self.launch_storage().await?;
        self.checkpoint()?;

        self.probe_storage().await?;
        self.checkpoint()?;

        self.build_binaries().await?;
        self.checkpoint()?;

        let nodes = self.launch_nodes().await?;
        self.checkpoint()?;

        let joins = self.join_followers().await?;
        let status = self.query_status().await;

        info!("Cluster is ready");

        Ok(BootstrapReport {
            joins,
            nodes,
            status,
            storage,
        })
    }

    async fn prepare_workspace(&self) -> Result<(), Error<R::Error>> {
        if !fs::try_exists(&self.config.cluster_dir)
            .await
            .map_err(|e| Error::Io("failed to check cluster directory", e))?
        {
            return Err(Error::MissingDirectory(self.config.cluster_dir.clone()));
        }

        fs::create_dir_all(self.config.data_dir())
            .await
            .map_err(|e| Error::Io("failed to create data directory", e))?;
        fs::create_dir_all(self.config.logs_dir())
            .await
            .map_err(|e| Error::Io("failed to create logs directory", e))?;

        Ok(())
    }

    /// Spawns a storage server on every port nothing is listening on yet.
    ///
    /// The storage record is replaced only if at least one server was spawned.
    async fn launch_storage(&self) -> Result<Vec<StorageLaunch>, Error<R::Error>> {
        info!("Starting storage servers");

        let host = self.config.storage_host.as_str();
        let mut launches = Vec::with_capacity(self.config.storage_ports.len());
        let mut pids = BTreeSet::new();
        let mut failure = None;

        for &port in &self.config.storage_ports {
            if self.prober.is_reachable(host, port).await {
                warn!("Storage server already running on port {}, skipping", port);
                launches.push(StorageLaunch::AlreadyRunning(port));
                continue;
            }

            let command = self.config.storage_command(port);
            match self
                .launcher
                .spawn(&command, &self.config.storage_log_path(port))
                .await
            {
                Ok(handle) => {
                    info!("Storage server on port {} started: {}", port, handle);
                    pids.insert(handle.pid());
                    launches.push(StorageLaunch::Launched(port, handle));
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        if !pids.is_empty() {
            self.registry
                .record(RegistryRole::Storage, &pids)
                .await
                .map_err(Error::Registry)?;
        }

        match failure {
            Some(e) => Err(e.into()),
            None => Ok(launches),
        }
    }

    async fn probe_storage(&self) -> Result<(), Error<R::Error>> {
        info!("Waiting for storage servers");
        self.pause(self.config.timings.storage_settle).await?;

        let host = self.config.storage_host.as_str();
        for &port in &self.config.storage_ports {
            if !self
                .await_ready(host, port, self.config.timings.storage_probe_attempts)
                .await?
            {
                return Err(Error::ProbeTimeout {
                    host: host.to_string(),
                    port,
                    log_path: self.config.storage_log_path(port),
                });
            }
            debug!("Storage port {} ready", port);
        }

        Ok(())
    }

    async fn build_binaries(&self) -> Result<(), Error<R::Error>> {
        info!("Building cluster binaries");

        for (target, command) in self.config.build_commands() {
            let output = self.runner.run(&command).await?;
            if !output.is_success() {
                return Err(Error::Build {
                    target: target.to_string(),
                    code: output.code,
                    diagnostic: output.diagnostic().to_string(),
                });
            }
            debug!("Built {}", target);
        }

        Ok(())
    }

    /// Spawns the bootstrap node, then each follower, and records all of them.
    async fn launch_nodes(&self) -> Result<Vec<ProcessHandle>, Error<R::Error>> {
        info!("Starting cluster nodes");

        let mut handles = Vec::with_capacity(self.config.topology.nodes().len());
        let result = self.launch_each_node(&mut handles).await;

        if !handles.is_empty() {
            let pids = handles.iter().map(ProcessHandle::pid).collect();
            self.registry
                .record(RegistryRole::Cluster, &pids)
                .await
                .map_err(Error::Registry)?;
        }

        result.map(|()| handles)
    }

    async fn launch_each_node(
        &self,
        handles: &mut Vec<ProcessHandle>,
    ) -> Result<(), Error<R::Error>> {
        let timings = &self.config.timings;

        for node in self.config.topology.nodes() {
            handles.push(self.launch_node(node).await?);

            let settle = if node.bootstrap {
                timings.bootstrap_settle
            } else {
                timings.follower_stagger
            };
            self.pause(settle).await?;
            self.await_node(node).await?;
        }

        Ok(())
    }

    async fn launch_node(&self, node: &NodeConfig) -> Result<ProcessHandle, Error<R::Error>> {
        let handle = self
            .launcher
            .spawn(
                &self.config.node_command(node),
                &self.config.node_log_path(node),
            )
            .await?;

        if node.bootstrap {
            info!("{} (bootstrap) started: {}", node.id, handle);
        } else {
            info!("{} started: {}", node.id, handle);
        }

        Ok(handle)
    }

    async fn await_node(&self, node: &NodeConfig) -> Result<(), Error<R::Error>> {
        let NodeReadiness::Probe { max_attempts } = self.config.node_readiness else {
            return Ok(());
        };

        let port = node.cluster_port();
        if self.await_ready(NODE_HOST, port, max_attempts).await? {
            Ok(())
        } else {
            Err(Error::ProbeTimeout {
                host: NODE_HOST.to_string(),
                port,
                log_path: self.config.node_log_path(node),
            })
        }
    }

    /// Sends one join request per follower. Failures are logged and reported,
    /// never fatal.
    async fn join_followers(&self) -> Result<Vec<JoinOutcome>, Error<R::Error>> {
        info!("Forming cluster");
        self.pause(self.config.timings.join_stabilization).await?;

        let leader = self.config.topology.bootstrap();
        let mut outcomes = Vec::new();

        for follower in self.config.topology.followers() {
            let failure = match self
                .client
                .join(&leader.admin_addr(), &follower.id, &follower.raft_addr())
                .await
            {
                Ok(output) if output.is_success() => {
                    info!("{} joined the cluster", follower.id);
                    None
                }
                Ok(output) => Some(output.diagnostic().to_string()),
                Err(e) => Some(e.to_string()),
            };

            if let Some(reason) = &failure {
                warn!("Join of {} failed: {}", follower.id, reason);
            }

            outcomes.push(JoinOutcome {
                failure,
                node_id: follower.id.clone(),
            });
        }

        self.pause(self.config.timings.post_join).await?;

        Ok(outcomes)
    }

    async fn query_status(&self) -> StatusReport {
        let leader = self.config.topology.bootstrap();

        match self.client.info(&leader.admin_addr()).await {
            Ok(output) if output.is_success() => StatusReport {
                failure: None,
                info: ClusterInfo::parse(&output.stdout),
                output: output.stdout,
            },
            Ok(output) => {
                let reason = output.diagnostic().to_string();
                warn!("Cluster info query failed: {}", reason);
                StatusReport {
                    failure: Some(reason),
                    info: None,
                    output: output.stdout,
                }
            }
            Err(e) => {
                warn!("Cluster info query failed: {}", e);
                StatusReport {
                    failure: Some(e.to_string()),
                    info: None,
                    output: String::new(),
                }
            }
        }
    }

    fn checkpoint(&self) -> Result<(), Error<R::Error>> {
        if self.cancellation.is_cancelled() {
            Err(Error::Interrupted)
        } else {
            Ok(())
        }
    }

    async fn await_ready(
        &self,
        host: &str,
        port: u16,
        max_attempts: u32,
    ) -> Result<bool, Error<R::Error>> {
        tokio::select! {
            biased;
            () = self.cancellation.cancelled() => Err(Error::Interrupted),
            ready = self.prober.await_ready(host, port, max_attempts) => Ok(ready),
        }
    }

    async fn pause(&self, duration: Duration) -> Result<(), Error<R::Error>> {
        if duration.is_zero() {
            return self.checkpoint();
        }

        tokio::select! {
            () = self.cancellation.cancelled() => Err(Error::Interrupted),
            () = tokio::time::sleep(duration) => Ok(()),
        }
    }
}
