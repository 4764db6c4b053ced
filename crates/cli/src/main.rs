//! CLI binary to run a local VectorXLite cluster.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::redundant_pub_crate)]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use xlite_cluster::{BootstrapController, ClusterClient, DeploymentConfig, stop_deployment};
use xlite_codegen::{CodegenConfig, Generator};
use xlite_harness::{OperationsHarness, check_client_binary};
use xlite_launcher::{DetachedLauncher, SystemCommandRunner};
use xlite_process_table::SystemProcessTable;
use xlite_registry_fs::FsRegistry;
use xlite_shutdown::ShutdownController;

/// CLI-specific error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Cluster start or stop failed
    #[error(transparent)]
    Cluster(#[from] xlite_cluster::Error<xlite_registry_fs::Error>),

    /// Code generation could not run
    #[error(transparent)]
    Codegen(#[from] xlite_codegen::Error),

    /// Some schemas failed to compile
    #[error("{0} proto generation job(s) failed")]
    GenerationFailed(usize),

    /// The operations scenario could not run
    #[error(transparent)]
    Harness(#[from] xlite_harness::Error),

    /// Some scenario steps failed
    #[error("{0} operation step(s) failed")]
    OperationsFailed(usize),
}

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Repository root containing `distributed/cluster` and `standalone/server`
    #[arg(long, global = true, default_value = ".", env = "XLITE_ROOT_DIR")]
    root_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, Subcommand)]
enum Command {
    /// Start the storage servers and a three node cluster
    Start,

    /// Stop the cluster nodes
    Stop {
        /// Also stop the storage servers
        #[arg(long, visible_alias = "with-vector-server")]
        with_storage: bool,
    },

    /// Run the operations scenario against a running cluster
    TestOps,

    /// Generate Go bindings from the protocol schemas
    GenProtos,
}

fn spawn_signal_handler(shutdown_token: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};

            let (mut sigterm, mut sigint) =
                match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                    (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
                    (Err(e), _) | (_, Err(e)) => {
                        error!("Failed to install signal handlers: {}", e);
                        return;
                    }
                };

            tokio::select! {
                _ = sigterm.recv() => info!("Received SIGTERM"),
                _ = sigint.recv() => info!("Received SIGINT"),
            }
        }

        #[cfg(not(unix))]
        {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            info!("Received interrupt signal");
        }

        warn!("Interrupted by user");
        shutdown_token.cancel();
    });
}

async fn start(root_dir: PathBuf) -> Result<(), Error> {
    let config = DeploymentConfig::from_root(root_dir);
    let registry = FsRegistry::new(&config.registry_dir);
    let logs_dir = config.logs_dir();

    let shutdown_token = CancellationToken::new();
    spawn_signal_handler(shutdown_token.clone());

    let report = BootstrapController::new(config, DetachedLauncher, SystemCommandRunner, registry)
        .with_cancellation(shutdown_token)
        .start()
        .await?;

    println!("=== Cluster Info ===");
    println!("{}", report.status.output.trim_end());

    if let Some(info) = &report.status.info {
        info!(
            "Cluster has {} member(s), leader {}",
            info.members.len(),
            info.leader_id
        );
    }
    for join in report.failed_joins() {
        warn!(
            "{} did not join: {}",
            join.node_id,
            join.failure.as_deref().unwrap_or_default()
        );
    }

    println!("Cluster is ready. Logs are in {}", logs_dir.display());
    Ok(())
}

async fn stop(root_dir: PathBuf, with_storage: bool) -> Result<(), Error> {
    let config = DeploymentConfig::from_root(root_dir);
    if !config.cluster_dir.is_dir() {
        return Err(Error::Cluster(xlite_cluster::Error::MissingDirectory(
            config.cluster_dir,
        )));
    }

    let shutdown = ShutdownController::new(
        FsRegistry::new(&config.registry_dir),
        SystemProcessTable::new(),
    );

    let report = stop_deployment(&shutdown, with_storage).await?;

    println!("Stopped {} cluster node(s)", report.nodes.terminated());
    if let Some(storage) = &report.storage {
        println!("Stopped {} storage server(s)", storage.terminated());
    }

    Ok(())
}

async fn test_ops(root_dir: PathBuf) -> Result<(), Error> {
    let config = DeploymentConfig::from_root(root_dir);
    check_client_binary(&config.cluster_dir, &config.client_binary)?;

    let client = ClusterClient::new(
        SystemCommandRunner,
        config.client_binary.clone(),
        config.cluster_dir.clone(),
    );
    let report = OperationsHarness::new(client, &config.topology).run().await;

    for step in &report.steps {
        let mark = if step.passed { "PASS" } else { "FAIL" };
        println!("[{mark}] {}", step.name);
        if !step.detail.trim().is_empty() {
            println!("{}", step.detail.trim_end());
        }
    }

    let failed = report.failures().count();
    if failed == 0 {
        println!("All tests passed");
        Ok(())
    } else {
        Err(Error::OperationsFailed(failed))
    }
}

async fn gen_protos(root_dir: PathBuf) -> Result<(), Error> {
    let generator = Generator::new(CodegenConfig::from_root(root_dir), SystemCommandRunner);

    let version = generator.check_protoc().await?;
    info!("Using {}", version);

    let outcomes = generator.generate_all().await;
    let mut failed = 0;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(files) => {
                println!(
                    "{}: generated {} file(s) in {}",
                    outcome.job.name,
                    files.len(),
                    outcome.job.output_dir.display()
                );
                for file in files {
                    if let Some(name) = file.file_name() {
                        println!("  - {}", name.to_string_lossy());
                    }
                }
            }
            Err(e) => {
                println!("{}: {}", outcome.job.name, e);
                failed += 1;
            }
        }
    }

    if failed == 0 {
        Ok(())
    } else {
        Err(Error::GenerationFailed(failed))
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let root_dir = std::path::absolute(&args.root_dir).unwrap_or(args.root_dir);

    let result = match args.command {
        Command::Start => start(root_dir).await,
        Command::Stop { with_storage } => stop(root_dir, with_storage).await,
        Command::TestOps => test_ops(root_dir).await,
        Command::GenProtos => gen_protos(root_dir).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_accepts_both_flag_spellings() {
        for flag in ["--with-storage", "--with-vector-server"] {
            let args = Args::try_parse_from(["xlite", "stop", flag]).unwrap();
            assert!(matches!(args.command, Command::Stop { with_storage: true }));
        }

        let args = Args::try_parse_from(["xlite", "stop"]).unwrap();
        assert!(matches!(args.command, Command::Stop { with_storage: false }));
    }

    #[test]
    fn test_root_dir_is_global() {
        let args = Args::try_parse_from(["xlite", "start", "--root-dir", "/repo"]).unwrap();

        assert_eq!(args.root_dir, PathBuf::from("/repo"));
        assert!(matches!(args.command, Command::Start));
    }

    #[tokio::test]
    async fn test_stop_refuses_missing_cluster_dir() {
        let root = tempfile::tempdir().unwrap();
        let missing = root.path().join("not-a-checkout");

        let result = stop(missing.clone(), true).await;

        assert!(matches!(
            result,
            Err(Error::Cluster(xlite_cluster::Error::MissingDirectory(path)))
                if path == missing.join("distributed").join("cluster")
        ));
    }

    #[test]
    fn test_start_takes_no_flags() {
        assert!(Args::try_parse_from(["xlite", "start", "--with-storage"]).is_err());
    }
}
