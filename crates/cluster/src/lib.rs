//! Bootstrap and teardown of a local VectorXLite deployment.
//!
//! A deployment is a storage tier (one storage server per node) plus a raft
//! cluster of nodes. [`BootstrapController`] starts it in a fixed order:
//!
//! 1. storage servers, skipping ports that are already served
//! 2. readiness probes against every storage port
//! 3. builds of the node and client binaries
//! 4. the bootstrap node, then each follower
//! 5. one join request per follower
//! 6. a final status query
//!
//! The PIDs it spawns are written to the process registry, where a later
//! [`stop_deployment`] call picks them up.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod bootstrap;
mod client;
mod config;
mod error;
mod info;
mod teardown;
mod topology;

pub mod test_utils;

pub use bootstrap::{BootstrapController, BootstrapReport, JoinOutcome, StatusReport, StorageLaunch};
pub use client::{ClusterClient, format_vector};
pub use config::{
    BuildStep, DeploymentConfig, NODE_PATTERNS, NodeReadiness, STORAGE_PATTERNS, Timings,
};
pub use error::{Error, TopologyError};
pub use info::{ClusterInfo, ClusterMember};
pub use teardown::{TeardownReport, stop_deployment};
pub use topology::{ClusterTopology, NodeConfig};
