//! Process launching primitives for the orchestrator.
//!
//! Two capabilities live here:
//!
//! - [`Launcher`] starts a long-running process detached from the caller, with
//!   stdout and stderr redirected into a log file, and hands back a
//!   [`ProcessHandle`] immediately.
//! - [`CommandRunner`] runs a short-lived command to completion and captures its
//!   exit status and output (builds, admin client calls, code generation).
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use xlite_launcher::{CommandSpec, DetachedLauncher, Launcher, Result};
//!
//! async fn run() -> Result<()> {
//!     let command = CommandSpec::new("./bin/server", ["-id", "node1", "-bootstrap"])
//!         .with_working_dir("distributed/cluster");
//!
//!     let handle = DetachedLauncher
//!         .spawn(&command, Path::new("distributed/cluster/logs/node1.log"))
//!         .await?;
//!
//!     println!("started {}", handle.pid());
//!     Ok(())
//! }
//! ```
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::redundant_pub_crate)]

mod command;
mod error;
mod spawn;

pub use command::{CommandOutput, CommandRunner, CommandSpec, SystemCommandRunner};
pub use error::{Error, Result};
pub use spawn::{DetachedLauncher, Launcher, ProcessHandle};
