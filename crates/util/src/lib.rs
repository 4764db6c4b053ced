//! Small helpers shared across the orchestrator crates.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod port_allocator;

pub use port_allocator::{allocate_port, is_port_available};
