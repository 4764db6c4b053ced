//! Abstract interface for persisted sets of process identities.
//!
//! A start invocation records the PIDs it spawned; a later, unrelated stop
//! invocation reads them back. One record exists per [`RegistryRole`].
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{self, Debug, Display};

use async_trait::async_trait;

/// Marker trait for registry errors.
pub trait RegistryError: Debug + Error + Send + Sync + 'static {}

/// Which group of processes a record tracks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RegistryRole {
    /// Cluster node processes.
    Cluster,

    /// Storage tier processes.
    Storage,
}

impl RegistryRole {
    /// File name used when the record is persisted on disk.
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Cluster => ".cluster_pids",
            Self::Storage => ".vector_xlite_pids",
        }
    }

    /// All roles, in shutdown order.
    #[must_use]
    pub const fn all() -> [Self; 2] {
        [Self::Cluster, Self::Storage]
    }
}

impl Display for RegistryRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cluster => write!(f, "cluster"),
            Self::Storage => write!(f, "storage"),
        }
    }
}

/// A durable set of process identities keyed by role.
///
/// # Required Methods
/// - `record`: replaces the record for `role` with `pids`.
/// - `read`: returns the record for `role`; a missing record is an empty set.
/// - `delete`: removes the record for `role`; removing a missing record succeeds.
#[async_trait]
pub trait ProcessRegistry: Clone + Send + Sync + 'static {
    /// Error type of the backend.
    type Error: RegistryError;

    /// Replaces the record for `role`.
    async fn record(&self, role: RegistryRole, pids: &BTreeSet<u32>) -> Result<(), Self::Error>;

    /// Reads the record for `role`.
    async fn read(&self, role: RegistryRole) -> Result<BTreeSet<u32>, Self::Error>;

    /// Deletes the record for `role`.
    async fn delete(&self, role: RegistryRole) -> Result<(), Self::Error>;
}

/// A line that could not be parsed as a positive PID.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MalformedLine {
    /// One-based line number.
    pub line: usize,

    /// The offending content, trimmed.
    pub content: String,
}

/// Result of decoding a persisted record.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Decoded {
    /// Lines that were skipped.
    pub malformed: Vec<MalformedLine>,

    /// Identities that parsed.
    pub pids: BTreeSet<u32>,
}

/// Serializes identities one per line.
#[must_use]
pub fn encode(pids: &BTreeSet<u32>) -> String {
    pids.iter().map(|pid| format!("{pid}\n")).collect()
}

/// Parses one identity per line. Blank lines are ignored; anything that is not a
/// plain positive decimal integer is reported in [`Decoded::malformed`].
#[must_use]
pub fn decode(text: &str) -> Decoded {
    let mut decoded = Decoded::default();

    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if !line.bytes().all(|b| b.is_ascii_digit()) {
            decoded.malformed.push(MalformedLine {
                line: index + 1,
                content: line.to_string(),
            });
            continue;
        }

        match line.parse::<u32>() {
            Ok(pid) if pid > 0 => {
                decoded.pids.insert(pid);
            }
            _ => decoded.malformed.push(MalformedLine {
                line: index + 1,
                content: line.to_string(),
            }),
        }
    }

    decoded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_one_per_line() {
        let pids = BTreeSet::from([42, 7, 1001]);

        assert_eq!(encode(&pids), "7\n42\n1001\n");
        assert_eq!(encode(&BTreeSet::new()), "");
    }

    #[test]
    fn test_decode_ignores_order_and_blank_lines() {
        let decoded = decode("1001\n\n7\n  42  \n7\n");

        assert_eq!(decoded.pids, BTreeSet::from([7, 42, 1001]));
        assert!(decoded.malformed.is_empty());
    }

    #[test]
    fn test_decode_reports_malformed_lines() {
        let decoded = decode("12\nnot-a-pid\n0\n-5\n99999999999\n+42\n34\n");

        assert_eq!(decoded.pids, BTreeSet::from([12, 34]));
        let lines: Vec<_> = decoded.malformed.iter().map(|m| m.line).collect();
        assert_eq!(lines, vec![2, 3, 4, 5, 6]);
        assert_eq!(decoded.malformed[0].content, "not-a-pid");
        assert_eq!(decoded.malformed[4].content, "+42");
    }

    #[test]
    fn test_role_file_names_are_distinct() {
        assert_ne!(
            RegistryRole::Cluster.file_name(),
            RegistryRole::Storage.file_name()
        );
        assert_eq!(RegistryRole::Storage.to_string(), "storage");
    }
}
