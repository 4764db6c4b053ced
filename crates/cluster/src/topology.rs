//! Node layout of the cluster.
//!
//! Node `i` (one-based) owns the port prefix `500 + (i - 1)`: its raft port is
//! the prefix followed by `1`, its cluster admin port the prefix followed by `2`
//! and its storage port the prefix followed by `3`.

use std::collections::HashSet;
use std::path::PathBuf;

use crate::error::TopologyError;

/// Port prefix of the first node.
pub const FIRST_PORT_PREFIX: u16 = 500;

/// Number of nodes in the standard topology.
pub const STANDARD_SIZE: u16 = 3;

/// One cluster node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeConfig {
    /// Whether this node forms the cluster rather than joining it.
    pub bootstrap: bool,

    /// Data directory, relative to the cluster directory.
    pub data_dir: PathBuf,

    /// Node identifier, e.g. `node1`.
    pub id: String,

    /// Leading digits shared by the node's ports.
    pub port_prefix: u16,
}

impl NodeConfig {
    /// The `index`th node (one-based) of the standard layout.
    #[must_use]
    pub fn numbered(index: u16, bootstrap: bool) -> Self {
        Self {
            bootstrap,
            data_dir: PathBuf::from("./data"),
            id: format!("node{index}"),
            port_prefix: FIRST_PORT_PREFIX + index.saturating_sub(1),
        }
    }

    /// Consensus port.
    #[must_use]
    pub const fn raft_port(&self) -> u16 {
        self.port_prefix * 10 + 1
    }

    /// Admin port used by the cluster client.
    #[must_use]
    pub const fn cluster_port(&self) -> u16 {
        self.port_prefix * 10 + 2
    }

    /// Port of the storage server backing this node.
    #[must_use]
    pub const fn storage_port(&self) -> u16 {
        self.port_prefix * 10 + 3
    }

    /// Address other nodes use to reach this node's consensus port.
    #[must_use]
    pub fn raft_addr(&self) -> String {
        format!("127.0.0.1:{}", self.raft_port())
    }

    /// Address the cluster client targets.
    #[must_use]
    pub fn admin_addr(&self) -> String {
        format!(":{}", self.cluster_port())
    }

    /// Address the node uses to reach its storage server.
    #[must_use]
    pub fn storage_addr(&self) -> String {
        format!("0.0.0.0:{}", self.storage_port())
    }
}

/// Ordered set of nodes, bootstrap node first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterTopology {
    nodes: Vec<NodeConfig>,
}

impl ClusterTopology {
    /// Validates and wraps `nodes`.
    ///
    /// # Errors
    ///
    /// Returns an error unless exactly one node is the bootstrap node, it comes
    /// first and node ids are unique.
    pub fn new(nodes: Vec<NodeConfig>) -> Result<Self, TopologyError> {
        let first = nodes.first().ok_or(TopologyError::Empty)?;

        match nodes.iter().filter(|node| node.bootstrap).count() {
            0 => return Err(TopologyError::NoBootstrap),
            1 => {}
            n => return Err(TopologyError::MultipleBootstrap(n)),
        }

        if !first.bootstrap {
            return Err(TopologyError::BootstrapNotFirst(first.id.clone()));
        }

        let mut seen = HashSet::new();
        for node in &nodes {
            if !seen.insert(node.id.as_str()) {
                return Err(TopologyError::DuplicateId(node.id.clone()));
            }
        }

        Ok(Self { nodes })
    }

    /// The three-node layout `node1` (bootstrap), `node2`, `node3`.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            nodes: (1..=STANDARD_SIZE)
                .map(|index| NodeConfig::numbered(index, index == 1))
                .collect(),
        }
    }

    /// The bootstrap node.
    #[must_use]
    pub fn bootstrap(&self) -> &NodeConfig {
        &self.nodes[0]
    }

    /// Nodes that join the bootstrap node, in start order.
    #[must_use]
    pub fn followers(&self) -> &[NodeConfig] {
        &self.nodes[1..]
    }

    /// All nodes in start order.
    #[must_use]
    pub fn nodes(&self) -> &[NodeConfig] {
        &self.nodes
    }

    /// Storage ports of all nodes, in node order.
    #[must_use]
    pub fn storage_ports(&self) -> Vec<u16> {
        self.nodes.iter().map(NodeConfig::storage_port).collect()
    }
}

impl Default for ClusterTopology {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_port_convention() {
        let topology = ClusterTopology::standard();
        let ports: Vec<_> = topology
            .nodes()
            .iter()
            .map(|n| (n.id.as_str(), n.raft_port(), n.cluster_port(), n.storage_port()))
            .collect();

        assert_eq!(
            ports,
            vec![
                ("node1", 5001, 5002, 5003),
                ("node2", 5011, 5012, 5013),
                ("node3", 5021, 5022, 5023),
            ]
        );
        assert_eq!(topology.storage_ports(), vec![5003, 5013, 5023]);
    }

    #[test]
    fn test_bootstrap_and_followers() {
        let topology = ClusterTopology::standard();

        assert_eq!(topology.bootstrap().id, "node1");
        assert!(topology.bootstrap().bootstrap);
        assert_eq!(topology.bootstrap().admin_addr(), ":5002");

        let followers: Vec<_> = topology.followers().iter().map(|n| n.raft_addr()).collect();
        assert_eq!(followers, vec!["127.0.0.1:5011", "127.0.0.1:5021"]);
    }

    #[test]
    fn test_validation() {
        assert_eq!(ClusterTopology::new(vec![]), Err(TopologyError::Empty));
        assert_eq!(
            ClusterTopology::new(vec![NodeConfig::numbered(1, false)]),
            Err(TopologyError::NoBootstrap)
        );
        assert_eq!(
            ClusterTopology::new(vec![NodeConfig::numbered(1, true), NodeConfig::numbered(2, true)]),
            Err(TopologyError::MultipleBootstrap(2))
        );
        assert_eq!(
            ClusterTopology::new(vec![NodeConfig::numbered(2, false), NodeConfig::numbered(1, true)]),
            Err(TopologyError::BootstrapNotFirst("node2".to_string()))
        );
        assert_eq!(
            ClusterTopology::new(vec![NodeConfig::numbered(1, true), NodeConfig::numbered(1, false)]),
            Err(TopologyError::DuplicateId("node1".to_string()))
        );
        assert_eq!(
            ClusterTopology::new(ClusterTopology::standard().nodes().to_vec()),
            Ok(ClusterTopology::standard())
        );
    }
}
