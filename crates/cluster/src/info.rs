//! Parsing of the cluster status report printed by `client info`.

use std::sync::LazyLock;

use regex::Regex;

static LEADER_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*Leader ID:[ \t]*(\S*)[ \t]*$").expect("Invalid regex pattern")
});

static LEADER_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*Leader Address:[ \t]*(\S*)[ \t]*$").expect("Invalid regex pattern")
});

static NODE_STATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*Node State:[ \t]*(\S*)[ \t]*$").expect("Invalid regex pattern")
});

static MEMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^[ \t]*-[ \t]*(\S+)[ \t]+\(([^)]*)\):[ \t]*(\w+),[ \t]*Voter:[ \t]*(true|false)[ \t]*$",
    )
    .expect("Invalid regex pattern")
});

/// One member listed in the status report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterMember {
    /// Consensus address.
    pub address: String,

    /// Node id.
    pub id: String,

    /// Consensus state, e.g. `Leader` or `Follower`.
    pub state: String,

    /// Whether the member votes.
    pub voter: bool,
}

/// Status of the cluster as seen by the queried node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterInfo {
    /// Address of the current leader.
    pub leader_address: String,

    /// Id of the current leader. Empty while an election is in progress.
    pub leader_id: String,

    /// Known members.
    pub members: Vec<ClusterMember>,

    /// State of the node that answered.
    pub node_state: String,
}

impl ClusterInfo {
    /// Parses the text output of the status query.
    ///
    /// Returns `None` if the output has no `Leader ID:` line.
    #[must_use]
    pub fn parse(output: &str) -> Option<Self> {
        let capture = |re: &Regex| {
            re.captures(output)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
        };

        let leader_id = capture(&LEADER_ID)?;

        let members = MEMBER
            .captures_iter(output)
            .map(|c| ClusterMember {
                id: c[1].to_string(),
                address: c[2].to_string(),
                state: c[3].to_string(),
                voter: &c[4] == "true",
            })
            .collect();

        Some(Self {
            leader_address: capture(&LEADER_ADDRESS).unwrap_or_default(),
            leader_id,
            members,
            node_state: capture(&NODE_STATE).unwrap_or_default(),
        })
    }

    /// The member currently leading, if it is listed.
    #[must_use]
    pub fn leader(&self) -> Option<&ClusterMember> {
        self.members.iter().find(|m| m.id == self.leader_id)
    }

    /// Number of voting members.
    #[must_use]
    pub fn voters(&self) -> usize {
        self.members.iter().filter(|m| m.voter).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = "\
Leader ID: node1
Leader Address: 127.0.0.1:5001
Node State: Leader

Cluster Nodes (3):
  - node1 (127.0.0.1:5001): Leader, Voter: true
  - node2 (127.0.0.1:5011): Follower, Voter: true
  - node3 (127.0.0.1:5021): Follower, Voter: false
";

    #[test]
    fn test_parse_full_report() {
        let info = ClusterInfo::parse(REPORT).unwrap();

        assert_eq!(info.leader_id, "node1");
        assert_eq!(info.leader_address, "127.0.0.1:5001");
        assert_eq!(info.node_state, "Leader");
        assert_eq!(info.members.len(), 3);
        assert_eq!(info.voters(), 2);
        assert_eq!(
            info.members[1],
            ClusterMember {
                address: "127.0.0.1:5011".to_string(),
                id: "node2".to_string(),
                state: "Follower".to_string(),
                voter: true,
            }
        );
        assert_eq!(info.leader().map(|m| m.address.as_str()), Some("127.0.0.1:5001"));
    }

    #[test]
    fn test_parse_without_members() {
        let info = ClusterInfo::parse("Leader ID: \nNode State: Candidate\n").unwrap();

        assert!(info.leader_id.is_empty());
        assert!(info.leader().is_none());
        assert_eq!(info.node_state, "Candidate");
        assert!(info.members.is_empty());
    }

    #[test]
    fn test_parse_rejects_unrelated_output() {
        assert!(ClusterInfo::parse("rpc error: connection refused").is_none());
    }
}
