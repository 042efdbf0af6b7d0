//! Configuration types for benor

use crate::error::BenorError;
use crate::types::{NodeId, Value};
use serde::{Deserialize, Serialize};

/// Cluster-wide parameters shared by every node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Total number of nodes (N)
    pub nodes: usize,

    /// Fault bound (F): maximum number of crash-faulty nodes tolerated
    pub faults: usize,

    /// First HTTP port; node i listens on `base_port + i`
    pub base_port: u16,
}

impl ClusterConfig {
    pub fn new(nodes: usize, faults: usize) -> Self {
        Self {
            nodes,
            faults,
            ..Self::default()
        }
    }

    /// Enforce N > 3F, the resilience bound the randomized protocol needs
    /// for both agreement and termination.
    pub fn validate(&self) -> Result<(), BenorError> {
        if self.nodes == 0 {
            return Err(BenorError::Config("cluster must have at least one node".into()));
        }
        if self.nodes <= 3 * self.faults {
            return Err(BenorError::Config(format!(
                "need N > 3F, got N={} F={}",
                self.nodes, self.faults
            )));
        }
        Ok(())
    }

    /// Quorum threshold: distinct senders required to conclude a phase.
    pub fn quorum(&self) -> usize {
        self.nodes - self.faults
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.as_usize() < self.nodes
    }

    pub fn port_of(&self, id: NodeId) -> u16 {
        self.base_port + id.as_u32() as u16
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            nodes: 4,
            faults: 1,
            base_port: 3001,
        }
    }
}

/// Round-loop timing parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusConfig {
    /// Propose-phase timeout in milliseconds
    pub propose_timeout_ms: u64,

    /// Vote-phase timeout in milliseconds
    pub vote_timeout_ms: u64,

    /// Interval between quorum/kill re-checks while waiting on a phase
    pub poll_interval_ms: u64,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            propose_timeout_ms: 800,
            vote_timeout_ms: 800,
            poll_interval_ms: 20,
        }
    }
}

/// Per-node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// This node's identifier
    pub node_id: NodeId,

    /// Cluster parameters
    pub cluster: ClusterConfig,

    /// Consensus timing
    pub consensus: ConsensusConfig,

    /// Initial binary value proposed in round 0
    pub initial_value: Value,

    /// A faulty node never runs the protocol and never accepts messages
    pub faulty: bool,
}

impl NodeConfig {
    pub fn new(node_id: NodeId, cluster: ClusterConfig, initial_value: Value) -> Self {
        Self {
            node_id,
            cluster,
            consensus: ConsensusConfig::default(),
            initial_value,
            faulty: false,
        }
    }

    pub fn faulty_node(node_id: NodeId, cluster: ClusterConfig) -> Self {
        Self {
            node_id,
            cluster,
            consensus: ConsensusConfig::default(),
            // never used: a faulty node's state stays absent
            initial_value: Value::Zero,
            faulty: true,
        }
    }

    pub fn validate(&self) -> Result<(), BenorError> {
        self.cluster.validate()?;
        if !self.cluster.contains(self.node_id) {
            return Err(BenorError::Config(format!(
                "node id {} outside cluster of {} nodes",
                self.node_id, self.cluster.nodes
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resilience_bound() {
        assert!(ClusterConfig::new(4, 1).validate().is_ok());
        assert!(ClusterConfig::new(7, 2).validate().is_ok());
        assert!(ClusterConfig::new(3, 1).validate().is_err());
        assert!(ClusterConfig::new(6, 2).validate().is_err());
        assert!(ClusterConfig::new(0, 0).validate().is_err());
    }

    #[test]
    fn test_quorum_threshold() {
        assert_eq!(ClusterConfig::new(4, 1).quorum(), 3);
        assert_eq!(ClusterConfig::new(10, 3).quorum(), 7);
    }

    #[test]
    fn test_node_id_bounds() {
        let cluster = ClusterConfig::new(4, 1);
        assert!(NodeConfig::new(NodeId::new(3), cluster.clone(), Value::One)
            .validate()
            .is_ok());
        assert!(NodeConfig::new(NodeId::new(4), cluster, Value::One)
            .validate()
            .is_err());
    }

    #[test]
    fn test_port_assignment() {
        let cluster = ClusterConfig::default();
        assert_eq!(cluster.port_of(NodeId::new(0)), 3001);
        assert_eq!(cluster.port_of(NodeId::new(3)), 3004);
    }
}
