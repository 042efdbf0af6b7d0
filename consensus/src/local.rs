//! In-memory transport wiring a set of engines together in one process
//!
//! Used by tests and in-process clusters; delivery is synchronous and
//! still best-effort, since a peer may reject any message.

use crate::engine::ConsensusEngine;
use async_trait::async_trait;
use benor_core::{BenorResult, NodeId, ProtocolMessage, Transport};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Registry of in-process engines reachable from each other.
#[derive(Default)]
pub struct LocalNetwork {
    nodes: RwLock<HashMap<NodeId, Arc<ConsensusEngine>>>,
}

impl LocalNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(&self, engine: Arc<ConsensusEngine>) {
        self.nodes.write().insert(engine.node_id(), engine);
    }

    /// Transport handle for one member of the network.
    pub fn transport(self: &Arc<Self>, origin: NodeId) -> Arc<LocalTransport> {
        Arc::new(LocalTransport {
            origin,
            network: Arc::clone(self),
        })
    }

    fn peers_of(&self, origin: NodeId) -> Vec<Arc<ConsensusEngine>> {
        self.nodes
            .read()
            .iter()
            .filter(|(id, _)| **id != origin)
            .map(|(_, engine)| Arc::clone(engine))
            .collect()
    }
}

/// Per-node transport delivering straight into peer engines.
pub struct LocalTransport {
    origin: NodeId,
    network: Arc<LocalNetwork>,
}

#[async_trait]
impl Transport for LocalTransport {
    async fn broadcast(&self, message: ProtocolMessage) -> BenorResult<()> {
        for peer in self.network.peers_of(self.origin) {
            if let Err(e) = peer.deliver(message) {
                debug!(origin = %self.origin, peer = %peer.node_id(), error = %e, "delivery rejected");
            }
        }
        Ok(())
    }
}
