//! Node runtime combining the engine, its transport and readiness signaling

use benor_consensus::ConsensusEngine;
use benor_core::{
    BenorResult, NodeConfig, NodeId, NodeState, NodeStatus, ProtocolMessage, Transport,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::debug;

/// Single-fire readiness notification.
///
/// The orchestrator holds the receiver; only the first `fire` delivers,
/// so a node can never announce readiness twice.
pub struct ReadySignal {
    tx: Mutex<Option<oneshot::Sender<NodeId>>>,
}

impl ReadySignal {
    pub fn new() -> (Self, oneshot::Receiver<NodeId>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                tx: Mutex::new(Some(tx)),
            },
            rx,
        )
    }

    fn fire(&self, id: NodeId) -> bool {
        match self.tx.lock().take() {
            Some(tx) => tx.send(id).is_ok(),
            None => false,
        }
    }
}

/// Per-node runtime: owns the consensus engine and exposes the control
/// operations the HTTP surface serves.
pub struct NodeRuntime {
    config: NodeConfig,
    engine: Arc<ConsensusEngine>,
    ready: ReadySignal,
}

impl NodeRuntime {
    /// Build a runtime and the readiness receiver for the orchestrator.
    pub fn new(
        config: NodeConfig,
        transport: Arc<dyn Transport>,
    ) -> BenorResult<(Arc<Self>, oneshot::Receiver<NodeId>)> {
        config.validate()?;
        let engine = Arc::new(ConsensusEngine::new(config.clone(), transport));
        let (ready, ready_rx) = ReadySignal::new();

        let runtime = Arc::new(Self {
            config,
            engine,
            ready,
        });
        Ok((runtime, ready_rx))
    }

    pub fn node_id(&self) -> NodeId {
        self.config.node_id
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Begin the consensus run; fails on faulty nodes and while a run is
    /// already active.
    pub fn start(&self) -> BenorResult<()> {
        self.engine.start()
    }

    /// Kill the node. Always succeeds, including on faulty nodes.
    pub fn stop(&self) {
        self.engine.stop();
    }

    pub fn status(&self) -> NodeStatus {
        self.engine.status()
    }

    pub fn snapshot(&self) -> NodeState {
        self.engine.snapshot()
    }

    /// Route an inbound protocol message into the engine.
    pub fn deliver(&self, message: ProtocolMessage) -> BenorResult<()> {
        self.engine.deliver(message)
    }

    /// Announce that the inbound channel is active. Only the first call
    /// notifies the orchestrator; later calls are no-ops.
    pub fn announce_ready(&self) {
        if self.ready.fire(self.config.node_id) {
            debug!(node = %self.config.node_id, "announced ready");
        }
    }
}
