//! Main consensus engine implementation
//!
//! One `ConsensusEngine` per node runs the randomized binary consensus
//! round loop: broadcast a propose, gather a quorum, derive a vote
//! candidate, broadcast the vote, gather a quorum again, then decide,
//! adopt the biased value, or flip the local coin.
//!
//! Safety rests on quorum intersection: any two sets of N-F senders
//! overlap in at least N-2F >= F+1 nodes (given N > 3F), and within one
//! round only a single concrete value can clear the strict propose
//! majority, so two nodes can never decide different values. Liveness
//! comes from the bias rule plus independent local coins: once every
//! correct node holds the same value, the next round decides it.

use crate::store::MessageStore;
use crate::tally::{self, VoteOutcome};
use benor_core::{
    BenorError, BenorResult, EnginePhase, MessageKind, NodeConfig, NodeId, NodeState, NodeStatus,
    ProtocolMessage, Transport, Value,
};
use parking_lot::RwLock;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// How far an inbound step may stray from the node's current round.
const STEP_WINDOW: u64 = 1;

/// Why a phase wait ended.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum WaitOutcome {
    Quorum,
    TimedOut,
    Killed,
}

/// Per-node consensus engine.
///
/// All fields use interior mutability so the engine can be shared behind
/// an `Arc` between the round-loop task, the control surface and any
/// number of concurrent message producers.
pub struct ConsensusEngine {
    config: NodeConfig,
    state: RwLock<NodeState>,
    phase: RwLock<EnginePhase>,
    running: AtomicBool,
    store: MessageStore,
    transport: Arc<dyn Transport>,
}

impl ConsensusEngine {
    pub fn new(config: NodeConfig, transport: Arc<dyn Transport>) -> Self {
        let state = if config.faulty {
            NodeState::faulty()
        } else {
            NodeState::initial(config.initial_value)
        };

        Self {
            config,
            state: RwLock::new(state),
            phase: RwLock::new(EnginePhase::Idle),
            running: AtomicBool::new(false),
            store: MessageStore::new(),
            transport,
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.config.node_id
    }

    /// Current lifecycle state of the engine task.
    pub fn phase(&self) -> EnginePhase {
        *self.phase.read()
    }

    /// Snapshot of the node state.
    pub fn snapshot(&self) -> NodeState {
        *self.state.read()
    }

    pub fn status(&self) -> NodeStatus {
        if self.config.faulty {
            NodeStatus::Faulty
        } else if self.state.read().killed {
            NodeStatus::Killed
        } else {
            NodeStatus::Live
        }
    }

    /// Reset the node state to its baseline and spawn the round loop.
    ///
    /// Rejected on a faulty node, and while a previous loop is still
    /// active: the atomic swap guarantees at most one loop per node, so a
    /// racing second `start` cannot cause duplicate broadcasts.
    pub fn start(self: &Arc<Self>) -> BenorResult<()> {
        if self.config.faulty {
            return Err(BenorError::FaultyNode);
        }
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(BenorError::AlreadyRunning);
        }

        *self.state.write() = NodeState::initial(self.config.initial_value);
        *self.phase.write() = EnginePhase::Idle;

        let engine = Arc::clone(self);
        tokio::spawn(async move {
            engine.run_loop().await;
        });

        Ok(())
    }

    /// Mark the node killed. Idempotent, valid in every state; the round
    /// loop observes the flag at its next checkpoint.
    pub fn stop(&self) {
        let mut state = self.state.write();
        if !state.killed {
            state.killed = true;
            info!(node = %self.config.node_id, "node stopped");
        }
    }

    /// Validate and record an inbound protocol message.
    ///
    /// Invalid messages are never stored and never advance a round.
    pub fn deliver(&self, message: ProtocolMessage) -> BenorResult<()> {
        if self.config.faulty {
            return Err(BenorError::FaultyNode);
        }

        let current = {
            let state = self.state.read();
            if state.killed {
                return Err(BenorError::NodeKilled);
            }
            state.k.unwrap_or(0)
        };

        if !self.config.cluster.contains(message.sender) {
            debug!(node = %self.config.node_id, %message, "dropping message from unknown sender");
            return Err(BenorError::UnknownSender {
                sender: message.sender.as_u32(),
                nodes: self.config.cluster.nodes,
            });
        }

        if message.kind == MessageKind::Propose && message.value.is_no_majority() {
            debug!(node = %self.config.node_id, %message, "dropping propose without a concrete value");
            return Err(BenorError::MalformedMessage(
                "propose must carry a concrete value".into(),
            ));
        }

        if message.step + STEP_WINDOW < current || message.step > current + STEP_WINDOW {
            debug!(node = %self.config.node_id, %message, current, "dropping message outside the round window");
            return Err(BenorError::RoundOutOfRange {
                step: message.step,
                current,
            });
        }

        self.store.record(message);
        Ok(())
    }

    fn is_killed(&self) -> bool {
        self.state.read().killed
    }

    fn set_phase(&self, phase: EnginePhase) {
        *self.phase.write() = phase;
    }

    /// The round loop. Runs until the node decides or is killed.
    async fn run_loop(self: Arc<Self>) {
        let id = self.config.node_id;
        let nodes = self.config.cluster.nodes;
        let faults = self.config.cluster.faults;
        info!(node = %id, nodes, faults, "consensus loop started");

        loop {
            if self.is_killed() {
                break;
            }
            let (x, k) = {
                let state = self.state.read();
                match (state.x, state.k) {
                    (Some(x), Some(k)) => (x, k),
                    _ => break,
                }
            };

            // Propose phase: our own message counts toward the quorum.
            self.set_phase(EnginePhase::Proposing);
            let propose = ProtocolMessage::propose(x, k, id);
            self.store.record(propose);
            self.broadcast(propose).await;
            if self
                .wait_for_quorum(k, MessageKind::Propose, self.propose_timeout())
                .await
                == WaitOutcome::Killed
            {
                break;
            }

            let proposals = self.store.query(k, MessageKind::Propose);
            let candidate = tally::majority_candidate(&proposals, nodes);
            debug!(node = %id, round = k, %candidate, received = proposals.len(), "propose phase resolved");

            // Vote phase.
            self.set_phase(EnginePhase::Voting);
            let vote = ProtocolMessage::vote(candidate, k, id);
            self.store.record(vote);
            self.broadcast(vote).await;
            if self
                .wait_for_quorum(k, MessageKind::Vote, self.vote_timeout())
                .await
                == WaitOutcome::Killed
            {
                break;
            }

            let votes = self.store.query(k, MessageKind::Vote);
            let next = k + 1;
            match tally::evaluate_votes(&votes, nodes, faults) {
                VoteOutcome::Decide(v) => {
                    {
                        let mut state = self.state.write();
                        state.x = Some(v);
                        state.decided = Some(true);
                        state.k = Some(next);
                    }
                    info!(node = %id, round = k, value = %v, "decided");
                    self.lame_duck_round(v, next).await;
                    self.set_phase(EnginePhase::Decided);
                    break;
                }
                VoteOutcome::Adopt(v) => {
                    debug!(node = %id, round = k, value = %v, "adopting biased value");
                    let mut state = self.state.write();
                    state.x = Some(v);
                    state.k = Some(next);
                }
                VoteOutcome::Flip => {
                    let v = if rand::thread_rng().gen::<bool>() {
                        Value::One
                    } else {
                        Value::Zero
                    };
                    debug!(node = %id, round = k, value = %v, "no bias threshold met, flipped local coin");
                    let mut state = self.state.write();
                    state.x = Some(v);
                    state.k = Some(next);
                }
            }

            self.store.prune(next.saturating_sub(STEP_WINDOW));
        }

        if self.is_killed() {
            self.set_phase(EnginePhase::Killed);
        }
        self.running.store(false, Ordering::Release);
        info!(node = %id, phase = %self.phase(), "consensus loop exited");
    }

    /// One further propose/vote broadcast after deciding, so peers one
    /// round behind can still assemble their quorums.
    async fn lame_duck_round(&self, value: Value, step: u64) {
        let id = self.config.node_id;
        let propose = ProtocolMessage::propose(value, step, id);
        self.store.record(propose);
        self.broadcast(propose).await;

        let vote = ProtocolMessage::vote(value.into(), step, id);
        self.store.record(vote);
        self.broadcast(vote).await;
    }

    /// Best-effort broadcast. A kill observed here suppresses the send;
    /// transport failures are logged and otherwise ignored.
    async fn broadcast(&self, message: ProtocolMessage) {
        if self.is_killed() {
            return;
        }
        if let Err(e) = self.transport.broadcast(message).await {
            warn!(node = %self.config.node_id, error = %e, "broadcast failed");
        }
    }

    /// Wait until `(step, kind)` holds messages from a quorum of distinct
    /// senders, the timeout elapses, or the node is killed. The kill flag
    /// is re-checked every poll interval so `stop` takes effect promptly.
    async fn wait_for_quorum(&self, step: u64, kind: MessageKind, timeout: Duration) -> WaitOutcome {
        let quorum = self.config.cluster.quorum();
        let poll = Duration::from_millis(self.config.consensus.poll_interval_ms.max(1));
        let deadline = Instant::now() + timeout;

        loop {
            if self.is_killed() {
                return WaitOutcome::Killed;
            }
            if self.store.distinct_senders(step, kind) >= quorum {
                return WaitOutcome::Quorum;
            }
            if Instant::now() >= deadline {
                debug!(node = %self.config.node_id, round = step, %kind, "phase timed out short of quorum");
                return WaitOutcome::TimedOut;
            }
            sleep(poll).await;
        }
    }

    fn propose_timeout(&self) -> Duration {
        Duration::from_millis(self.config.consensus.propose_timeout_ms)
    }

    fn vote_timeout(&self) -> Duration {
        Duration::from_millis(self.config.consensus.vote_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use benor_core::{Candidate, ClusterConfig, ConsensusConfig};

    /// Transport that drops everything; enough for single-engine tests.
    struct NullTransport;

    #[async_trait::async_trait]
    impl Transport for NullTransport {
        async fn broadcast(&self, _message: ProtocolMessage) -> BenorResult<()> {
            Ok(())
        }
    }

    fn test_config(faulty: bool) -> NodeConfig {
        let mut config = NodeConfig::new(
            NodeId::new(0),
            ClusterConfig::new(4, 1),
            Value::One,
        );
        config.faulty = faulty;
        config.consensus = ConsensusConfig {
            propose_timeout_ms: 50,
            vote_timeout_ms: 50,
            poll_interval_ms: 5,
        };
        config
    }

    fn test_engine(faulty: bool) -> Arc<ConsensusEngine> {
        Arc::new(ConsensusEngine::new(test_config(faulty), Arc::new(NullTransport)))
    }

    async fn wait_until_stopped(engine: &Arc<ConsensusEngine>) {
        while engine.running.load(Ordering::Acquire) {
            sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn test_faulty_node_cannot_start() {
        let engine = test_engine(true);
        assert!(matches!(engine.start(), Err(BenorError::FaultyNode)));
        assert_eq!(engine.snapshot(), NodeState::faulty());
        assert_eq!(engine.status(), NodeStatus::Faulty);
    }

    #[tokio::test]
    async fn test_second_start_rejected_while_running() {
        let engine = test_engine(false);
        engine.start().unwrap();
        assert!(matches!(engine.start(), Err(BenorError::AlreadyRunning)));
        engine.stop();
        wait_until_stopped(&engine).await;
    }

    #[tokio::test]
    async fn test_stop_is_idempotent_and_prompt() {
        let engine = test_engine(false);
        engine.start().unwrap();
        sleep(Duration::from_millis(10)).await;

        engine.stop();
        engine.stop();
        wait_until_stopped(&engine).await;

        assert!(engine.snapshot().killed);
        assert_eq!(engine.phase(), EnginePhase::Killed);
        assert_eq!(engine.status(), NodeStatus::Killed);
    }

    #[tokio::test]
    async fn test_fresh_start_resets_round_counter() {
        let engine = test_engine(false);
        engine.start().unwrap();
        // let a few timed-out rounds advance k
        sleep(Duration::from_millis(250)).await;
        engine.stop();
        wait_until_stopped(&engine).await;
        assert!(engine.snapshot().k.unwrap() > 0);

        engine.start().unwrap();
        let snapshot = engine.snapshot();
        assert!(!snapshot.killed);
        assert_eq!(snapshot.k, Some(0));
        assert_eq!(snapshot.decided, Some(false));
        assert_eq!(snapshot.x, Some(Value::One));
        engine.stop();
        wait_until_stopped(&engine).await;
    }

    #[tokio::test]
    async fn test_deliver_validation() {
        let engine = test_engine(false);

        let unknown = ProtocolMessage::propose(Value::One, 0, NodeId::new(9));
        assert!(matches!(
            engine.deliver(unknown),
            Err(BenorError::UnknownSender { sender: 9, .. })
        ));

        let far = ProtocolMessage::propose(Value::One, 5, NodeId::new(1));
        assert!(matches!(
            engine.deliver(far),
            Err(BenorError::RoundOutOfRange { step: 5, current: 0 })
        ));

        let marker = ProtocolMessage {
            kind: MessageKind::Propose,
            value: Candidate::NoMajority,
            step: 0,
            sender: NodeId::new(1),
        };
        assert!(matches!(
            engine.deliver(marker),
            Err(BenorError::MalformedMessage(_))
        ));

        // nothing was stored
        assert!(engine.store.is_empty());

        let ok = ProtocolMessage::propose(Value::One, 0, NodeId::new(1));
        engine.deliver(ok).unwrap();
        engine.deliver(ok).unwrap();
        assert_eq!(engine.store.distinct_senders(0, MessageKind::Propose), 1);
    }

    #[tokio::test]
    async fn test_deliver_rejected_when_killed_or_faulty() {
        let engine = test_engine(false);
        engine.stop();
        let message = ProtocolMessage::propose(Value::One, 0, NodeId::new(1));
        assert!(matches!(engine.deliver(message), Err(BenorError::NodeKilled)));

        let faulty = test_engine(true);
        assert!(matches!(faulty.deliver(message), Err(BenorError::FaultyNode)));
    }
}
