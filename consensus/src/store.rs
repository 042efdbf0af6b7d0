//! Buffer of received protocol messages, indexed by round and phase

use benor_core::{MessageKind, NodeId, ProtocolMessage};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Concurrency-safe message log.
///
/// Messages are keyed by `(step, kind)` and, within a slot, by sender.
/// Recording a second message from the same sender for the same round and
/// phase overwrites the first, so a sender can never contribute more than
/// one message to a quorum count.
#[derive(Default)]
pub struct MessageStore {
    inner: RwLock<HashMap<(u64, MessageKind), HashMap<NodeId, ProtocolMessage>>>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the entry for `(step, kind, sender)`.
    pub fn record(&self, message: ProtocolMessage) {
        self.inner
            .write()
            .entry((message.step, message.kind))
            .or_default()
            .insert(message.sender, message);
    }

    /// Stable snapshot of the messages collected for a round phase.
    pub fn query(&self, step: u64, kind: MessageKind) -> Vec<ProtocolMessage> {
        self.inner
            .read()
            .get(&(step, kind))
            .map(|slot| slot.values().copied().collect())
            .unwrap_or_default()
    }

    /// Number of distinct senders recorded for a round phase.
    pub fn distinct_senders(&self, step: u64, kind: MessageKind) -> usize {
        self.inner
            .read()
            .get(&(step, kind))
            .map(|slot| slot.len())
            .unwrap_or(0)
    }

    /// Drop all entries for rounds strictly below `before_step`.
    pub fn prune(&self, before_step: u64) {
        self.inner
            .write()
            .retain(|(step, _), _| *step >= before_step);
    }

    /// Total number of stored messages across all rounds.
    pub fn len(&self) -> usize {
        self.inner.read().values().map(|slot| slot.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
