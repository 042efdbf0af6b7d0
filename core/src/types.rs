//! Core types for the benor consensus network
//!
//! Defines the protocol domain: binary values, vote candidates, protocol
//! messages and per-node state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A binary consensus value.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Value {
    Zero,
    One,
}

impl Value {
    pub fn as_u8(&self) -> u8 {
        match self {
            Value::Zero => 0,
            Value::One => 1,
        }
    }
}

impl From<Value> for u8 {
    fn from(value: Value) -> Self {
        value.as_u8()
    }
}

impl TryFrom<u8> for Value {
    type Error = String;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(Value::Zero),
            1 => Ok(Value::One),
            other => Err(format!("binary value out of domain: {}", other)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value({})", self.as_u8())
    }
}

/// A vote-phase candidate: either a concrete binary value or the
/// no-majority marker emitted when no value cleared the propose majority.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Candidate {
    Value(Value),
    NoMajority,
}

impl Candidate {
    /// The concrete value, if any.
    pub fn concrete(&self) -> Option<Value> {
        match self {
            Candidate::Value(v) => Some(*v),
            Candidate::NoMajority => None,
        }
    }

    pub fn is_no_majority(&self) -> bool {
        matches!(self, Candidate::NoMajority)
    }
}

impl From<Value> for Candidate {
    fn from(value: Value) -> Self {
        Candidate::Value(value)
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Candidate::Value(v) => write!(f, "{}", v),
            Candidate::NoMajority => write!(f, "?"),
        }
    }
}

impl fmt::Debug for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Candidate({})", self)
    }
}

/// Node identifier, valid in `[0, N)` for a cluster of N nodes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn new(id: u32) -> Self {
        NodeId(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }

    pub fn as_usize(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node:{}", self.0)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// The two message rounds of a consensus step.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum MessageKind {
    Propose,
    Vote,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Propose => "propose",
            MessageKind::Vote => "vote",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A protocol message exchanged between nodes.
///
/// Propose messages always carry a concrete value; vote messages may carry
/// the no-majority marker.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ProtocolMessage {
    pub kind: MessageKind,
    pub value: Candidate,
    pub step: u64,
    pub sender: NodeId,
}

impl ProtocolMessage {
    pub fn propose(value: Value, step: u64, sender: NodeId) -> Self {
        Self {
            kind: MessageKind::Propose,
            value: Candidate::Value(value),
            step,
            sender,
        }
    }

    pub fn vote(value: Candidate, step: u64, sender: NodeId) -> Self {
        Self {
            kind: MessageKind::Vote,
            value,
            step,
            sender,
        }
    }
}

impl fmt::Display for ProtocolMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({}) step={} from {}",
            self.kind, self.value, self.step, self.sender
        )
    }
}

/// Per-node protocol state, as exposed by the state snapshot endpoint.
///
/// A faulty node holds the all-absent baseline for its entire lifetime:
/// `x`, `decided` and `k` stay `None` and serialize as `null`.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct NodeState {
    pub killed: bool,
    pub x: Option<Value>,
    pub decided: Option<bool>,
    pub k: Option<u64>,
}

impl NodeState {
    /// Baseline for a correct node about to run the protocol.
    pub fn initial(value: Value) -> Self {
        Self {
            killed: false,
            x: Some(value),
            decided: Some(false),
            k: Some(0),
        }
    }

    /// Permanent state of a faulty node.
    pub fn faulty() -> Self {
        Self {
            killed: false,
            x: None,
            decided: None,
            k: None,
        }
    }

    pub fn is_decided(&self) -> bool {
        self.decided == Some(true)
    }
}

/// Liveness of a node as reported by the status endpoint.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NodeStatus {
    Live,
    Faulty,
    Killed,
}

impl NodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::Live => "live",
            NodeStatus::Faulty => "faulty",
            NodeStatus::Killed => "killed",
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, NodeStatus::Live)
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable lifecycle of the engine task.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EnginePhase {
    Idle,
    Proposing,
    Voting,
    Decided,
    Killed,
}

impl fmt::Display for EnginePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EnginePhase::Idle => "idle",
            EnginePhase::Proposing => "proposing",
            EnginePhase::Voting => "voting",
            EnginePhase::Decided => "decided",
            EnginePhase::Killed => "killed",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_u8_roundtrip() {
        assert_eq!(Value::try_from(0u8).unwrap(), Value::Zero);
        assert_eq!(Value::try_from(1u8).unwrap(), Value::One);
        assert!(Value::try_from(2u8).is_err());
        assert_eq!(u8::from(Value::One), 1);
    }

    #[test]
    fn test_faulty_state_serializes_nulls() {
        let json = serde_json::to_value(NodeState::faulty()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"killed": false, "x": null, "decided": null, "k": null})
        );
    }

    #[test]
    fn test_initial_state_snapshot_shape() {
        let json = serde_json::to_value(NodeState::initial(Value::One)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"killed": false, "x": 1, "decided": false, "k": 0})
        );
    }

    #[test]
    fn test_candidate_concrete() {
        assert_eq!(Candidate::from(Value::Zero).concrete(), Some(Value::Zero));
        assert_eq!(Candidate::NoMajority.concrete(), None);
        assert!(Candidate::NoMajority.is_no_majority());
    }
}
