//! JSON wire format for protocol messages
//!
//! Values travel as `0`, `1` or the no-majority marker `"?"`; kinds as
//! `"propose"` / `"vote"`. Anything else is a malformed message.

use benor_core::{BenorError, BenorResult, Candidate, MessageKind, NodeId, ProtocolMessage, Value};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Wire shape of a protocol message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMessage {
    pub kind: String,
    pub value: serde_json::Value,
    pub step: u64,
    pub sender: u32,
}

impl WireMessage {
    pub fn from_message(message: &ProtocolMessage) -> Self {
        Self {
            kind: message.kind.as_str().to_string(),
            value: match message.value {
                Candidate::Value(v) => json!(v.as_u8()),
                Candidate::NoMajority => json!("?"),
            },
            step: message.step,
            sender: message.sender.as_u32(),
        }
    }

    /// Decode into a protocol message, rejecting out-of-domain fields.
    pub fn decode(&self) -> BenorResult<ProtocolMessage> {
        let kind = match self.kind.as_str() {
            "propose" => MessageKind::Propose,
            "vote" => MessageKind::Vote,
            other => {
                return Err(BenorError::MalformedMessage(format!(
                    "unknown message kind: {}",
                    other
                )))
            }
        };

        let value = match &self.value {
            serde_json::Value::Number(n) => match n.as_u64() {
                Some(0) => Candidate::Value(Value::Zero),
                Some(1) => Candidate::Value(Value::One),
                _ => {
                    return Err(BenorError::MalformedMessage(format!(
                        "value out of domain: {}",
                        self.value
                    )))
                }
            },
            serde_json::Value::String(s) if s == "?" => Candidate::NoMajority,
            _ => {
                return Err(BenorError::MalformedMessage(format!(
                    "value out of domain: {}",
                    self.value
                )))
            }
        };

        Ok(ProtocolMessage {
            kind,
            value,
            step: self.step,
            sender: NodeId::new(self.sender),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_propose_wire_shape() {
        let message = ProtocolMessage::propose(Value::One, 3, NodeId::new(2));
        let wire = WireMessage::from_message(&message);
        assert_eq!(
            serde_json::to_value(&wire).unwrap(),
            json!({"kind": "propose", "value": 1, "step": 3, "sender": 2})
        );
    }

    #[test]
    fn test_no_majority_travels_as_marker() {
        let message = ProtocolMessage::vote(Candidate::NoMajority, 5, NodeId::new(0));
        let wire = WireMessage::from_message(&message);
        assert_eq!(wire.value, json!("?"));
        assert_eq!(wire.decode().unwrap(), message);
    }

    #[test]
    fn test_decode_roundtrip() {
        let message = ProtocolMessage::vote(Candidate::Value(Value::Zero), 1, NodeId::new(3));
        assert_eq!(WireMessage::from_message(&message).decode().unwrap(), message);
    }

    #[test]
    fn test_decode_rejects_out_of_domain() {
        let bad_kind = WireMessage {
            kind: "gossip".into(),
            value: json!(1),
            step: 0,
            sender: 0,
        };
        assert!(matches!(
            bad_kind.decode(),
            Err(BenorError::MalformedMessage(_))
        ));

        let bad_value = WireMessage {
            kind: "vote".into(),
            value: json!(2),
            step: 0,
            sender: 0,
        };
        assert!(matches!(
            bad_value.decode(),
            Err(BenorError::MalformedMessage(_))
        ));

        let bad_marker = WireMessage {
            kind: "vote".into(),
            value: json!("!"),
            step: 0,
            sender: 0,
        };
        assert!(matches!(
            bad_marker.decode(),
            Err(BenorError::MalformedMessage(_))
        ));
    }
}
