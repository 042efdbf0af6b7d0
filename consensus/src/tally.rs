//! Quorum evaluation over collected message sets

use benor_core::{Candidate, ProtocolMessage, Value};

/// Result of evaluating a round's vote set.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum VoteOutcome {
    /// A value reached the decision threshold (>= N - F votes).
    Decide(Value),
    /// A value reached the bias threshold (>= F + 1 votes); adopt it for
    /// the next round.
    Adopt(Value),
    /// No value reached the bias threshold; fall back to the local coin.
    Flip,
}

/// Count the concrete values in a message set, ignoring markers.
fn count_values(messages: &[ProtocolMessage]) -> (usize, usize) {
    let mut zeros = 0;
    let mut ones = 0;
    for message in messages {
        match message.value.concrete() {
            Some(Value::Zero) => zeros += 1,
            Some(Value::One) => ones += 1,
            None => {}
        }
    }
    (zeros, ones)
}

/// Vote candidate from a collected propose set: a concrete value if it
/// appears strictly more than N/2 times, otherwise the no-majority marker.
pub fn majority_candidate(proposals: &[ProtocolMessage], nodes: usize) -> Candidate {
    let (zeros, ones) = count_values(proposals);
    if 2 * zeros > nodes {
        Candidate::Value(Value::Zero)
    } else if 2 * ones > nodes {
        Candidate::Value(Value::One)
    } else {
        Candidate::NoMajority
    }
}

/// Apply the decision rule to a collected vote set.
///
/// Within one round at most one concrete value can be voted at all (a vote
/// for v requires a strict propose majority for v, and two strict
/// majorities cannot coexist among N senders), so the decide and adopt
/// thresholds can only ever be met by a single value.
pub fn evaluate_votes(votes: &[ProtocolMessage], nodes: usize, faults: usize) -> VoteOutcome {
    let (zeros, ones) = count_values(votes);
    let (value, count) = if zeros >= ones {
        (Value::Zero, zeros)
    } else {
        (Value::One, ones)
    };

    if count >= nodes - faults {
        VoteOutcome::Decide(value)
    } else if count >= faults + 1 {
        VoteOutcome::Adopt(value)
    } else {
        VoteOutcome::Flip
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use benor_core::NodeId;

    fn proposals(values: &[Value]) -> Vec<ProtocolMessage> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| ProtocolMessage::propose(*v, 0, NodeId::new(i as u32)))
            .collect()
    }

    fn votes(values: &[Candidate]) -> Vec<ProtocolMessage> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| ProtocolMessage::vote(*v, 0, NodeId::new(i as u32)))
            .collect()
    }

    #[test]
    fn test_majority_requires_strictly_more_than_half() {
        let set = proposals(&[Value::One, Value::One, Value::One]);
        assert_eq!(majority_candidate(&set, 4), Candidate::Value(Value::One));

        // two of four is not a strict majority
        let set = proposals(&[Value::One, Value::One, Value::Zero]);
        assert_eq!(majority_candidate(&set, 4), Candidate::NoMajority);

        assert_eq!(majority_candidate(&[], 4), Candidate::NoMajority);
    }

    #[test]
    fn test_decide_at_quorum() {
        let set = votes(&[
            Candidate::Value(Value::Zero),
            Candidate::Value(Value::Zero),
            Candidate::Value(Value::Zero),
        ]);
        assert_eq!(evaluate_votes(&set, 4, 1), VoteOutcome::Decide(Value::Zero));
    }

    #[test]
    fn test_adopt_at_bias_threshold() {
        let set = votes(&[
            Candidate::Value(Value::One),
            Candidate::Value(Value::One),
            Candidate::NoMajority,
        ]);
        assert_eq!(evaluate_votes(&set, 4, 1), VoteOutcome::Adopt(Value::One));
    }

    #[test]
    fn test_flip_when_no_value_reaches_bias() {
        let set = votes(&[
            Candidate::NoMajority,
            Candidate::NoMajority,
            Candidate::Value(Value::One),
        ]);
        assert_eq!(evaluate_votes(&set, 4, 1), VoteOutcome::Flip);

        assert_eq!(evaluate_votes(&[], 4, 1), VoteOutcome::Flip);
    }

    #[test]
    fn test_markers_never_decide() {
        let set = votes(&[
            Candidate::NoMajority,
            Candidate::NoMajority,
            Candidate::NoMajority,
            Candidate::NoMajority,
        ]);
        assert_eq!(evaluate_votes(&set, 4, 1), VoteOutcome::Flip);
    }
}
