//! Error types for benor

use thiserror::Error;

/// Main error type for benor
#[derive(Error, Debug)]
pub enum BenorError {
    // ============ Lifecycle Errors ============
    #[error("faulty node cannot participate in consensus")]
    FaultyNode,

    #[error("node is killed")]
    NodeKilled,

    #[error("consensus loop is already running")]
    AlreadyRunning,

    // ============ Message Errors ============
    #[error("unknown sender {sender} in a cluster of {nodes} nodes")]
    UnknownSender { sender: u32, nodes: usize },

    #[error("step {step} is out of range for current round {current}")]
    RoundOutOfRange { step: u64, current: u64 },

    #[error("malformed message: {0}")]
    MalformedMessage(String),

    // ============ Configuration Errors ============
    #[error("configuration error: {0}")]
    Config(String),

    // ============ Network Errors ============
    #[error("transport error: {0}")]
    Transport(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<serde_json::Error> for BenorError {
    fn from(err: serde_json::Error) -> Self {
        BenorError::MalformedMessage(err.to_string())
    }
}
