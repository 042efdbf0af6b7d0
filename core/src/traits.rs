//! Core traits defining benor interfaces

use crate::error::BenorError;
use crate::types::ProtocolMessage;
use async_trait::async_trait;

/// Result type for benor operations
pub type BenorResult<T> = Result<T, BenorError>;

/// Message delivery capability injected into the consensus engine.
///
/// `broadcast` is best-effort delivery to every *other* node in the
/// cluster. Implementations swallow per-peer failures after logging them;
/// the protocol's quorum thresholds, not transport retries, provide fault
/// tolerance. The engine records its own copy of each message locally
/// before broadcasting, so transports never loop a message back to its
/// sender.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn broadcast(&self, message: ProtocolMessage) -> BenorResult<()>;
}
