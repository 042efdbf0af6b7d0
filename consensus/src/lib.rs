//! benor Consensus Engine
//!
//! Randomized binary consensus in the style of Ben-Or:
//! - two message rounds per step (propose, then vote)
//! - quorum thresholds sized for N > 3F crash faults
//! - majority bias plus an independent local coin to break ties

pub mod engine;
pub mod local;
pub mod store;
pub mod tally;

pub use engine::*;
pub use local::*;
pub use store::*;
pub use tally::*;
