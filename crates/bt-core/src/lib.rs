//! Shared types and error kinds for the bittrack change-tracking core.
//!
//! This crate has no logic of its own — it is the vocabulary every other
//! crate in the workspace (`bt-bitmap`, `bt-engine`, `bt-interceptor`,
//! `bt-coordinator`, `bt-plugin`) builds on.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{
    BlockId, BlockMetadata, BlockState, EngineStats, EventKind, EventRecord, Timestamp, WalOffset,
};
