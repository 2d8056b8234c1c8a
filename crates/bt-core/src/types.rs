//! Foundational types for the change-tracking core.
//!
//! - [`BlockId`], [`WalOffset`], [`Timestamp`]: distinct newtypes over the raw
//!   `u64`/`i64` values so a WAL offset can't be passed where a timestamp is
//!   expected at the public API boundary.
//! - [`BlockState`]: the four-state machine of spec §3, with the fixed
//!   transition matrix as the only correctness gate on event ordering.
//! - [`BlockMetadata`]: the one record the engine holds per known block.
//! - [`EventKind`] / [`EventRecord`]: what producers enqueue and workers
//!   consume (spec §3, §4.5).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque 64-bit block identifier, externally assigned by the storage engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockId(pub u64);

impl BlockId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for BlockId {
    fn from(v: u64) -> Self {
        BlockId(v)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Byte position within the storage engine's write-ahead log; monotone,
/// used as a logical clock independent of wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WalOffset(pub u64);

impl WalOffset {
    pub fn get(self) -> u64 {
        self.0
    }

    /// Index keys are signed (`i64`) to share the ordered-index type with
    /// timestamps; WAL offsets never approach `i64::MAX` in practice.
    pub fn as_index_key(self) -> i64 {
        self.0 as i64
    }
}

impl From<u64> for WalOffset {
    fn from(v: u64) -> Self {
        WalOffset(v)
    }
}

impl fmt::Display for WalOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Wall-clock timestamp in nanoseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for Timestamp {
    fn from(v: i64) -> Self {
        Timestamp(v)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Mutation category a block is currently in.
///
/// Transitions are fixed (spec §3):
///
/// ```text
/// From\To    CLEAN  DIRTY  NEW    DELETED
/// CLEAN      —      yes    yes    yes
/// DIRTY      yes    —      no     yes
/// NEW        no     yes    —      yes
/// DELETED    no     no     no     —    (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockState {
    Clean,
    Dirty,
    New,
    Deleted,
}

impl BlockState {
    /// Whether `self -> to` is a legal transition under the matrix above.
    ///
    /// An absent block is treated as `Clean` (spec §9: "unknown is
    /// equivalent to CLEAN"), so the first-ever `mark_new` for an id is legal.
    pub fn can_transition_to(self, to: BlockState) -> bool {
        use BlockState::*;
        matches!(
            (self, to),
            (Clean, Dirty) | (Clean, New) | (Clean, Deleted) |
            (Dirty, Clean) | (Dirty, Deleted) |
            (New, Dirty) | (New, Deleted)
        )
    }
}

impl fmt::Display for BlockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BlockState::Clean => "CLEAN",
            BlockState::Dirty => "DIRTY",
            BlockState::New => "NEW",
            BlockState::Deleted => "DELETED",
        };
        write!(f, "{s}")
    }
}

/// The one record the engine holds per known block (spec §3).
///
/// Created on the first event for a block id; destroyed only when the block
/// transitions back to `Clean` via `clear_block`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMetadata {
    pub block_id: BlockId,
    pub wal_offset: WalOffset,
    pub timestamp: Timestamp,
    pub state: BlockState,
}

/// Kind of block-level mutation event raised by the storage engine (spec §3, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Create,
    Update,
    Flush,
    Delete,
}

/// Event enqueued by a producer and consumed by the interceptor's worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub kind: EventKind,
    pub block_id: BlockId,
    pub wal_offset: WalOffset,
    pub timestamp: Timestamp,
}

/// Aggregate counts returned by `get_stats` (spec §4.4).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    pub total: u64,
    pub dirty: u64,
    pub new: u64,
    pub deleted: u64,
}
