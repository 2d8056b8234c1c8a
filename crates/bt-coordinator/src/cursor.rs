//! Cursor types for batch streaming (spec §4.6, §3 "Cursor").

/// Which index (or both) a cursor's range query walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CursorType {
    Time,
    Wal,
    Hybrid,
}

/// Inclusive bounds a cursor was created with. `Hybrid` uses both pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorBounds {
    pub start_time: i64,
    pub end_time: i64,
    pub start_wal: u64,
    pub end_wal: u64,
}

/// Opaque handle a caller holds; the coordinator owns the actual cursor
/// state in its cursor table (spec §6 "opaque cursor handle").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CursorHandle(pub u64);

/// Per-cursor streaming state. Cursors take no snapshot (spec §4.6):
/// concurrent index updates are visible to the next `get_next_batch` call.
///
/// `last_id` is the highest block id returned by the previous batch; since
/// the engine always extracts ids in ascending order, filtering on it is
/// enough to avoid re-returning a block across calls without requiring the
/// engine to support paginated range queries itself.
pub struct Cursor {
    pub cursor_type: CursorType,
    pub bounds: CursorBounds,
    pub(crate) last_id: Option<u64>,
    pub has_more: bool,
}

impl Cursor {
    pub fn new(cursor_type: CursorType, bounds: CursorBounds) -> Self {
        Cursor {
            cursor_type,
            bounds,
            last_id: None,
            has_more: true,
        }
    }
}

/// One extracted block record (spec §4.6 step 3). The payload slot is
/// always `None`: the core never materializes block bytes, only identity
/// and change metadata — the caller reads payloads from the storage engine.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BlockRecord {
    pub block_id: u64,
    pub wal_offset: u64,
    pub timestamp: i64,
    pub state: bt_core::BlockState,
    pub payload: Option<Vec<u8>>,
}

/// Result of one `get_next_batch` call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Batch {
    pub records: Vec<BlockRecord>,
    pub has_more: bool,
}
