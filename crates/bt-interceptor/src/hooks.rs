//! Storage-engine hook interface (spec §6, §9 AMBIENT).
//!
//! The core never reaches into the host database to read a block id or WAL
//! offset itself — it only defines this trait. A real integration module
//! implements it at the point where the storage engine's own write path
//! actually knows `(block_id, wal_offset, timestamp)`. This isolates the
//! extraction point the original plugin left as TODOs (spec §9).

use bt_core::{BlockId, Timestamp, WalOffset};

/// The four block-mutation callbacks the storage engine raises.
pub trait StorageHooks: Send + Sync {
    fn on_block_create(&self, block_id: BlockId, wal_offset: WalOffset, timestamp: Timestamp);
    fn on_block_update(&self, block_id: BlockId, wal_offset: WalOffset, timestamp: Timestamp);
    fn on_block_flush(&self, block_id: BlockId, wal_offset: WalOffset, timestamp: Timestamp);
    fn on_block_delete(&self, block_id: BlockId, wal_offset: WalOffset, timestamp: Timestamp);
}

#[cfg(test)]
pub(crate) struct NullHooks;

#[cfg(test)]
impl StorageHooks for NullHooks {
    fn on_block_create(&self, _: BlockId, _: WalOffset, _: Timestamp) {}
    fn on_block_update(&self, _: BlockId, _: WalOffset, _: Timestamp) {}
    fn on_block_flush(&self, _: BlockId, _: WalOffset, _: Timestamp) {}
    fn on_block_delete(&self, _: BlockId, _: WalOffset, _: Timestamp) {}
}
