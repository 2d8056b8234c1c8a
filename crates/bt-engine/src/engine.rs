//! Bitmap engine: state-machine-guarded updates and dual time/WAL indices
//! (spec §4.4).
//!
//! A single `parking_lot::RwLock` is the engine's one coarse lock (spec §5):
//! mark/clear take the write side, range queries take the read side, so
//! concurrent readers never block each other but always exclude writers.

use bt_bitmap::{Bitmap, OrderedIndex, RangeEnd};
use bt_core::{BlockId, BlockMetadata, BlockState, EngineStats, Error, Result, Timestamp, WalOffset};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::config::EngineConfig;

struct EngineState {
    metadata: FxHashMap<BlockId, BlockMetadata>,
    dirty: Bitmap,
    new: Bitmap,
    deleted: Bitmap,
    time_index: OrderedIndex,
    wal_index: OrderedIndex,
}

impl EngineState {
    fn bitmap_for_state_mut(&mut self, state: BlockState) -> Option<&mut Bitmap> {
        match state {
            BlockState::Dirty => Some(&mut self.dirty),
            BlockState::New => Some(&mut self.new),
            BlockState::Deleted => Some(&mut self.deleted),
            BlockState::Clean => None,
        }
    }
}

/// The bitmap engine: one coarse-locked table of block metadata plus three
/// disjoint dirty/new/deleted bitmaps and two ordered indices over them.
pub struct BitmapEngine {
    state: RwLock<EngineState>,
}

impl BitmapEngine {
    pub fn new(config: EngineConfig) -> Self {
        BitmapEngine {
            state: RwLock::new(EngineState {
                metadata: FxHashMap::with_capacity_and_hasher(
                    config.metadata_map_buckets,
                    Default::default(),
                ),
                dirty: Bitmap::new(),
                new: Bitmap::new(),
                deleted: Bitmap::new(),
                time_index: OrderedIndex::new(),
                wal_index: OrderedIndex::new(),
            }),
        }
    }

    fn transition(
        &self,
        id: BlockId,
        wal: WalOffset,
        ts: Timestamp,
        to: BlockState,
    ) -> Result<()> {
        let mut state = self.state.write();
        let from = state.metadata.get(&id).map(|m| m.state).unwrap_or(BlockState::Clean);

        if !from.can_transition_to(to) {
            trace!(block_id = %id, %from, %to, "rejected state transition");
            return Err(Error::InvalidStateTransition {
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        if let Some(bitmap) = state.bitmap_for_state_mut(from) {
            bitmap.remove(id.get());
        }
        if let Some(bitmap) = state.bitmap_for_state_mut(to) {
            bitmap.add(id.get());
        }

        state.metadata.insert(
            id,
            BlockMetadata {
                block_id: id,
                wal_offset: wal,
                timestamp: ts,
                state: to,
            },
        );

        state.time_index.insert_or_get(ts.get()).add(id.get());
        state.wal_index.insert_or_get(wal.as_index_key()).add(id.get());

        Ok(())
    }

    pub fn mark_dirty(&self, id: BlockId, wal: WalOffset, ts: Timestamp) -> Result<()> {
        self.transition(id, wal, ts, BlockState::Dirty)
    }

    pub fn mark_new(&self, id: BlockId, wal: WalOffset, ts: Timestamp) -> Result<()> {
        self.transition(id, wal, ts, BlockState::New)
    }

    pub fn mark_deleted(&self, id: BlockId, wal: WalOffset, ts: Timestamp) -> Result<()> {
        self.transition(id, wal, ts, BlockState::Deleted)
    }

    /// Transition a known block back to `CLEAN`, dropping its metadata.
    /// Only legal from `DIRTY` (spec §3 transition matrix).
    pub fn clear_block(&self, id: BlockId) -> Result<()> {
        let mut state = self.state.write();
        let Some(meta) = state.metadata.get(&id).copied() else {
            return Err(Error::BlockNotFound(id.get()));
        };

        if !meta.state.can_transition_to(BlockState::Clean) {
            return Err(Error::InvalidStateTransition {
                from: meta.state.to_string(),
                to: BlockState::Clean.to_string(),
            });
        }

        if let Some(bitmap) = state.bitmap_for_state_mut(meta.state) {
            bitmap.remove(id.get());
        }
        state.metadata.remove(&id);
        Ok(())
    }

    /// `⋃_{k∈[lo,hi]} (time_index[k] ∩ dirty)`, extracted into `out` (spec §4.4).
    pub fn get_dirty_blocks_by_time(&self, lo: i64, hi: i64, out: &mut Vec<u64>, max: usize) -> usize {
        let state = self.state.read();
        let mut acc = Bitmap::new();
        state.time_index.range_query(lo, hi, RangeEnd::Closed, |_, bucket| {
            acc.union_with(&bucket.intersection(&state.dirty));
        });
        acc.extract_into(out, max)
    }

    /// `⋃_{k∈[lo,hi]} (wal_index[k] ∩ dirty)`, extracted into `out` (spec §4.4).
    pub fn get_dirty_blocks_by_wal(&self, lo: u64, hi: u64, out: &mut Vec<u64>, max: usize) -> usize {
        let state = self.state.read();
        let mut acc = Bitmap::new();
        state
            .wal_index
            .range_query(lo as i64, hi as i64, RangeEnd::Closed, |_, bucket| {
                acc.union_with(&bucket.intersection(&state.dirty));
            });
        acc.extract_into(out, max)
    }

    pub fn get_block_metadata(&self, id: BlockId) -> Result<BlockMetadata> {
        self.state
            .read()
            .metadata
            .get(&id)
            .copied()
            .ok_or(Error::BlockNotFound(id.get()))
    }

    pub fn get_block_state(&self, id: BlockId) -> Result<BlockState> {
        self.get_block_metadata(id).map(|m| m.state)
    }

    /// Snapshot of `{total, dirty, new, deleted}`. `total` is the number of
    /// blocks with live metadata; dirty/new/deleted are read straight off
    /// the bitmap cardinalities rather than a separately maintained counter,
    /// so they stay correct under concurrent races (spec §4.4).
    pub fn get_stats(&self) -> EngineStats {
        let state = self.state.read();
        EngineStats {
            total: state.metadata.len() as u64,
            dirty: state.dirty.cardinality(),
            new: state.new.cardinality(),
            deleted: state.deleted.cardinality(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> BitmapEngine {
        BitmapEngine::new(EngineConfig::default())
    }

    #[test]
    fn state_machine_happy_path() {
        let e = engine();
        let id = BlockId(42);

        e.mark_new(id, WalOffset(100), Timestamp(1000)).unwrap();
        assert_eq!(e.get_block_state(id).unwrap(), BlockState::New);
        assert_eq!(e.get_stats().new, 1);

        e.mark_dirty(id, WalOffset(200), Timestamp(2000)).unwrap();
        assert_eq!(e.get_block_state(id).unwrap(), BlockState::Dirty);
        assert_eq!(e.get_stats().dirty, 1);
        assert_eq!(e.get_stats().new, 0);

        e.mark_deleted(id, WalOffset(300), Timestamp(3000)).unwrap();
        assert_eq!(e.get_block_state(id).unwrap(), BlockState::Deleted);

        let err = e.mark_dirty(id, WalOffset(400), Timestamp(4000)).unwrap_err();
        assert!(matches!(err, Error::InvalidStateTransition { .. }));
    }

    #[test]
    fn range_query_by_wal_returns_exact_set() {
        let e = engine();
        e.mark_dirty(BlockId(1001), WalOffset(1000), Timestamp(1)).unwrap();
        e.mark_dirty(BlockId(1002), WalOffset(2000), Timestamp(2)).unwrap();
        e.mark_dirty(BlockId(1003), WalOffset(3000), Timestamp(3)).unwrap();
        e.mark_dirty(BlockId(1004), WalOffset(4000), Timestamp(4)).unwrap();

        let mut out = Vec::new();
        let n = e.get_dirty_blocks_by_wal(1500, 3500, &mut out, 10);
        out.sort();
        assert_eq!(n, 2);
        assert_eq!(out, vec![1002, 1003]);
    }

    #[test]
    fn clear_block_requires_dirty_and_drops_metadata() {
        let e = engine();
        let id = BlockId(7);
        assert!(matches!(e.clear_block(id), Err(Error::BlockNotFound(_))));

        e.mark_new(id, WalOffset(1), Timestamp(1)).unwrap();
        assert!(matches!(e.clear_block(id), Err(Error::InvalidStateTransition { .. })));

        e.mark_dirty(id, WalOffset(2), Timestamp(2)).unwrap();
        e.clear_block(id).unwrap();
        assert!(matches!(e.get_block_metadata(id), Err(Error::BlockNotFound(_))));
        assert_eq!(e.get_stats().total, 0);
    }

    #[test]
    fn disjointness_invariant_holds_across_transitions() {
        let e = engine();
        for i in 0..50u64 {
            e.mark_new(BlockId(i), WalOffset(i), Timestamp(i as i64)).unwrap();
        }
        for i in 0..25u64 {
            e.mark_dirty(BlockId(i), WalOffset(i + 100), Timestamp(i as i64 + 100)).unwrap();
        }
        let state = e.state.read();
        let dn: Bitmap = state.dirty.intersection(&state.new);
        let dd: Bitmap = state.dirty.intersection(&state.deleted);
        let nd: Bitmap = state.new.intersection(&state.deleted);
        assert!(dn.is_empty() && dd.is_empty() && nd.is_empty());
    }

    #[test]
    fn range_query_does_not_mutate_indices() {
        let e = engine();
        e.mark_dirty(BlockId(1), WalOffset(10), Timestamp(10)).unwrap();
        let mut out = Vec::new();
        e.get_dirty_blocks_by_time(0, 100, &mut out, 10);
        e.get_dirty_blocks_by_time(0, 100, &mut out, 10);
        assert_eq!(out, vec![1]);
    }

    proptest::proptest! {
        #[test]
        fn transitions_always_agree_with_the_state_machine_model(
            ops in proptest::collection::vec(0u8..4, 1..200)
        ) {
            let e = engine();
            let id = BlockId(1);
            let mut model = BlockState::Clean;
            for (i, op) in ops.into_iter().enumerate() {
                let wal = WalOffset(i as u64);
                let ts = Timestamp(i as i64);
                let (target, result) = match op {
                    0 => (BlockState::New, e.mark_new(id, wal, ts)),
                    1 => (BlockState::Dirty, e.mark_dirty(id, wal, ts)),
                    2 => (BlockState::Deleted, e.mark_deleted(id, wal, ts)),
                    _ => (BlockState::Clean, e.clear_block(id)),
                };
                if model.can_transition_to(target) {
                    prop_assert!(result.is_ok());
                    model = target;
                } else {
                    prop_assert!(result.is_err());
                }
                let observed = e.get_block_state(id).unwrap_or(BlockState::Clean);
                prop_assert_eq!(observed, model);
            }
        }
    }
}
