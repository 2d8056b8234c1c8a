//! Backup coordinator: cursors, batches, size estimation, integrity
//! validation, and retry orchestration over a bitmap engine (spec §4.6).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bt_core::{BlockId, Error, Result};
use bt_engine::BitmapEngine;
use bt_interceptor::EventInterceptor;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::config::BackupCoordinatorConfig;
use crate::cursor::{Batch, BlockRecord, Cursor, CursorBounds, CursorHandle, CursorType};
use crate::retry::{self, RetryContext};

/// Owns the bitmap engine and its event interceptor for the lifetime of a
/// backup session (spec SPEC_FULL §9: "coordinator owns interceptor and
/// engine"), plus the cursor table and the most recent error for callers
/// that only see the flat plugin surface.
pub struct BackupCoordinator {
    engine: Arc<BitmapEngine>,
    interceptor: Arc<EventInterceptor>,
    config: BackupCoordinatorConfig,
    cursors: Mutex<FxHashMap<u64, Cursor>>,
    next_cursor_id: AtomicU64,
    last_error: Mutex<Option<Error>>,
}

impl BackupCoordinator {
    pub fn new(engine: Arc<BitmapEngine>, interceptor: Arc<EventInterceptor>, config: BackupCoordinatorConfig) -> Self {
        BackupCoordinator {
            engine,
            interceptor,
            config,
            cursors: Mutex::new(FxHashMap::default()),
            next_cursor_id: AtomicU64::new(1),
            last_error: Mutex::new(None),
        }
    }

    pub fn engine(&self) -> &Arc<BitmapEngine> {
        &self.engine
    }

    pub fn interceptor(&self) -> &Arc<EventInterceptor> {
        &self.interceptor
    }

    fn track<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            *self.last_error.lock() = Some(e.clone());
        }
        result
    }

    /// Most recent error recorded by any coordinator call (spec §7).
    pub fn get_last_error(&self) -> Option<Error> {
        self.last_error.lock().clone()
    }

    pub fn clear_error(&self) {
        *self.last_error.lock() = None;
    }

    /// `get_dirty_blocks` plugin entry point: the WAL-indexed dirty set in
    /// `[start_wal, end_wal]`, independent of any cursor.
    pub fn get_dirty_blocks(&self, start_wal: u64, end_wal: u64, max: usize) -> Vec<u64> {
        let mut out = Vec::new();
        self.engine.get_dirty_blocks_by_wal(start_wal, end_wal, &mut out, max);
        out
    }

    /// Allocates a cursor in `has_more = true` state. No snapshot is taken
    /// (spec §4.6): the cursor observes the engine's live state on every
    /// `get_next_batch` call.
    pub fn create_cursor(&self, cursor_type: CursorType, bounds: CursorBounds) -> CursorHandle {
        let id = self.next_cursor_id.fetch_add(1, Ordering::SeqCst);
        self.cursors.lock().insert(id, Cursor::new(cursor_type, bounds));
        CursorHandle(id)
    }

    pub fn destroy_cursor(&self, handle: CursorHandle) {
        self.cursors.lock().remove(&handle.0);
    }

    /// Matching ids for a cursor's bounds and type, already filtered to
    /// `id > last_id` so a second call doesn't re-return the first batch.
    /// `Hybrid` intersects the time-indexed and WAL-indexed dirty sets.
    fn candidate_ids(&self, cursor: &Cursor) -> Vec<u64> {
        let b = &cursor.bounds;
        let ids = match cursor.cursor_type {
            CursorType::Time => {
                let mut out = Vec::new();
                self.engine.get_dirty_blocks_by_time(b.start_time, b.end_time, &mut out, usize::MAX);
                out
            }
            CursorType::Wal => {
                let mut out = Vec::new();
                self.engine.get_dirty_blocks_by_wal(b.start_wal, b.end_wal, &mut out, usize::MAX);
                out
            }
            CursorType::Hybrid => {
                let mut by_time = Vec::new();
                self.engine.get_dirty_blocks_by_time(b.start_time, b.end_time, &mut by_time, usize::MAX);
                let mut by_wal = Vec::new();
                self.engine.get_dirty_blocks_by_wal(b.start_wal, b.end_wal, &mut by_wal, usize::MAX);
                let by_wal: std::collections::HashSet<u64> = by_wal.into_iter().collect();
                by_time.retain(|id| by_wal.contains(id));
                by_time
            }
        };

        let mut ids: Vec<u64> = match cursor.last_id {
            Some(last) => ids.into_iter().filter(|id| *id > last).collect(),
            None => ids,
        };
        ids.sort_unstable();
        ids
    }

    /// `get_next_batch` (spec §4.6): queries the matching index, fetches
    /// metadata for each id (skipping ids raced away by `clear_block`),
    /// advances the cursor, and derives `has_more` from whether any
    /// matching ids remain beyond this batch — the cursor's `block_count`
    /// equivalent is never trusted (spec §9).
    pub fn get_next_batch(&self, handle: CursorHandle, max: usize) -> Result<Batch> {
        let max = max.min(self.config.max_blocks_per_batch);
        let mut cursors = self.cursors.lock();
        let cursor = cursors
            .get_mut(&handle.0)
            .ok_or_else(|| Error::InvalidParam(format!("unknown cursor handle {}", handle.0)))?;

        let candidates = self.candidate_ids(cursor);
        let take = candidates.len().min(max);

        let mut records = Vec::with_capacity(take);
        for &id in candidates.iter().take(take) {
            if let Ok(meta) = self.engine.get_block_metadata(BlockId(id)) {
                records.push(BlockRecord {
                    block_id: id,
                    wal_offset: meta.wal_offset.get(),
                    timestamp: meta.timestamp.get(),
                    state: meta.state,
                    payload: None,
                });
            }
        }

        if let Some(&id) = candidates.iter().take(take).last() {
            cursor.last_id = Some(id);
        }
        cursor.has_more = candidates.len() > take;

        Ok(Batch {
            records,
            has_more: cursor.has_more,
        })
    }

    /// `(estimated_blocks, estimated_bytes)` — a labeled hint derived from a
    /// cardinality probe on the WAL-indexed dirty set, never a contract
    /// (spec §4.6).
    pub fn estimate_size(&self, start_wal: u64, end_wal: u64) -> (u64, u64) {
        let mut out = Vec::new();
        let count = self.engine.get_dirty_blocks_by_wal(start_wal, end_wal, &mut out, usize::MAX);
        let blocks = count as u64;
        (blocks, blocks * self.config.bytes_per_block)
    }

    /// Verifies every id in `block_ids` has live metadata whose
    /// `wal_offset` falls in `[start_wal, end_wal]`; fails on the first
    /// offender (spec §4.6 "Integrity validation").
    pub fn validate_backup(&self, start_wal: u64, end_wal: u64, block_ids: &[u64]) -> Result<()> {
        for &id in block_ids {
            let meta = self.track(self.engine.get_block_metadata(BlockId(id)))?;
            let wal = meta.wal_offset.get();
            if wal < start_wal || wal > end_wal {
                let err = Error::DataCorruption(format!(
                    "block {id} wal_offset {wal} outside [{start_wal}, {end_wal}]"
                ));
                return self.track(Err(err));
            }
        }
        Ok(())
    }

    pub fn get_stats(&self) -> bt_core::EngineStats {
        self.engine.get_stats()
    }

    /// `generate_metadata` plugin entry point: a JSON blob describing every
    /// dirty block's identity and state in `[start_wal, end_wal]` (spec §6).
    pub fn generate_metadata(&self, start_wal: u64, end_wal: u64) -> Result<Vec<u8>> {
        let mut ids = Vec::new();
        self.engine.get_dirty_blocks_by_wal(start_wal, end_wal, &mut ids, usize::MAX);

        let records: Vec<BlockRecord> = ids
            .into_iter()
            .filter_map(|id| self.engine.get_block_metadata(BlockId(id)).ok())
            .map(|meta| BlockRecord {
                block_id: meta.block_id.get(),
                wal_offset: meta.wal_offset.get(),
                timestamp: meta.timestamp.get(),
                state: meta.state,
                payload: None,
            })
            .collect();

        serde_json::to_vec(&records).map_err(|e| Error::Unknown(e.to_string()))
    }

    /// `execute_with_retry` entry point (spec §4.6): runs `op` under the
    /// coordinator's configured retry policy and records the last error.
    pub fn execute_with_retry<F, T>(&self, op: F) -> (Result<T>, RetryContext)
    where
        F: FnMut() -> Result<T>,
    {
        let (result, ctx) = retry::execute_with_retry(
            self.config.retry_max,
            Duration::from_secs(self.config.retry_interval_secs),
            op,
        );
        let result = self.track(result);
        (result, ctx)
    }
}
