//! Event interceptor: capture, bounded queue, worker-pool dispatch (spec §4.5).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bt_core::{BlockId, BlockState, Error, EventKind, EventRecord, Timestamp, WalOffset};
use bt_engine::BitmapEngine;
use bt_queue::{DequeueError, EnqueueError, RingBuffer};
use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::config::InterceptorConfig;
use crate::hooks::StorageHooks;

/// Event-processing counters (spec §4.5, §8 "event accounting").
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterceptorStats {
    pub events_processed: u64,
    pub events_dropped: u64,
}

/// Captures block-mutation events into a bounded queue and dispatches them,
/// via a worker-thread pool, into a [`BitmapEngine`]'s `mark_*` functions.
///
/// Lifecycle: `new` → `start` (spawn workers) → `on_block_*` (N times) →
/// `stop` (signal shutdown, join workers). `start` is idempotent; `stop`
/// waits for each worker to drain its current event, not the whole queue.
pub struct EventInterceptor {
    engine: Arc<BitmapEngine>,
    queue: Arc<RingBuffer<EventRecord>>,
    config: InterceptorConfig,
    workers: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
    events_processed: Arc<AtomicU64>,
    events_dropped: Arc<AtomicU64>,
}

impl EventInterceptor {
    pub fn new(engine: Arc<BitmapEngine>, config: InterceptorConfig) -> Self {
        EventInterceptor {
            engine,
            queue: Arc::new(RingBuffer::new(config.event_buffer_size)),
            config,
            workers: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
            events_processed: Arc::new(AtomicU64::new(0)),
            events_dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Spawn `config.callback_threads` worker threads. Idempotent.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut workers = self.workers.lock();
        for _ in 0..self.config.callback_threads {
            let queue = Arc::clone(&self.queue);
            let engine = Arc::clone(&self.engine);
            let processed = Arc::clone(&self.events_processed);
            let poll_timeout = Duration::from_millis(self.config.worker_poll_timeout_ms);
            workers.push(thread::spawn(move || {
                worker_loop(queue, engine, processed, poll_timeout);
            }));
        }
    }

    /// Signal shutdown and join every worker. Each worker finishes its
    /// current event but does not drain the rest of the queue.
    pub fn stop(&self) {
        if !self.started.swap(false, Ordering::SeqCst) {
            return;
        }
        self.queue.shutdown();
        let mut workers = self.workers.lock();
        for handle in workers.drain(..) {
            let _ = handle.join();
        }
    }

    pub fn stats(&self) -> InterceptorStats {
        InterceptorStats {
            events_processed: self.events_processed.load(Ordering::SeqCst),
            events_dropped: self.events_dropped.load(Ordering::SeqCst),
        }
    }

    fn enqueue(&self, kind: EventKind, block_id: BlockId, wal_offset: WalOffset, timestamp: Timestamp) {
        let event = EventRecord {
            kind,
            block_id,
            wal_offset,
            timestamp,
        };
        match self.queue.enqueue(event) {
            Ok(()) => {}
            Err(EnqueueError::Full) => {
                warn!(%block_id, ?kind, "event queue full, dropping event");
                self.events_dropped.fetch_add(1, Ordering::SeqCst);
            }
            Err(EnqueueError::Shutdown) => {
                warn!(%block_id, ?kind, "interceptor stopped, dropping event");
                self.events_dropped.fetch_add(1, Ordering::SeqCst);
            }
        }
    }
}

impl StorageHooks for EventInterceptor {
    fn on_block_create(&self, block_id: BlockId, wal_offset: WalOffset, timestamp: Timestamp) {
        self.enqueue(EventKind::Create, block_id, wal_offset, timestamp);
    }

    fn on_block_update(&self, block_id: BlockId, wal_offset: WalOffset, timestamp: Timestamp) {
        self.enqueue(EventKind::Update, block_id, wal_offset, timestamp);
    }

    fn on_block_flush(&self, block_id: BlockId, wal_offset: WalOffset, timestamp: Timestamp) {
        self.enqueue(EventKind::Flush, block_id, wal_offset, timestamp);
    }

    fn on_block_delete(&self, block_id: BlockId, wal_offset: WalOffset, timestamp: Timestamp) {
        self.enqueue(EventKind::Delete, block_id, wal_offset, timestamp);
    }
}

fn worker_loop(
    queue: Arc<RingBuffer<EventRecord>>,
    engine: Arc<BitmapEngine>,
    processed: Arc<AtomicU64>,
    poll_timeout: Duration,
) {
    loop {
        match queue.dequeue(poll_timeout) {
            Ok(event) => {
                dispatch(&engine, event);
                processed.fetch_add(1, Ordering::SeqCst);
            }
            Err(DequeueError::Timeout) => continue,
            Err(DequeueError::Shutdown) => break,
        }
    }
}

/// Forward one event to the bitmap engine's state machine. A rejected
/// transition is the expected signal of concurrent event reordering (spec
/// §4.5) and is only logged, never propagated.
fn dispatch(engine: &BitmapEngine, event: EventRecord) {
    let result = match event.kind {
        EventKind::Create => engine.mark_new(event.block_id, event.wal_offset, event.timestamp),
        EventKind::Update => engine.mark_dirty(event.block_id, event.wal_offset, event.timestamp),
        EventKind::Delete => engine.mark_deleted(event.block_id, event.wal_offset, event.timestamp),
        // A flush persists a dirty block; the engine models that as a
        // transition back to CLEAN, which only clear_block performs.
        EventKind::Flush => engine.clear_block(event.block_id).or_else(|e| match e {
            Error::BlockNotFound(_) => Ok(()),
            other => Err(other),
        }),
    };

    if let Err(e) = result {
        if e.is_expected_race() {
            trace!(block_id = %event.block_id, ?event.kind, "state transition rejected (expected race)");
        } else {
            warn!(block_id = %event.block_id, ?event.kind, error = %e, "event dispatch failed");
        }
    }
}
