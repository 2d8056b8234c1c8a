//! End-to-end coverage of the mark -> query -> cursor -> batch pipeline
//! (spec §8's concrete scenarios), driven through the public facade.

use std::sync::Arc;
use std::time::Duration;

use bittrack::{
    BackupCoordinator, BackupCoordinatorConfig, BitmapEngine, BlockId, CursorBounds, CursorType,
    EngineConfig, EventInterceptor, InterceptorConfig, StorageHooks, Timestamp, WalOffset,
};

fn coordinator() -> BackupCoordinator {
    let engine = Arc::new(BitmapEngine::new(EngineConfig::default()));
    let interceptor = Arc::new(EventInterceptor::new(Arc::clone(&engine), InterceptorConfig::default()));
    BackupCoordinator::new(engine, interceptor, BackupCoordinatorConfig::default())
}

#[test]
fn events_flow_from_interceptor_through_to_a_streamed_batch() {
    let coordinator = coordinator();
    coordinator.interceptor().start();

    for i in 0..10u64 {
        let wal = 20_000 + i * 10;
        coordinator
            .interceptor()
            .on_block_create(BlockId(100 + i), WalOffset(wal), Timestamp(i as i64));
    }
    // Creates alone leave blocks NEW, not dirty; update them so they show
    // up in the WAL-indexed dirty set the cursor walks.
    for i in 0..10u64 {
        let wal = 20_000 + i * 10;
        coordinator
            .interceptor()
            .on_block_update(BlockId(100 + i), WalOffset(wal), Timestamp(i as i64));
    }

    std::thread::sleep(Duration::from_millis(150));
    coordinator.interceptor().stop();

    let handle = coordinator.create_cursor(
        CursorType::Wal,
        CursorBounds { start_time: 0, end_time: 0, start_wal: 20_000, end_wal: 30_000 },
    );

    let first = coordinator.get_next_batch(handle, 5).unwrap();
    assert_eq!(first.records.len(), 5);
    assert!(first.has_more);

    let second = coordinator.get_next_batch(handle, 5).unwrap();
    assert_eq!(second.records.len(), 5);
    assert!(!second.has_more);

    coordinator.destroy_cursor(handle);

    let (blocks, bytes) = coordinator.estimate_size(20_000, 30_000);
    assert_eq!(blocks, 10);
    assert_eq!(bytes, 10 * 1024 * 1024);

    assert!(coordinator.validate_backup(20_000, 30_000, &[100, 109]).is_ok());
}

#[test]
fn dropped_events_are_counted_and_later_events_still_reach_the_engine() {
    let engine = Arc::new(BitmapEngine::new(EngineConfig::default()));
    let interceptor = Arc::new(EventInterceptor::new(
        Arc::clone(&engine),
        InterceptorConfig { event_buffer_size: 2, callback_threads: 1, worker_poll_timeout_ms: 20 },
    ));

    interceptor.on_block_create(BlockId(1), WalOffset(1), Timestamp(1));
    interceptor.on_block_create(BlockId(2), WalOffset(2), Timestamp(2));
    interceptor.on_block_create(BlockId(3), WalOffset(3), Timestamp(3));
    assert_eq!(interceptor.stats().events_dropped, 1);

    interceptor.start();
    std::thread::sleep(Duration::from_millis(100));
    interceptor.stop();

    assert!(engine.get_block_metadata(BlockId(1)).is_ok());
    assert!(engine.get_block_metadata(BlockId(2)).is_ok());
}
