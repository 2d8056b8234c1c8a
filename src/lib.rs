//! # bittrack
//!
//! Change-tracking core for an incremental-backup plugin of a time-series
//! database. A bitmap engine tracks which blocks have changed and when (both
//! in wall-clock time and in write-ahead-log offset space); an event
//! interceptor feeds it from storage-engine callbacks through a bounded
//! queue and worker pool; a backup coordinator streams the result through
//! cursors, estimates archive size, validates integrity, retries transient
//! failures, and reads/writes the on-disk container format.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use bittrack::{
//!     BackupCoordinator, BackupCoordinatorConfig, BitmapEngine, BlockId, EngineConfig,
//!     EventInterceptor, InterceptorConfig, StorageHooks, Timestamp, WalOffset,
//! };
//!
//! let engine = Arc::new(BitmapEngine::new(EngineConfig::default()));
//! let interceptor = Arc::new(EventInterceptor::new(Arc::clone(&engine), InterceptorConfig::default()));
//! interceptor.start();
//!
//! // A real integration calls this from the storage engine's write path.
//! interceptor.on_block_create(BlockId(42), WalOffset(1000), Timestamp(1));
//!
//! let coordinator = BackupCoordinator::new(engine, interceptor, BackupCoordinatorConfig::default());
//! let (blocks, bytes) = coordinator.estimate_size(0, u64::MAX);
//! println!("roughly {blocks} dirty blocks, {bytes} bytes");
//! ```
//!
//! # Crates
//!
//! | Crate | Responsibility |
//! |---|---|
//! | `bt-core` | shared types and error kinds |
//! | `bt-bitmap` | compressed bitmap container and ordered key→bitmap index |
//! | `bt-queue` | bounded, shutdown-aware ring buffer |
//! | `bt-engine` | state-machine-guarded bitmap engine |
//! | `bt-interceptor` | event capture and worker-pool dispatch |
//! | `bt-coordinator` | cursors, batch extraction, retries, container format |
//! | `bt-plugin` | C-ABI shim over a process-wide singleton (not re-exported here) |
//!
//! The C-ABI surface lives in the separate `bt-plugin` crate, built as a
//! `cdylib`; this crate is the Rust-native API.

pub use bt_core::{
    BlockId, BlockMetadata, BlockState, EngineStats, Error, EventKind, EventRecord, Result,
    Timestamp, WalOffset,
};
pub use bt_coordinator::{
    BackupCoordinator, BackupCoordinatorConfig, Batch, BlockRecord, Container, ContainerBlock,
    ContainerHeader, CursorBounds, CursorHandle, CursorType, RetryContext, RetryState,
};
pub use bt_engine::{BitmapEngine, EngineConfig};
pub use bt_interceptor::{EventInterceptor, InterceptorConfig, InterceptorStats, StorageHooks};
