//! Backup coordinator: cursor iteration, batch assembly, size estimation,
//! integrity validation, retry orchestration, and the container format
//! (spec §4.6, §6).

pub mod config;
pub mod container;
pub mod coordinator;
pub mod cursor;
pub mod retry;

pub use config::BackupCoordinatorConfig;
pub use container::{Container, ContainerBlock, ContainerHeader};
pub use coordinator::BackupCoordinator;
pub use cursor::{Batch, BlockRecord, CursorBounds, CursorHandle, CursorType};
pub use retry::{execute_with_retry, RetryContext, RetryState};
