//! Process-wide coordinator singleton (spec §6, §9 "Singletons").
//!
//! The library core (`bt-coordinator`) takes explicit handles; only this
//! shim confines state to a process-wide global, guarded by one lock so
//! double-init and use-after-cleanup are well-defined errors instead of
//! undefined behavior.

use std::sync::Arc;

use bt_coordinator::{BackupCoordinator, BackupCoordinatorConfig};
use bt_core::{Error, Result};
use bt_engine::BitmapEngine;
use bt_interceptor::EventInterceptor;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::config::PluginConfig;

static COORDINATOR: Lazy<Mutex<Option<Arc<BackupCoordinator>>>> = Lazy::new(|| Mutex::new(None));

/// `plugin_init`: builds the engine, interceptor, and coordinator from
/// `config`, starts the interceptor's worker pool, and installs the result
/// as the process-wide singleton. Double-init is reported, not fatal — the
/// existing singleton is left untouched (spec §7 "Double-init of the plugin
/// singleton is reported, not fatal").
pub fn init(config_bytes: &[u8]) -> Result<()> {
    let mut slot = COORDINATOR.lock();
    if slot.is_some() {
        warn!("plugin_init called while already initialized");
        return Err(Error::InitFailed("already initialized".into()));
    }

    let config = PluginConfig::from_json_bytes(config_bytes)
        .map_err(|e| Error::InitFailed(format!("invalid config: {e}")))?;

    let engine = Arc::new(BitmapEngine::new(config.engine));
    let interceptor = Arc::new(EventInterceptor::new(Arc::clone(&engine), config.interceptor));
    interceptor.start();

    let coordinator = Arc::new(BackupCoordinator::new(
        Arc::clone(&engine),
        Arc::clone(&interceptor),
        config.coordinator,
    ));

    info!("plugin initialized");
    *slot = Some(coordinator);
    Ok(())
}

/// `plugin_cleanup`: stops the interceptor's workers and drops the
/// singleton. A no-op if not initialized (spec §7 "Double-destroy is a
/// no-op").
pub fn cleanup() {
    let mut slot = COORDINATOR.lock();
    if let Some(coordinator) = slot.take() {
        coordinator.interceptor().stop();
        info!("plugin cleaned up");
    }
}

/// Borrow the singleton, or `NotInitialized` if `init` hasn't run (or
/// `cleanup` already has).
pub fn coordinator() -> Result<Arc<BackupCoordinator>> {
    COORDINATOR
        .lock()
        .as_ref()
        .cloned()
        .ok_or(Error::NotInitialized)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test owns the global singleton for its duration; run them with
    // `--test-threads=1` or accept interleaving noise, matching the
    // single-process-wide-state nature of what's under test.
    fn reset() {
        cleanup();
    }

    #[test]
    fn init_then_cleanup_then_init_again_is_well_defined() {
        reset();
        assert!(coordinator().is_err());

        init(b"").unwrap();
        assert!(coordinator().is_ok());

        let err = init(b"").unwrap_err();
        assert!(matches!(err, Error::InitFailed(_)));

        cleanup();
        assert!(matches!(coordinator().unwrap_err(), Error::NotInitialized));

        cleanup();
        init(b"").unwrap();
        assert!(coordinator().is_ok());
        cleanup();
    }
}
