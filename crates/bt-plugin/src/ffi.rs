//! Flat C-ABI function surface (spec §6 "Plugin entry points").
//!
//! Every exported function wraps its body in `catch_unwind` so a panic in
//! safe Rust code can't unwind across the FFI boundary — the same guard the
//! background worker pool uses to keep one bad task from killing its thread.

use std::ffi::CString;
use std::os::raw::{c_char, c_int};
use std::panic::{self, AssertUnwindSafe};
use std::slice;
use std::sync::Arc;

use bt_core::Error;
use bt_coordinator::{BackupCoordinator, CursorBounds, CursorHandle, CursorType};
use parking_lot::Mutex;
use tracing::error;

use crate::singleton;

/// Error codes in the exact order of spec §7's kind list, `Success` first.
fn error_code(e: &Error) -> c_int {
    match e {
        Error::InvalidParam(_) => 1,
        Error::InitFailed(_) => 2,
        Error::NotInitialized => 3,
        Error::MemoryAlloc(_) => 4,
        Error::FileIo(_) => 5,
        Error::Network(_) => 6,
        Error::Timeout(_) => 7,
        Error::DataCorruption(_) => 8,
        Error::PermissionDenied(_) => 9,
        Error::DiskFull => 10,
        Error::ConnectionLost(_) => 11,
        Error::RetryExhausted { .. } => 12,
        Error::InvalidStateTransition { .. } => 13,
        Error::BlockNotFound(_) => 14,
        Error::Unknown(_) => 15,
    }
}

const SUCCESS: c_int = 0;

static LAST_ERROR: Mutex<Option<String>> = Mutex::new(None);

fn record_error(message: String) {
    *LAST_ERROR.lock() = Some(message);
}

fn guard<F: FnOnce() -> c_int + std::panic::UnwindSafe>(name: &'static str, body: F) -> c_int {
    match panic::catch_unwind(body) {
        Ok(code) => code,
        Err(payload) => {
            let msg = payload
                .downcast_ref::<&str>()
                .copied()
                .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
                .unwrap_or("(non-string panic)")
                .to_string();
            error!(function = name, panic = %msg, "panic crossed the FFI boundary");
            record_error(format!("{name} panicked: {msg}"));
            error_code(&Error::Unknown(msg))
        }
    }
}

/// # Safety
/// `config_ptr` must point to `config_len` readable bytes, or be null when
/// `config_len` is 0.
#[no_mangle]
pub unsafe extern "C" fn plugin_init(config_ptr: *const u8, config_len: usize) -> c_int {
    guard("plugin_init", AssertUnwindSafe(|| {
        let bytes = if config_ptr.is_null() || config_len == 0 {
            &[][..]
        } else {
            slice::from_raw_parts(config_ptr, config_len)
        };
        match singleton::init(bytes) {
            Ok(()) => SUCCESS,
            Err(e) => {
                record_error(e.to_string());
                error_code(&e)
            }
        }
    }))
}

#[no_mangle]
pub extern "C" fn plugin_cleanup() {
    let _ = guard("plugin_cleanup", || {
        singleton::cleanup();
        SUCCESS
    });
}

fn with_coordinator<F>(name: &'static str, f: F) -> c_int
where
    F: FnOnce(&Arc<BackupCoordinator>) -> Result<(), Error>,
{
    match singleton::coordinator() {
        Ok(coordinator) => match f(&coordinator) {
            Ok(()) => SUCCESS,
            Err(e) => {
                record_error(e.to_string());
                error_code(&e)
            }
        },
        Err(e) => {
            error!(function = name, "called before plugin_init");
            record_error(e.to_string());
            error_code(&e)
        }
    }
}

/// # Safety
/// `out` must point to at least `max` writable `u64` slots.
#[no_mangle]
pub unsafe extern "C" fn get_dirty_blocks(
    start_wal: u64,
    end_wal: u64,
    out: *mut u64,
    max: usize,
    out_count: *mut usize,
) -> c_int {
    guard("get_dirty_blocks", AssertUnwindSafe(|| {
        with_coordinator("get_dirty_blocks", |coordinator| {
            let ids = coordinator.get_dirty_blocks(start_wal, end_wal, max);
            write_u64_out(out, max, out_count, &ids);
            Ok(())
        })
    }))
}

/// # Safety
/// `out_handle` must point to one writable `u64`.
#[no_mangle]
pub unsafe extern "C" fn create_cursor(
    cursor_type: c_int,
    start_time: i64,
    end_time: i64,
    start_wal: u64,
    end_wal: u64,
    out_handle: *mut u64,
) -> c_int {
    guard("create_cursor", AssertUnwindSafe(|| {
        let cursor_type = match cursor_type {
            0 => CursorType::Time,
            1 => CursorType::Wal,
            2 => CursorType::Hybrid,
            _ => {
                record_error("invalid cursor type".into());
                return error_code(&Error::InvalidParam("invalid cursor type".into()));
            }
        };
        with_coordinator("create_cursor", |coordinator| {
            let bounds = CursorBounds { start_time, end_time, start_wal, end_wal };
            let handle = coordinator.create_cursor(cursor_type, bounds);
            if !out_handle.is_null() {
                *out_handle = handle.0;
            }
            Ok(())
        })
    }))
}

#[no_mangle]
pub extern "C" fn destroy_cursor(handle: u64) -> c_int {
    guard("destroy_cursor", || {
        with_coordinator("destroy_cursor", |coordinator| {
            coordinator.destroy_cursor(CursorHandle(handle));
            Ok(())
        })
    })
}

/// # Safety
/// `out` must point to at least `max` writable `u64` slots (block ids).
#[no_mangle]
pub unsafe extern "C" fn get_next_batch(
    handle: u64,
    out: *mut u64,
    max: usize,
    out_count: *mut usize,
    out_has_more: *mut c_int,
) -> c_int {
    guard("get_next_batch", AssertUnwindSafe(|| {
        with_coordinator("get_next_batch", |coordinator| {
            let batch = coordinator.get_next_batch(CursorHandle(handle), max)?;
            let ids: Vec<u64> = batch.records.iter().map(|r| r.block_id).collect();
            write_u64_out(out, max, out_count, &ids);
            if !out_has_more.is_null() {
                *out_has_more = if batch.has_more { 1 } else { 0 };
            }
            Ok(())
        })
    }))
}

/// # Safety
/// `out_blocks`/`out_bytes` must each point to one writable `u64`.
#[no_mangle]
pub unsafe extern "C" fn estimate_size(
    start_wal: u64,
    end_wal: u64,
    out_blocks: *mut u64,
    out_bytes: *mut u64,
) -> c_int {
    guard("estimate_size", AssertUnwindSafe(|| {
        with_coordinator("estimate_size", |coordinator| {
            let (blocks, bytes) = coordinator.estimate_size(start_wal, end_wal);
            if !out_blocks.is_null() {
                *out_blocks = blocks;
            }
            if !out_bytes.is_null() {
                *out_bytes = bytes;
            }
            Ok(())
        })
    }))
}

/// # Safety
/// `out` must point to at least `buf_len` writable bytes when non-null.
#[no_mangle]
pub unsafe extern "C" fn generate_metadata(
    start_wal: u64,
    end_wal: u64,
    out: *mut u8,
    buf_len: usize,
    out_written: *mut usize,
) -> c_int {
    guard("generate_metadata", AssertUnwindSafe(|| {
        with_coordinator("generate_metadata", |coordinator| {
            let blob = coordinator.generate_metadata(start_wal, end_wal)?;
            let n = blob.len().min(buf_len);
            if !out.is_null() && n > 0 {
                std::ptr::copy_nonoverlapping(blob.as_ptr(), out, n);
            }
            if !out_written.is_null() {
                *out_written = blob.len();
            }
            Ok(())
        })
    }))
}

/// # Safety
/// `block_ids` must point to `block_ids_len` readable `u64`s.
#[no_mangle]
pub unsafe extern "C" fn validate_backup(
    start_wal: u64,
    end_wal: u64,
    block_ids: *const u64,
    block_ids_len: usize,
) -> c_int {
    guard("validate_backup", AssertUnwindSafe(|| {
        let ids = if block_ids.is_null() || block_ids_len == 0 {
            &[][..]
        } else {
            slice::from_raw_parts(block_ids, block_ids_len)
        };
        with_coordinator("validate_backup", |coordinator| {
            coordinator.validate_backup(start_wal, end_wal, ids)
        })
    }))
}

/// # Safety
/// Each `out_*` pointer must point to one writable `u64`.
#[no_mangle]
pub unsafe extern "C" fn get_stats(
    out_total: *mut u64,
    out_dirty: *mut u64,
    out_new: *mut u64,
    out_deleted: *mut u64,
) -> c_int {
    guard("get_stats", AssertUnwindSafe(|| {
        with_coordinator("get_stats", |coordinator| {
            let stats = coordinator.get_stats();
            if !out_total.is_null() {
                *out_total = stats.total;
            }
            if !out_dirty.is_null() {
                *out_dirty = stats.dirty;
            }
            if !out_new.is_null() {
                *out_new = stats.new;
            }
            if !out_deleted.is_null() {
                *out_deleted = stats.deleted;
            }
            Ok(())
        })
    }))
}

/// Returns an owned C string with the most recent error message, or an
/// empty string if none is recorded. Caller must free it with
/// `bt_plugin_free_string`.
#[no_mangle]
pub extern "C" fn get_last_error() -> *mut c_char {
    let message = LAST_ERROR.lock().clone().unwrap_or_default();
    CString::new(message).unwrap_or_default().into_raw()
}

/// # Safety
/// `ptr` must have come from `get_last_error` and not already been freed.
#[no_mangle]
pub unsafe extern "C" fn bt_plugin_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

#[no_mangle]
pub extern "C" fn clear_error() {
    *LAST_ERROR.lock() = None;
}

/// # Safety
/// `out` must point to at least `max` writable `u64` slots when non-null.
unsafe fn write_u64_out(out: *mut u64, max: usize, out_count: *mut usize, ids: &[u64]) {
    let n = ids.len().min(max);
    if !out.is_null() && n > 0 {
        std::ptr::copy_nonoverlapping(ids.as_ptr(), out, n);
    }
    if !out_count.is_null() {
        *out_count = n;
    }
}
