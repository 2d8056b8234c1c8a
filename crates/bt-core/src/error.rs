//! Error kinds shared by every layer of the change-tracking core.
//!
//! A single `Error` enum is used end to end: the bitmap engine returns it
//! directly, the interceptor counts it without surfacing it, and the backup
//! coordinator stores the most recent one for `get_last_error`.

use thiserror::Error;

/// Result type alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// Error kinds, one per entry in the original plugin's error code table.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    #[error("initialization failed: {0}")]
    InitFailed(String),

    #[error("not initialized")]
    NotInitialized,

    #[error("memory allocation failed: {0}")]
    MemoryAlloc(String),

    #[error("file I/O error: {0}")]
    FileIo(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("data corruption detected: {0}")]
    DataCorruption(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("disk full")]
    DiskFull,

    #[error("connection lost: {0}")]
    ConnectionLost(String),

    #[error("retry exhausted after {attempts} attempts")]
    RetryExhausted { attempts: u32 },

    #[error("invalid state transition from {from:?} to {to:?}")]
    InvalidStateTransition { from: String, to: String },

    #[error("block not found: {0}")]
    BlockNotFound(u64),

    #[error("unknown error: {0}")]
    Unknown(String),
}

impl Error {
    /// Errors the backup coordinator's retry policy may retry (spec §4.6, §7).
    ///
    /// Only `Network`, `Timeout`, `ConnectionLost`, `FileIo` are retryable;
    /// everything else is terminal and aborts `execute_with_retry` immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Network(_) | Error::Timeout(_) | Error::ConnectionLost(_) | Error::FileIo(_)
        )
    }

    /// `InvalidStateTransition` is expected under concurrent event reordering
    /// (spec §4.5) and should be counted, not logged as a failure.
    pub fn is_expected_race(&self) -> bool {
        matches!(self, Error::InvalidStateTransition { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification_matches_spec_table() {
        assert!(Error::Network("down".into()).is_retryable());
        assert!(Error::Timeout("slow".into()).is_retryable());
        assert!(Error::ConnectionLost("reset".into()).is_retryable());
        assert!(Error::FileIo("ENOSPC".into()).is_retryable());

        assert!(!Error::InvalidParam("bad".into()).is_retryable());
        assert!(!Error::DataCorruption("crc".into()).is_retryable());
        assert!(!Error::BlockNotFound(42).is_retryable());
        assert!(!Error::RetryExhausted { attempts: 3 }.is_retryable());
    }

    #[test]
    fn invalid_state_transition_is_an_expected_race() {
        let e = Error::InvalidStateTransition {
            from: "DELETED".into(),
            to: "DIRTY".into(),
        };
        assert!(e.is_expected_race());
        assert!(!Error::DiskFull.is_expected_race());
    }
}
