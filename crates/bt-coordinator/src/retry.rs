//! Retry orchestration (spec §4.6, §7 "Retry classification").
//!
//! `execute_with_retry` builds a fresh [`RetryContext`] on the stack for
//! every call. The original plugin kept this state in a static, which is a
//! thread-safety bug when two backups run concurrently (spec §9); nothing
//! here is shared across calls.

use std::thread;
use std::time::Duration;

use bt_core::{Error, Result};
use tracing::warn;

/// Retry state machine (spec §4.6): `Idle -> Retrying -> {Success, Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Idle,
    Retrying,
    Success,
    Failed,
}

#[derive(Debug, Clone)]
pub struct RetryContext {
    pub attempts: u32,
    pub max_retry: u32,
    pub interval: Duration,
    pub state: RetryState,
    pub last_error: Option<Error>,
}

impl RetryContext {
    fn new(max_retry: u32, interval: Duration) -> Self {
        RetryContext {
            attempts: 0,
            max_retry,
            interval,
            state: RetryState::Idle,
            last_error: None,
        }
    }
}

/// Runs `op` up to `max_retry + 1` times. Classifies every failure via
/// [`Error::is_retryable`]; a terminal error aborts immediately. Between
/// retryable attempts the current thread sleeps `interval`.
pub fn execute_with_retry<F, T>(max_retry: u32, interval: Duration, mut op: F) -> (Result<T>, RetryContext)
where
    F: FnMut() -> Result<T>,
{
    let mut ctx = RetryContext::new(max_retry, interval);
    ctx.state = RetryState::Retrying;

    loop {
        ctx.attempts += 1;
        match op() {
            Ok(value) => {
                ctx.state = RetryState::Success;
                return (Ok(value), ctx);
            }
            Err(e) => {
                if !e.is_retryable() {
                    ctx.state = RetryState::Failed;
                    ctx.last_error = Some(e.clone());
                    return (Err(e), ctx);
                }

                ctx.last_error = Some(e.clone());
                if ctx.attempts >= ctx.max_retry + 1 {
                    ctx.state = RetryState::Failed;
                    return (Err(Error::RetryExhausted { attempts: ctx.attempts }), ctx);
                }

                warn!(attempt = ctx.attempts, error = %e, "retrying after retryable error");
                if !ctx.interval.is_zero() {
                    thread::sleep(ctx.interval);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn retry_exhaustion_invokes_op_max_plus_one_times_and_fails() {
        let calls = Cell::new(0u32);
        let (result, ctx) = execute_with_retry(3, Duration::from_millis(0), || {
            calls.set(calls.get() + 1);
            Err::<(), _>(Error::Network("down".into()))
        });

        assert_eq!(calls.get(), 4);
        assert!(matches!(result, Err(Error::RetryExhausted { attempts: 4 })));
        assert_eq!(ctx.state, RetryState::Failed);
    }

    #[test]
    fn non_retryable_error_short_circuits_after_one_attempt() {
        let calls = Cell::new(0u32);
        let (result, ctx) = execute_with_retry(3, Duration::from_millis(0), || {
            calls.set(calls.get() + 1);
            Err::<(), _>(Error::InvalidParam("bad arg".into()))
        });

        assert_eq!(calls.get(), 1);
        assert!(matches!(result, Err(Error::InvalidParam(_))));
        assert_eq!(ctx.state, RetryState::Failed);
    }

    #[test]
    fn succeeds_after_transient_failures() {
        let calls = Cell::new(0u32);
        let (result, ctx) = execute_with_retry(5, Duration::from_millis(0), || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(Error::Timeout("slow".into()))
            } else {
                Ok(42)
            }
        });

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.get(), 3);
        assert_eq!(ctx.state, RetryState::Success);
    }
}
