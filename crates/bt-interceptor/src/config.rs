//! Interceptor configuration (spec §4.5, §5 "Resource caps").

use serde::Deserialize;

fn default_event_buffer_size() -> usize {
    10_000
}

fn default_callback_threads() -> usize {
    2
}

fn default_worker_poll_timeout_ms() -> u64 {
    200
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct InterceptorConfig {
    #[serde(default = "default_event_buffer_size")]
    pub event_buffer_size: usize,

    #[serde(default = "default_callback_threads")]
    pub callback_threads: usize,

    /// How long a worker blocks in `dequeue` before re-checking the
    /// shutdown flag (spec §5: "ensures a worker notices shutdown within
    /// the timeout window regardless of queue activity").
    #[serde(default = "default_worker_poll_timeout_ms")]
    pub worker_poll_timeout_ms: u64,
}

impl Default for InterceptorConfig {
    fn default() -> Self {
        InterceptorConfig {
            event_buffer_size: default_event_buffer_size(),
            callback_threads: default_callback_threads(),
            worker_poll_timeout_ms: default_worker_poll_timeout_ms(),
        }
    }
}
