//! Backup coordinator configuration (spec §4.6, §5 "Resource caps").

use serde::Deserialize;

fn default_max_blocks_per_batch() -> usize {
    1000
}

fn default_bytes_per_block() -> u64 {
    1024 * 1024
}

fn default_retry_max() -> u32 {
    10
}

fn default_retry_interval_secs() -> u64 {
    5
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct BackupCoordinatorConfig {
    /// Hard ceiling on ids a single `get_next_batch` call extracts; the
    /// caller's requested `max` is clamped down to this value, never up.
    #[serde(default = "default_max_blocks_per_batch")]
    pub max_blocks_per_batch: usize,

    /// Per-block size assumption used by `estimate_size` (spec §4.6): the
    /// estimate is a labeled hint, not a measurement.
    #[serde(default = "default_bytes_per_block")]
    pub bytes_per_block: u64,

    #[serde(default = "default_retry_max")]
    pub retry_max: u32,

    #[serde(default = "default_retry_interval_secs")]
    pub retry_interval_secs: u64,
}

impl Default for BackupCoordinatorConfig {
    fn default() -> Self {
        BackupCoordinatorConfig {
            max_blocks_per_batch: default_max_blocks_per_batch(),
            bytes_per_block: default_bytes_per_block(),
            retry_max: default_retry_max(),
            retry_interval_secs: default_retry_interval_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_with_partial_overrides() {
        let cfg: BackupCoordinatorConfig = serde_json::from_str(r#"{"retry_max": 3}"#).unwrap();
        assert_eq!(cfg.retry_max, 3);
        assert_eq!(cfg.max_blocks_per_batch, default_max_blocks_per_batch());
    }
}
