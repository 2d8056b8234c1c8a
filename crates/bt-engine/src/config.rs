//! Engine configuration (spec §5 "Resource caps").

use serde::Deserialize;

fn default_metadata_map_buckets() -> usize {
    10_000
}

/// Configuration for [`crate::engine::BitmapEngine`].
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct EngineConfig {
    /// Initial bucket-count hint for the block metadata map. Independent of
    /// bitmap size (spec §4.4).
    #[serde(default = "default_metadata_map_buckets")]
    pub metadata_map_buckets: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            metadata_map_buckets: default_metadata_map_buckets(),
        }
    }
}
