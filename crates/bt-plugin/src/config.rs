//! Config-bytes parsing for `plugin_init` (spec §6, §7 AMBIENT).

use bt_coordinator::BackupCoordinatorConfig;
use bt_engine::EngineConfig;
use bt_interceptor::InterceptorConfig;
use serde::Deserialize;

/// The JSON blob `plugin_init` receives. Every section is optional; absent
/// sections fall back to the defaults each component already carries.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PluginConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub interceptor: InterceptorConfig,
    #[serde(default)]
    pub coordinator: BackupCoordinatorConfig,
}

impl PluginConfig {
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        if bytes.is_empty() {
            return Ok(PluginConfig::default());
        }
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_bytes_use_every_default() {
        let cfg = PluginConfig::from_json_bytes(b"").unwrap();
        assert_eq!(cfg.engine.metadata_map_buckets, EngineConfig::default().metadata_map_buckets);
    }

    #[test]
    fn partial_json_overrides_one_field_and_keeps_the_rest() {
        let cfg = PluginConfig::from_json_bytes(br#"{"interceptor": {"callback_threads": 4}}"#).unwrap();
        assert_eq!(cfg.interceptor.callback_threads, 4);
        assert_eq!(cfg.interceptor.event_buffer_size, InterceptorConfig::default().event_buffer_size);
    }
}
