// ── Settings snapshot codec ──
//
// The bytes stored in a settings region: every key, binding, node and the
// heartbeat filter, as versioned JSON.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::model::{AppKeyBinding, AppKeyRecord, NetKeyRecord, NodeRecord};
use crate::store::HeartbeatSnapshot;

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsSnapshot {
    pub version: u32,
    pub net_keys: Vec<NetKeyRecord>,
    pub app_keys: Vec<AppKeyRecord>,
    #[serde(default)]
    pub bindings: Vec<AppKeyBinding>,
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub heartbeat: HeartbeatSnapshot,
}

impl Default for SettingsSnapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            net_keys: Vec::new(),
            app_keys: Vec::new(),
            bindings: Vec::new(),
            nodes: Vec::new(),
            heartbeat: HeartbeatSnapshot::default(),
        }
    }
}

impl SettingsSnapshot {
    pub fn encode(&self) -> Result<Vec<u8>, CoreError> {
        serde_json::to_vec_pretty(self).map_err(CoreError::codec)
    }

    /// Parse a stored region. Unknown versions are rejected rather than
    /// half-loaded.
    pub fn decode(bytes: &[u8]) -> Result<Self, CoreError> {
        let snapshot: Self = serde_json::from_slice(bytes).map_err(CoreError::codec)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(CoreError::codec(format!(
                "unsupported snapshot version {} (expected {SNAPSHOT_VERSION})",
                snapshot.version
            )));
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    use super::*;
    use crate::model::{Address, FilterType, KeyIndex, KeyValue};
    use crate::store::StoredFilterEntry;

    #[test]
    fn populated_snapshot_survives_encoding() {
        let net_index = KeyIndex::new(0x10).unwrap();
        let snapshot = SettingsSnapshot {
            net_keys: vec![NetKeyRecord {
                net_index,
                value: KeyValue::new([7; 16]),
            }],
            nodes: vec![NodeRecord {
                index: 2,
                uuid: Uuid::from_u128(0xABCD),
                unicast: Address::new(0x0100),
                element_count: 2,
                net_index,
                device_key: KeyValue::new([9; 16]),
                name: Some("porch".into()),
                composition_data: Some(vec![1, 2, 3]),
            }],
            heartbeat: HeartbeatSnapshot {
                receiving: true,
                filter_type: FilterType::Whitelist,
                entries: vec![StoredFilterEntry {
                    src: Some(Address::new(0x0100)),
                    dst: None,
                    expiry_secs: Some(30),
                    deadline_unix_ms: Some(1_700_000_012_000),
                }],
            },
            ..SettingsSnapshot::default()
        };

        let bytes = snapshot.encode().unwrap();
        assert_eq!(SettingsSnapshot::decode(&bytes).unwrap(), snapshot);
    }

    #[test]
    fn missing_optional_sections_default() {
        let bytes = br#"{"version":1,"net_keys":[],"app_keys":[]}"#;
        let snapshot = SettingsSnapshot::decode(bytes).unwrap();
        assert!(snapshot.nodes.is_empty());
        assert!(!snapshot.heartbeat.receiving);
    }

    #[test]
    fn rejects_garbage_and_unknown_versions() {
        assert!(matches!(
            SettingsSnapshot::decode(b"\x00\x01"),
            Err(CoreError::Codec { .. })
        ));
        let future = br#"{"version":9,"net_keys":[],"app_keys":[]}"#;
        assert!(matches!(
            SettingsSnapshot::decode(future),
            Err(CoreError::Codec { .. })
        ));
    }

    #[test]
    fn out_of_range_key_index_is_corrupt() {
        let bytes = br#"{"version":1,"net_keys":[{"net_index":8192,"value":[0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0]}],"app_keys":[]}"#;
        assert!(matches!(
            SettingsSnapshot::decode(bytes),
            Err(CoreError::Codec { .. })
        ));
    }
}
