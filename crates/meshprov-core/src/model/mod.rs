// ── Domain model ──
//
// Plain data types shared by the stores, the settings codec and the
// command surface. Nothing in here owns state.

pub mod address;
pub mod heartbeat;
pub mod key;
pub mod node;
pub mod settings;

// ── Re-exports ──────────────────────────────────────────────────────

pub use address::Address;
pub use heartbeat::{FilterInfo, FilterOp, FilterType, Heartbeat, HeartbeatFilterEntry};
pub use key::{
    AppKeyBinding, AppKeyRecord, COMPANY_ID_NONE, IndexRequest, KEY_INDEX_GENERATE, KEY_LEN,
    KeyIndex, KeyKind, KeyValue, ModelId, NetKeyRecord,
};
pub use node::{NODE_INDEX_INVALID, NODE_NAME_MAX_LEN, NewNode, NodeRecord};
pub use settings::{SETTINGS_USER_ID_MAX_LEN, SessionState, SettingsId};
