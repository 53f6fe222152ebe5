// ── Command API ──
//
// Every operation an async caller can run against the provisioner task
// is a `Command` variant. The task routes each one to the matching
// `Provisioner` method and answers with a `CommandResult`.

use uuid::Uuid;

use crate::error::CoreError;
use crate::model::{
    Address, AppKeyBinding, FilterInfo, FilterOp, FilterType, Heartbeat, HeartbeatFilterEntry,
    IndexRequest, KeyIndex, KeyValue, ModelId, NewNode, NodeRecord, SessionState, SettingsId,
};
use crate::settings::SlotInfo;

/// A command envelope sent through the command channel.
/// Contains the command and a oneshot response channel.
pub(crate) struct CommandEnvelope {
    pub command: Command,
    pub response_tx: tokio::sync::oneshot::Sender<Result<CommandResult, CoreError>>,
}

/// All operations the provisioner task accepts.
#[derive(Debug, Clone)]
pub enum Command {
    // ── Keys ─────────────────────────────────────────────────────────
    AddNetKey {
        value: Option<KeyValue>,
        index: IndexRequest,
    },
    UpdateNetKey {
        value: KeyValue,
        index: KeyIndex,
    },
    GetNetKey {
        index: KeyIndex,
    },
    ListNetKeys,
    AddAppKey {
        value: Option<KeyValue>,
        net_index: KeyIndex,
        app_index: IndexRequest,
    },
    UpdateAppKey {
        value: KeyValue,
        net_index: KeyIndex,
        app_index: KeyIndex,
    },
    GetAppKey {
        net_index: KeyIndex,
        app_index: KeyIndex,
    },
    ListAppKeys,
    BindAppKey {
        element: Address,
        app_index: KeyIndex,
        model: ModelId,
    },
    ListBindings,

    // ── Nodes ────────────────────────────────────────────────────────
    ProvisioningComplete(NewNode),
    StoreCompositionData {
        addr: Address,
        data: Vec<u8>,
    },
    SetNodeName {
        index: u16,
        name: String,
    },
    GetNodeName {
        index: u16,
    },
    GetNodeIndexByName {
        name: String,
    },
    GetNodeByUuid {
        uuid: Uuid,
    },
    GetNodeByAddress {
        addr: Address,
    },
    DeleteNodeByUuid {
        uuid: Uuid,
    },
    DeleteNodeByAddress {
        addr: Address,
    },
    GetNodeCount,
    GetNodeTable,

    // ── Heartbeat filter ─────────────────────────────────────────────
    StartHeartbeatReceiving,
    StopHeartbeatReceiving,
    SetHeartbeatFilterType(FilterType),
    SetHeartbeatFilterInfo {
        op: FilterOp,
        info: FilterInfo,
    },
    ListHeartbeatFilter,
    EvaluateHeartbeat {
        src: Address,
        dst: Address,
    },
    Heartbeat(Heartbeat),

    // ── Settings sessions ────────────────────────────────────────────
    OpenSettings(SettingsId),
    RestoreSettings(SettingsId),
    ReleaseSettings {
        id: SettingsId,
        erase: bool,
    },
    CloseSettings(SettingsId),
    DeleteSettings(SettingsId),
    EraseAllSettings,
    CommitSettings,
    GetSettingsUserId {
        index: u8,
    },
    GetSettingsIndex {
        user_id: String,
    },
    GetFreeSettingsUserIdCount,
    GetSettingsState(SettingsId),
    GetActiveSettings,
    ListSettings,
}

/// Result of a command execution.
#[derive(Debug, Clone)]
pub enum CommandResult {
    Ok,
    KeyIndex(KeyIndex),
    Key(KeyValue),
    NetKeys(Vec<KeyIndex>),
    /// `(app_index, net_index)` pairs.
    AppKeys(Vec<(KeyIndex, KeyIndex)>),
    Bindings(Vec<AppKeyBinding>),
    NodeIndex(Option<u16>),
    NodeName(Option<String>),
    Node(Option<Box<NodeRecord>>),
    NodeTable(Vec<Option<NodeRecord>>),
    Count(usize),
    FilterEntries {
        filter_type: FilterType,
        receiving: bool,
        entries: Vec<HeartbeatFilterEntry>,
    },
    Passed(bool),
    Slot(u8),
    UserId(Option<String>),
    SettingsIndex(Option<u8>),
    State(SessionState),
    Active(Option<(u8, SettingsId)>),
    Settings(Vec<SlotInfo>),
}
