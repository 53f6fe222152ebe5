// ── Provisioner facade ──
//
// Single owner of the live state (keys, nodes, heartbeat filter), the
// settings sessions and the event sender. Every operation runs through
// `&mut self`, which makes this struct the one mutual-exclusion domain.
// `ProvisionerHandle` wraps it in a task for async callers.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ProvisionerConfig;
use crate::error::CoreError;
use crate::event::ProvisionerEvent;
use crate::model::{
    Address, AppKeyBinding, FilterInfo, FilterOp, FilterType, Heartbeat, HeartbeatFilterEntry,
    IndexRequest, KeyIndex, KeyValue, ModelId, NewNode, NodeRecord, SessionState, SettingsId,
};
use crate::settings::{SessionManager, SettingsSnapshot, SettingsStorage, SlotInfo};
use crate::store::{HeartbeatFilter, KeyStore, NodeRegistry, WallClock};

const EVENT_CHANNEL_SIZE: usize = 256;

// ── LiveState ───────────────────────────────────────────────────────

/// The state a restored settings session owns.
#[derive(Debug, Clone)]
struct LiveState {
    keys: KeyStore,
    nodes: NodeRegistry,
    heartbeat: HeartbeatFilter,
}

impl LiveState {
    fn empty(config: &ProvisionerConfig, clock: WallClock) -> Self {
        Self {
            keys: KeyStore::new(config.max_net_keys, config.max_app_keys),
            nodes: NodeRegistry::new(config.max_nodes),
            heartbeat: HeartbeatFilter::with_clock(config.max_filter_entries, clock),
        }
    }

    /// Build a fresh live state from a decoded snapshot. Nothing is
    /// touched on failure since the result replaces the old state whole.
    fn from_snapshot(
        config: &ProvisionerConfig,
        snapshot: SettingsSnapshot,
        clock: WallClock,
    ) -> Result<Self, CoreError> {
        let keys = KeyStore::from_records(
            config,
            snapshot.net_keys,
            snapshot.app_keys,
            snapshot.bindings,
        )?;
        let nodes = NodeRegistry::from_records(config, &keys, snapshot.nodes)?;
        let heartbeat =
            HeartbeatFilter::from_snapshot(config.max_filter_entries, snapshot.heartbeat, clock)?;
        Ok(Self {
            keys,
            nodes,
            heartbeat,
        })
    }

    fn snapshot(&self) -> SettingsSnapshot {
        SettingsSnapshot {
            net_keys: self.keys.net_key_records(),
            app_keys: self.keys.app_key_records(),
            bindings: self.keys.bindings().to_vec(),
            nodes: self.nodes.nodes().cloned().collect(),
            heartbeat: self.heartbeat.snapshot(),
            ..SettingsSnapshot::default()
        }
    }
}

// ── Provisioner ─────────────────────────────────────────────────────

pub struct Provisioner {
    config: ProvisionerConfig,
    live: LiveState,
    settings: SessionManager,
    enabled: bool,
    event_tx: broadcast::Sender<Arc<ProvisionerEvent>>,
}

impl std::fmt::Debug for Provisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provisioner")
            .field("enabled", &self.enabled)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Provisioner {
    /// Validate `config` and load the persisted user id table from
    /// `storage`. The provisioner starts enabled with empty live state.
    pub fn new(
        config: ProvisionerConfig,
        storage: Box<dyn SettingsStorage>,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        let settings = SessionManager::new(storage, config.max_settings)?;
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        debug!(
            max_nodes = config.max_nodes,
            max_net_keys = config.max_net_keys,
            max_app_keys = config.max_app_keys,
            max_settings = config.max_settings,
            primary = %config.primary_address,
            "provisioner created"
        );
        Ok(Self {
            live: LiveState::empty(&config, WallClock::new()),
            config,
            settings,
            enabled: true,
            event_tx,
        })
    }

    pub fn config(&self) -> &ProvisionerConfig {
        &self.config
    }

    /// Whether new nodes may be provisioned.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ProvisionerEvent>> {
        self.event_tx.subscribe()
    }

    pub(crate) fn event_sender(&self) -> broadcast::Sender<Arc<ProvisionerEvent>> {
        self.event_tx.clone()
    }

    fn emit(&self, event: ProvisionerEvent) {
        let _ = self.event_tx.send(Arc::new(event));
    }

    // ── Keys ─────────────────────────────────────────────────────────

    /// Add a NetKey. `None` generates the key value.
    pub fn add_net_key(
        &mut self,
        value: Option<KeyValue>,
        index: IndexRequest,
    ) -> Result<KeyIndex, CoreError> {
        let net_index = self.live.keys.add_net_key(value, index)?;
        if index == IndexRequest::Generate {
            self.emit(ProvisionerEvent::NetKeyIndexGenerated { net_index });
        }
        Ok(net_index)
    }

    pub fn update_net_key(&mut self, value: KeyValue, index: KeyIndex) -> Result<(), CoreError> {
        self.live.keys.update_net_key(value, index)
    }

    pub fn net_key(&self, index: KeyIndex) -> Result<KeyValue, CoreError> {
        self.live.keys.net_key(index).cloned()
    }

    pub fn net_key_indexes(&self) -> Vec<KeyIndex> {
        self.live.keys.net_key_indexes().collect()
    }

    pub fn add_app_key(
        &mut self,
        value: Option<KeyValue>,
        net_index: KeyIndex,
        app_index: IndexRequest,
    ) -> Result<KeyIndex, CoreError> {
        let assigned = self.live.keys.add_app_key(value, net_index, app_index)?;
        if app_index == IndexRequest::Generate {
            self.emit(ProvisionerEvent::AppKeyIndexGenerated {
                net_index,
                app_index: assigned,
            });
        }
        Ok(assigned)
    }

    pub fn update_app_key(
        &mut self,
        value: KeyValue,
        net_index: KeyIndex,
        app_index: KeyIndex,
    ) -> Result<(), CoreError> {
        self.live.keys.update_app_key(value, net_index, app_index)
    }

    pub fn app_key(&self, net_index: KeyIndex, app_index: KeyIndex) -> Result<KeyValue, CoreError> {
        self.live.keys.app_key(net_index, app_index).cloned()
    }

    /// `(app_index, net_index)` pairs.
    pub fn app_key_indexes(&self) -> Vec<(KeyIndex, KeyIndex)> {
        self.live.keys.app_key_indexes().collect()
    }

    /// Bind an AppKey to a model on one of the local elements.
    pub fn bind_app_key_to_local_model(
        &mut self,
        element: Address,
        app_index: KeyIndex,
        model: ModelId,
    ) -> Result<(), CoreError> {
        let binding = AppKeyBinding {
            element,
            app_index,
            model,
        };
        self.live.keys.bind(binding, &self.config)
    }

    pub fn bindings(&self) -> &[AppKeyBinding] {
        self.live.keys.bindings()
    }

    // ── Nodes ────────────────────────────────────────────────────────

    /// Register a device that just finished provisioning.
    pub fn provisioning_complete(&mut self, node: NewNode) -> Result<u16, CoreError> {
        if !self.enabled {
            warn!(uuid = %node.uuid, "provisioning rejected: provisioner disabled");
            return Err(CoreError::invalid_state("add node", "the provisioner is disabled"));
        }
        let (uuid, unicast, element_count, net_index) =
            (node.uuid, node.unicast, node.element_count, node.net_index);
        let index = self.live.nodes.add(node, &self.live.keys, &self.config)?;
        self.emit(ProvisionerEvent::NodeProvisioned {
            index,
            uuid,
            unicast,
            element_count,
            net_index,
        });
        Ok(index)
    }

    pub fn store_composition_data(&mut self, addr: Address, data: Vec<u8>) -> Result<(), CoreError> {
        self.live.nodes.store_composition_data(addr, data)
    }

    pub fn set_node_name(&mut self, index: u16, name: &str) -> Result<(), CoreError> {
        self.live.nodes.set_name(index, name)
    }

    pub fn node_name(&self, index: u16) -> Result<Option<String>, CoreError> {
        self.live.nodes.name(index).map(|n| n.map(str::to_owned))
    }

    pub fn node_index_by_name(&self, name: &str) -> Option<u16> {
        self.live.nodes.index_by_name(name)
    }

    pub fn node_by_uuid(&self, uuid: Uuid) -> Option<&NodeRecord> {
        self.live.nodes.by_uuid(uuid)
    }

    pub fn node_by_address(&self, addr: Address) -> Option<&NodeRecord> {
        self.live.nodes.by_address(addr)
    }

    pub fn delete_node_by_uuid(&mut self, uuid: Uuid) -> Result<NodeRecord, CoreError> {
        self.live.nodes.delete_by_uuid(uuid)
    }

    pub fn delete_node_by_address(&mut self, addr: Address) -> Result<NodeRecord, CoreError> {
        self.live.nodes.delete_by_address(addr)
    }

    pub fn node_count(&self) -> usize {
        self.live.nodes.count()
    }

    /// The full node table, empty slots included.
    pub fn node_table(&self) -> &[Option<NodeRecord>] {
        self.live.nodes.table()
    }

    // ── Heartbeat filter ─────────────────────────────────────────────

    pub fn start_heartbeat_receiving(&mut self) {
        self.live.heartbeat.start_receiving();
    }

    pub fn stop_heartbeat_receiving(&mut self) {
        self.live.heartbeat.stop_receiving();
    }

    pub fn is_receiving_heartbeats(&self) -> bool {
        self.live.heartbeat.is_receiving()
    }

    pub fn heartbeat_filter_type(&self) -> FilterType {
        self.live.heartbeat.filter_type()
    }

    pub fn set_heartbeat_filter_type(&mut self, filter_type: FilterType) {
        self.live.heartbeat.set_filter_type(filter_type);
    }

    pub fn set_heartbeat_filter_info(
        &mut self,
        op: FilterOp,
        info: FilterInfo,
    ) -> Result<(), CoreError> {
        self.live.heartbeat.set_filter_info(op, info)
    }

    pub fn heartbeat_filter_entries(&mut self) -> Vec<HeartbeatFilterEntry> {
        self.live.heartbeat.entries()
    }

    /// Filter decision for a beacon from `src` to `dst`.
    pub fn evaluate_heartbeat(&mut self, src: Address, dst: Address) -> bool {
        self.live.heartbeat.evaluate(src, dst)
    }

    /// Entry point for the transport layer. Reports the heartbeat to
    /// subscribers when it passes the filter.
    pub fn on_heartbeat(&mut self, heartbeat: Heartbeat) -> bool {
        let pass = self.live.heartbeat.evaluate(heartbeat.src, heartbeat.dst);
        if pass {
            self.emit(ProvisionerEvent::HeartbeatReceived {
                hops: heartbeat.hops(),
                heartbeat,
            });
        }
        pass
    }

    // ── Settings sessions ────────────────────────────────────────────

    pub fn open_settings(&mut self, id: &SettingsId) -> Result<u8, CoreError> {
        self.settings.open(id)
    }

    /// Replace the live state with the session's snapshot and enable
    /// provisioning.
    pub fn restore_settings(&mut self, id: &SettingsId) -> Result<u8, CoreError> {
        let config = &self.config;
        let clock = self.live.heartbeat.clock();
        let live = &mut self.live;
        let slot = self.settings.restore(id, |data| {
            let snapshot = match data {
                Some(bytes) => SettingsSnapshot::decode(bytes)?,
                None => SettingsSnapshot::default(),
            };
            *live = LiveState::from_snapshot(config, snapshot, clock)?;
            Ok(())
        })?;
        self.enabled = true;
        info!(
            slot,
            net_keys = self.live.keys.net_key_indexes().count(),
            nodes = self.live.nodes.count(),
            "live state restored"
        );
        self.emit(ProvisionerEvent::SettingsRestored {
            slot,
            id: id.clone(),
        });
        Ok(slot)
    }

    /// Drop the live state, saving it first unless `erase` is set.
    /// Erasing also disables provisioning.
    pub fn release_settings(&mut self, id: &SettingsId, erase: bool) -> Result<u8, CoreError> {
        let live = &self.live;
        let slot = self
            .settings
            .release(id, erase, || live.snapshot().encode())?;
        self.live = LiveState::empty(&self.config, self.live.heartbeat.clock());
        if erase {
            self.enabled = false;
        }
        self.emit(ProvisionerEvent::SettingsReleased {
            slot,
            id: id.clone(),
            erased: erase,
        });
        Ok(slot)
    }

    /// Persist the live state to the restored session.
    pub fn commit_settings(&mut self) -> Result<u8, CoreError> {
        let live = &self.live;
        self.settings.commit(|| live.snapshot().encode())
    }

    pub fn close_settings(&mut self, id: &SettingsId) -> Result<u8, CoreError> {
        self.settings.close(id)
    }

    pub fn delete_settings(&mut self, id: &SettingsId) -> Result<u8, CoreError> {
        self.settings.delete(id)
    }

    pub fn erase_all_settings(&mut self) -> Result<(), CoreError> {
        self.settings.erase_all()
    }

    pub fn settings_user_id(&self, index: u8) -> Result<Option<String>, CoreError> {
        self.settings.user_id(index).map(|u| u.map(str::to_owned))
    }

    pub fn settings_index_of(&self, user_id: &str) -> Option<u8> {
        self.settings.index_of(user_id)
    }

    pub fn free_settings_user_id_count(&self) -> usize {
        self.settings.free_user_id_count()
    }

    pub fn settings_state(&self, id: &SettingsId) -> Result<SessionState, CoreError> {
        self.settings.state(id)
    }

    pub fn active_settings(&self) -> Option<(u8, SettingsId)> {
        self.settings.active()
    }

    pub fn settings_slots(&self) -> Vec<SlotInfo> {
        self.settings.slots()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::settings::MemoryStorage;

    fn provisioner() -> (Provisioner, MemoryStorage) {
        let storage = MemoryStorage::new();
        let p = Provisioner::new(ProvisionerConfig::default(), Box::new(storage.clone())).unwrap();
        (p, storage)
    }

    fn idx(raw: u16) -> KeyIndex {
        KeyIndex::new(raw).unwrap()
    }

    fn new_node(uuid: u128, unicast: u16) -> NewNode {
        NewNode {
            uuid: Uuid::from_u128(uuid),
            unicast: Address::new(unicast),
            element_count: 1,
            net_index: idx(0),
            device_key: KeyValue::new([3; 16]),
        }
    }

    #[test]
    fn generated_indexes_are_announced() {
        let (mut p, _) = provisioner();
        let mut events = p.subscribe();

        let net = p.add_net_key(None, IndexRequest::Generate).unwrap();
        p.add_net_key(None, IndexRequest::Exact(idx(5))).unwrap();
        let app = p.add_app_key(None, net, IndexRequest::Generate).unwrap();

        assert_eq!(
            *events.try_recv().unwrap(),
            ProvisionerEvent::NetKeyIndexGenerated { net_index: net }
        );
        assert_eq!(
            *events.try_recv().unwrap(),
            ProvisionerEvent::AppKeyIndexGenerated {
                net_index: net,
                app_index: app
            }
        );
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn provisioning_emits_node_index() {
        let (mut p, _) = provisioner();
        p.add_net_key(None, IndexRequest::Exact(idx(0))).unwrap();
        let mut events = p.subscribe();

        let index = p.provisioning_complete(new_node(1, 0x10)).unwrap();
        match &*events.try_recv().unwrap() {
            ProvisionerEvent::NodeProvisioned { index: i, unicast, .. } => {
                assert_eq!(*i, index);
                assert_eq!(*unicast, Address::new(0x10));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn heartbeat_events_follow_the_filter() {
        let (mut p, _) = provisioner();
        let mut events = p.subscribe();
        let hb = Heartbeat {
            src: Address::new(0x10),
            dst: Address::new(0x01),
            init_ttl: 5,
            rx_ttl: 3,
            features: 0b0011,
            rssi: -70,
        };

        assert!(!p.on_heartbeat(hb));
        p.start_heartbeat_receiving();
        assert!(p.on_heartbeat(hb));
        p.set_heartbeat_filter_info(FilterOp::Add, FilterInfo::src(hb.src))
            .unwrap();
        assert!(!p.on_heartbeat(hb));

        assert_eq!(
            *events.try_recv().unwrap(),
            ProvisionerEvent::HeartbeatReceived {
                heartbeat: hb,
                hops: 3
            }
        );
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn erase_release_disables_provisioning() {
        let (mut p, _) = provisioner();
        let id = SettingsId::Index(0);
        p.open_settings(&id).unwrap();
        p.restore_settings(&id).unwrap();
        p.add_net_key(None, IndexRequest::Exact(idx(0))).unwrap();
        p.release_settings(&id, true).unwrap();
        assert!(!p.is_enabled());

        p.add_net_key(None, IndexRequest::Exact(idx(0))).unwrap();
        assert!(matches!(
            p.provisioning_complete(new_node(1, 0x10)),
            Err(CoreError::InvalidState { .. })
        ));

        p.open_settings(&id).unwrap();
        p.restore_settings(&id).unwrap();
        assert!(p.is_enabled());
        assert!(p.net_key_indexes().is_empty());
    }

    #[test]
    fn corrupt_region_keeps_live_state() {
        let (mut p, mut storage) = provisioner();
        storage.open(1).unwrap();
        storage.write_all(1, b"{ not a snapshot").unwrap();
        storage.close(1).unwrap();

        p.add_net_key(Some(KeyValue::new([1; 16])), IndexRequest::Exact(idx(2)))
            .unwrap();
        let id = SettingsId::Index(1);
        p.open_settings(&id).unwrap();
        assert!(matches!(p.restore_settings(&id), Err(CoreError::Codec { .. })));
        assert_eq!(p.net_key(idx(2)).unwrap(), KeyValue::new([1; 16]));
        assert_eq!(p.settings_state(&id).unwrap(), SessionState::Open);
    }

    #[test]
    fn commit_writes_without_releasing() {
        let (mut p, storage) = provisioner();
        let id = SettingsId::user_id("field");
        p.open_settings(&id).unwrap();
        p.restore_settings(&id).unwrap();
        p.add_net_key(Some(KeyValue::new([4; 16])), IndexRequest::Exact(idx(1)))
            .unwrap();
        let slot = p.commit_settings().unwrap();

        let stored = SettingsSnapshot::decode(&storage.region(slot).unwrap()).unwrap();
        assert_eq!(stored.net_keys.len(), 1);
        assert_eq!(p.net_key(idx(1)).unwrap(), KeyValue::new([4; 16]));
    }
}
