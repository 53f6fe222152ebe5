//! End-to-end behaviour of the provisioner across settings sessions,
//! key and node stores, and the heartbeat filter.
#![allow(clippy::unwrap_used)]

use std::time::Duration;

use meshprov_core::{
    Address, CoreError, FileStorage, FilterInfo, FilterOp, FilterType, IndexRequest, KeyIndex,
    KeyValue, MemoryStorage, NewNode, Provisioner, ProvisionerConfig, SessionState, SettingsId,
};
use pretty_assertions::assert_eq;
use uuid::Uuid;

// ── Helpers ─────────────────────────────────────────────────────────

fn provisioner(storage: &MemoryStorage) -> Provisioner {
    Provisioner::new(ProvisionerConfig::default(), Box::new(storage.clone())).unwrap()
}

fn idx(raw: u16) -> KeyIndex {
    KeyIndex::new(raw).unwrap()
}

fn node(uuid: u128, unicast: u16, elements: u8) -> NewNode {
    NewNode {
        uuid: Uuid::from_u128(uuid),
        unicast: Address::new(unicast),
        element_count: elements,
        net_index: idx(0x10),
        device_key: KeyValue::new([0xD0; 16]),
    }
}

fn open_and_restore(p: &mut Provisioner, id: &SettingsId) {
    p.open_settings(id).unwrap();
    p.restore_settings(id).unwrap();
}

// ── Settings round trips ────────────────────────────────────────────

#[test]
fn net_key_survives_release_and_restore() {
    let storage = MemoryStorage::new();
    let mut p = provisioner(&storage);
    let id = SettingsId::Index(2);
    let key = KeyValue::new([0x42; 16]);

    open_and_restore(&mut p, &id);
    p.add_net_key(Some(key.clone()), IndexRequest::Exact(idx(0x10)))
        .unwrap();
    p.release_settings(&id, false).unwrap();
    assert!(p.net_key_indexes().is_empty());

    open_and_restore(&mut p, &id);
    assert_eq!(p.net_key(idx(0x10)).unwrap(), key);
}

#[test]
fn full_state_survives_a_process_restart() {
    let dir = tempfile::tempdir().unwrap();
    let id = SettingsId::user_id("greenhouse");

    {
        let storage = FileStorage::new(dir.path()).unwrap();
        let mut p = Provisioner::new(ProvisionerConfig::default(), Box::new(storage)).unwrap();
        open_and_restore(&mut p, &id);
        p.add_net_key(None, IndexRequest::Exact(idx(0x10))).unwrap();
        let app = p
            .add_app_key(None, idx(0x10), IndexRequest::Generate)
            .unwrap();
        p.bind_app_key_to_local_model(
            Address::new(0x0001),
            app,
            meshprov_core::ModelId::Sig { model_id: 0x1001 },
        )
        .unwrap();
        p.provisioning_complete(node(1, 0x0100, 2)).unwrap();
        p.provisioning_complete(node(2, 0x0200, 1)).unwrap();
        p.set_node_name(1, "vent").unwrap();
        p.delete_node_by_uuid(Uuid::from_u128(1)).unwrap();
        p.start_heartbeat_receiving();
        p.set_heartbeat_filter_info(FilterOp::Add, FilterInfo::src(Address::new(0x0200)))
            .unwrap();
        p.release_settings(&id, false).unwrap();
        p.close_settings(&id).unwrap();
    }

    let storage = FileStorage::new(dir.path()).unwrap();
    let mut p = Provisioner::new(ProvisionerConfig::default(), Box::new(storage)).unwrap();
    assert_eq!(p.settings_index_of("greenhouse"), Some(0));
    open_and_restore(&mut p, &id);

    assert_eq!(p.node_count(), 1);
    let vent = p.node_by_address(Address::new(0x0200)).unwrap();
    assert_eq!(vent.index, 1);
    assert_eq!(vent.name.as_deref(), Some("vent"));
    assert_eq!(p.node_index_by_name("vent"), Some(1));
    assert_eq!(p.bindings().len(), 1);
    assert_eq!(p.app_key_indexes(), vec![(idx(0), idx(0x10))]);
    assert!(!p.evaluate_heartbeat(Address::new(0x0200), Address::new(0x0001)));
    assert!(p.evaluate_heartbeat(Address::new(0x0300), Address::new(0x0001)));

    // The freed slot is reused by the next node.
    assert_eq!(p.provisioning_complete(node(3, 0x0300, 1)).unwrap(), 0);
}

#[test]
fn sessions_are_isolated() {
    let storage = MemoryStorage::new();
    let mut p = provisioner(&storage);
    let a = SettingsId::user_id("a");
    let b = SettingsId::user_id("b");

    open_and_restore(&mut p, &a);
    p.add_net_key(None, IndexRequest::Exact(idx(1))).unwrap();
    p.release_settings(&a, false).unwrap();
    p.close_settings(&a).unwrap();

    open_and_restore(&mut p, &b);
    assert!(p.net_key_indexes().is_empty());
    assert!(matches!(
        p.open_settings(&a).and_then(|_| p.restore_settings(&a)),
        Err(CoreError::Conflict { .. })
    ));
    assert_eq!(p.settings_state(&a).unwrap(), SessionState::Open);
}

#[test]
fn erase_release_wipes_the_session() {
    let storage = MemoryStorage::new();
    let mut p = provisioner(&storage);
    let id = SettingsId::user_id("scratch");

    open_and_restore(&mut p, &id);
    p.add_net_key(None, IndexRequest::Exact(idx(0))).unwrap();
    p.commit_settings().unwrap();
    assert!(storage.region(0).is_some());

    p.release_settings(&id, true).unwrap();
    assert!(storage.region(0).is_none());
    assert_eq!(p.settings_index_of("scratch"), None);
    assert!(!p.is_enabled());
    p.close_settings(&id).unwrap();
    assert_eq!(p.free_settings_user_id_count(), 4);
}

#[test]
fn erase_all_needs_every_session_closed() {
    let storage = MemoryStorage::new();
    let mut p = provisioner(&storage);
    let id = SettingsId::Index(3);
    open_and_restore(&mut p, &id);
    assert!(matches!(p.erase_all_settings(), Err(CoreError::Conflict { .. })));
    p.release_settings(&id, false).unwrap();
    p.close_settings(&id).unwrap();
    p.erase_all_settings().unwrap();
    assert!(storage.region(3).is_none());
}

// ── Node registry ───────────────────────────────────────────────────

#[test]
fn deleting_an_unknown_node_changes_nothing() {
    let storage = MemoryStorage::new();
    let mut p = provisioner(&storage);
    p.add_net_key(None, IndexRequest::Exact(idx(0x10))).unwrap();
    p.provisioning_complete(node(1, 0x0100, 1)).unwrap();

    assert!(matches!(
        p.delete_node_by_uuid(Uuid::from_u128(77)),
        Err(CoreError::NotFound { .. })
    ));
    assert_eq!(p.node_count(), 1);
}

#[test]
fn failed_operations_leave_state_unchanged() {
    let storage = MemoryStorage::new();
    let mut p = provisioner(&storage);
    p.add_net_key(None, IndexRequest::Exact(idx(0x10))).unwrap();

    assert!(matches!(
        p.add_app_key(None, idx(0x11), IndexRequest::Generate),
        Err(CoreError::InvalidReference { .. })
    ));
    assert!(p.app_key_indexes().is_empty());

    p.provisioning_complete(node(1, 0x0100, 4)).unwrap();
    assert!(matches!(
        p.provisioning_complete(node(2, 0x0102, 1)),
        Err(CoreError::Conflict { .. })
    ));
    assert_eq!(p.node_count(), 1);
    assert!(p.node_table()[1].is_none());
}

// ── Heartbeat filter ────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn whitelist_entry_expires_and_disappears() {
    let storage = MemoryStorage::new();
    let mut p = provisioner(&storage);
    p.start_heartbeat_receiving();
    p.set_heartbeat_filter_type(FilterType::Whitelist);
    p.set_heartbeat_filter_info(
        FilterOp::Add,
        FilterInfo::src(Address::new(0x0010)).with_expiry(5),
    )
    .unwrap();

    assert!(p.evaluate_heartbeat(Address::new(0x0010), Address::new(0x0001)));

    tokio::time::advance(Duration::from_secs(10)).await;
    assert!(!p.evaluate_heartbeat(Address::new(0x0010), Address::new(0x0001)));
    assert!(p.heartbeat_filter_entries().is_empty());
}

#[tokio::test(start_paused = true)]
async fn whitelist_entry_keeps_ageing_while_released() {
    let storage = MemoryStorage::new();
    let mut p = provisioner(&storage);
    let id = SettingsId::Index(0);

    open_and_restore(&mut p, &id);
    p.start_heartbeat_receiving();
    p.set_heartbeat_filter_type(FilterType::Whitelist);
    p.set_heartbeat_filter_info(
        FilterOp::Add,
        FilterInfo::src(Address::new(0x0010)).with_expiry(5),
    )
    .unwrap();
    p.set_heartbeat_filter_info(
        FilterOp::Add,
        FilterInfo::src(Address::new(0x0020)).with_expiry(30),
    )
    .unwrap();
    p.release_settings(&id, false).unwrap();
    p.close_settings(&id).unwrap();

    tokio::time::advance(Duration::from_secs(10)).await;

    open_and_restore(&mut p, &id);
    assert!(!p.evaluate_heartbeat(Address::new(0x0010), Address::new(0x0001)));
    assert!(p.evaluate_heartbeat(Address::new(0x0020), Address::new(0x0001)));
    let entries = p.heartbeat_filter_entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].src, Some(Address::new(0x0020)));
    assert_eq!(entries[0].remaining, Some(Duration::from_secs(20)));
}

#[test]
fn filter_state_is_per_session() {
    let storage = MemoryStorage::new();
    let mut p = provisioner(&storage);
    let id = SettingsId::Index(0);

    open_and_restore(&mut p, &id);
    p.start_heartbeat_receiving();
    p.set_heartbeat_filter_type(FilterType::Whitelist);
    p.set_heartbeat_filter_info(FilterOp::Add, FilterInfo::dst(Address::new(0xC001)))
        .unwrap();
    p.release_settings(&id, false).unwrap();

    assert!(!p.is_receiving_heartbeats());

    open_and_restore(&mut p, &id);
    assert!(p.is_receiving_heartbeats());
    assert_eq!(p.heartbeat_filter_type(), FilterType::Whitelist);
    assert!(p.evaluate_heartbeat(Address::new(0x0030), Address::new(0xC001)));
    assert!(!p.evaluate_heartbeat(Address::new(0x0030), Address::new(0xC002)));
}
