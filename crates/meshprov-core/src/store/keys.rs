// ── Key store ──
//
// NetKey and AppKey records plus the AppKey bindings recorded for local
// models. Every mutator validates before touching the maps, so an error
// leaves the store unchanged.

use std::collections::BTreeMap;

use tracing::debug;

use crate::config::ProvisionerConfig;
use crate::error::CoreError;
use crate::model::{
    AppKeyBinding, AppKeyRecord, IndexRequest, KeyIndex, KeyKind, KeyValue, NetKeyRecord,
};

#[derive(Debug, Clone, PartialEq, Eq)]
struct AppKeyEntry {
    net_index: KeyIndex,
    value: KeyValue,
}

/// Bounded store of network and application keys.
#[derive(Debug, Clone)]
pub struct KeyStore {
    net_keys: BTreeMap<KeyIndex, KeyValue>,
    app_keys: BTreeMap<KeyIndex, AppKeyEntry>,
    bindings: Vec<AppKeyBinding>,
    max_net_keys: usize,
    max_app_keys: usize,
}

impl KeyStore {
    pub fn new(max_net_keys: usize, max_app_keys: usize) -> Self {
        Self {
            net_keys: BTreeMap::new(),
            app_keys: BTreeMap::new(),
            bindings: Vec::new(),
            max_net_keys,
            max_app_keys,
        }
    }

    // ── NetKeys ──────────────────────────────────────────────────────

    /// Add a NetKey. `value == None` synthesizes fresh key material.
    pub fn add_net_key(
        &mut self,
        value: Option<KeyValue>,
        index: IndexRequest,
    ) -> Result<KeyIndex, CoreError> {
        if self.net_keys.len() >= self.max_net_keys {
            return Err(CoreError::exhausted("NetKey slots", self.max_net_keys));
        }
        let index = allocate(&self.net_keys, index, KeyKind::Net)?;
        self.net_keys
            .insert(index, value.unwrap_or_else(KeyValue::generate));
        debug!(net_idx = %index, "NetKey added");
        Ok(index)
    }

    pub fn update_net_key(&mut self, value: KeyValue, index: KeyIndex) -> Result<(), CoreError> {
        let slot = self
            .net_keys
            .get_mut(&index)
            .ok_or_else(|| CoreError::not_found("NetKey", index))?;
        *slot = value;
        debug!(net_idx = %index, "NetKey updated");
        Ok(())
    }

    pub fn net_key(&self, index: KeyIndex) -> Result<&KeyValue, CoreError> {
        self.net_keys
            .get(&index)
            .ok_or_else(|| CoreError::not_found("NetKey", index))
    }

    pub fn has_net_key(&self, index: KeyIndex) -> bool {
        self.net_keys.contains_key(&index)
    }

    pub fn net_key_indexes(&self) -> impl Iterator<Item = KeyIndex> + '_ {
        self.net_keys.keys().copied()
    }

    // ── AppKeys ──────────────────────────────────────────────────────

    /// Add an AppKey bound to an existing NetKey.
    pub fn add_app_key(
        &mut self,
        value: Option<KeyValue>,
        net_index: KeyIndex,
        app_index: IndexRequest,
    ) -> Result<KeyIndex, CoreError> {
        if !self.has_net_key(net_index) {
            return Err(CoreError::InvalidReference {
                entity_type: "AppKey".into(),
                target: format!("NetKey {net_index}"),
            });
        }
        if self.app_keys.len() >= self.max_app_keys {
            return Err(CoreError::exhausted("AppKey slots", self.max_app_keys));
        }
        let app_index = allocate(&self.app_keys, app_index, KeyKind::App)?;
        self.app_keys.insert(
            app_index,
            AppKeyEntry {
                net_index,
                value: value.unwrap_or_else(KeyValue::generate),
            },
        );
        debug!(app_idx = %app_index, net_idx = %net_index, "AppKey added");
        Ok(app_index)
    }

    pub fn update_app_key(
        &mut self,
        value: KeyValue,
        net_index: KeyIndex,
        app_index: KeyIndex,
    ) -> Result<(), CoreError> {
        let bound_to = self
            .app_keys
            .get(&app_index)
            .map(|e| e.net_index)
            .ok_or_else(|| CoreError::not_found("AppKey", app_index))?;
        if bound_to != net_index || !self.has_net_key(net_index) {
            return Err(CoreError::InvalidReference {
                entity_type: format!("AppKey {app_index}"),
                target: format!("NetKey {net_index}"),
            });
        }
        if let Some(entry) = self.app_keys.get_mut(&app_index) {
            entry.value = value;
        }
        debug!(app_idx = %app_index, net_idx = %net_index, "AppKey updated");
        Ok(())
    }

    /// The AppKey at `app_index`, only if it belongs to `net_index`.
    pub fn app_key(&self, net_index: KeyIndex, app_index: KeyIndex) -> Result<&KeyValue, CoreError> {
        self.app_keys
            .get(&app_index)
            .filter(|e| e.net_index == net_index)
            .map(|e| &e.value)
            .ok_or_else(|| CoreError::not_found("AppKey", app_index))
    }

    /// `(app_index, net_index)` pairs in index order.
    pub fn app_key_indexes(&self) -> impl Iterator<Item = (KeyIndex, KeyIndex)> + '_ {
        self.app_keys.iter().map(|(app, e)| (*app, e.net_index))
    }

    // ── Bindings ─────────────────────────────────────────────────────

    /// Record that `binding.app_index` is bound to a model on a local
    /// element. Binding an existing tuple again is a no-op.
    pub fn bind(
        &mut self,
        binding: AppKeyBinding,
        config: &ProvisionerConfig,
    ) -> Result<(), CoreError> {
        if !self.app_keys.contains_key(&binding.app_index) {
            return Err(CoreError::InvalidReference {
                entity_type: "binding".into(),
                target: format!("AppKey {}", binding.app_index),
            });
        }
        if !config.hosts_model(binding.element, binding.model) {
            return Err(CoreError::not_found(
                "local model",
                format!("{} on element {}", binding.model, binding.element),
            ));
        }
        if !self.bindings.contains(&binding) {
            self.bindings.push(binding);
            debug!(
                element = %binding.element,
                app_idx = %binding.app_index,
                model = %binding.model,
                "AppKey bound to local model"
            );
        }
        Ok(())
    }

    pub fn bindings(&self) -> &[AppKeyBinding] {
        &self.bindings
    }

    // ── Snapshot support ─────────────────────────────────────────────

    pub fn net_key_records(&self) -> Vec<NetKeyRecord> {
        self.net_keys
            .iter()
            .map(|(index, value)| NetKeyRecord {
                net_index: *index,
                value: value.clone(),
            })
            .collect()
    }

    pub fn app_key_records(&self) -> Vec<AppKeyRecord> {
        self.app_keys
            .iter()
            .map(|(index, e)| AppKeyRecord {
                app_index: *index,
                net_index: e.net_index,
                value: e.value.clone(),
            })
            .collect()
    }

    /// Rebuild a store from persisted records, rejecting anything that
    /// violates the live invariants.
    pub(crate) fn from_records(
        config: &ProvisionerConfig,
        net_keys: Vec<NetKeyRecord>,
        app_keys: Vec<AppKeyRecord>,
        bindings: Vec<AppKeyBinding>,
    ) -> Result<Self, CoreError> {
        let mut store = Self::new(config.max_net_keys, config.max_app_keys);
        for record in net_keys {
            store
                .add_net_key(Some(record.value), IndexRequest::Exact(record.net_index))
                .map_err(CoreError::codec)?;
        }
        for record in app_keys {
            store
                .add_app_key(
                    Some(record.value),
                    record.net_index,
                    IndexRequest::Exact(record.app_index),
                )
                .map_err(CoreError::codec)?;
        }
        for binding in bindings {
            store.bind(binding, config).map_err(CoreError::codec)?;
        }
        Ok(store)
    }
}

/// Resolve an index request against the indexes already in `map`.
fn allocate<V>(
    map: &BTreeMap<KeyIndex, V>,
    request: IndexRequest,
    kind: KeyKind,
) -> Result<KeyIndex, CoreError> {
    match request {
        IndexRequest::Exact(index) if map.contains_key(&index) => Err(CoreError::DuplicateIndex {
            entity_type: kind.to_string(),
            index: index.raw(),
        }),
        IndexRequest::Exact(index) => Ok(index),
        IndexRequest::Generate => KeyIndex::all()
            .find(|i| !map.contains_key(i))
            .ok_or_else(|| {
                CoreError::exhausted(&format!("{kind} index"), usize::from(KeyIndex::MAX) + 1)
            }),
    }
}
