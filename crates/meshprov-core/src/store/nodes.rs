// ── Node registry ──
//
// Fixed-capacity table of provisioned nodes. A node's table index is its
// arena slot and stays put until the node is deleted.

use tracing::{debug, info};
use uuid::Uuid;

use super::arena::SlotArena;
use super::keys::KeyStore;
use crate::config::ProvisionerConfig;
use crate::error::CoreError;
use crate::model::{Address, NODE_INDEX_INVALID, NODE_NAME_MAX_LEN, NewNode, NodeRecord};

#[derive(Debug, Clone)]
pub struct NodeRegistry {
    table: SlotArena<NodeRecord>,
}

impl NodeRegistry {
    pub fn new(max_nodes: usize) -> Self {
        Self {
            table: SlotArena::new(max_nodes),
        }
    }

    /// Register a freshly provisioned node in the lowest free slot.
    pub fn add(
        &mut self,
        node: NewNode,
        keys: &KeyStore,
        config: &ProvisionerConfig,
    ) -> Result<u16, CoreError> {
        self.check_new(&node, keys, config)?;
        let (uuid, unicast, elements) = (node.uuid, node.unicast, node.element_count);
        let full = CoreError::exhausted("node slots", self.table.capacity());
        let slot = self.table.try_insert_with(full, |slot| {
            Ok(NodeRecord {
                index: slot_index(slot)?,
                uuid: node.uuid,
                unicast: node.unicast,
                element_count: node.element_count,
                net_index: node.net_index,
                device_key: node.device_key,
                name: None,
                composition_data: None,
            })
        })?;
        let index = slot_index(slot)?;
        info!(index, %uuid, %unicast, elements, "node provisioned");
        Ok(index)
    }

    fn check_new(
        &self,
        node: &NewNode,
        keys: &KeyStore,
        config: &ProvisionerConfig,
    ) -> Result<(), CoreError> {
        if node.element_count == 0 {
            return Err(CoreError::invalid_argument(
                "element count",
                "a node has at least one element",
            ));
        }
        if !node.unicast.is_unicast() {
            return Err(CoreError::invalid_argument(
                "unicast",
                format!("{} is not a unicast address", node.unicast),
            ));
        }
        if node.unicast.offset(u16::from(node.element_count) - 1).is_none() {
            return Err(CoreError::invalid_argument(
                "unicast",
                format!(
                    "{} elements starting at {} leave the unicast range",
                    node.element_count, node.unicast
                ),
            ));
        }
        if !keys.has_net_key(node.net_index) {
            return Err(CoreError::InvalidReference {
                entity_type: "node".into(),
                target: format!("NetKey {}", node.net_index),
            });
        }
        if self.by_uuid(node.uuid).is_some() {
            return Err(CoreError::conflict(format!(
                "device {} is already provisioned",
                node.uuid
            )));
        }
        if let Some(other) = self
            .table
            .values()
            .find(|n| n.overlaps(node.unicast, node.element_count))
        {
            return Err(CoreError::conflict(format!(
                "address range overlaps node {} at {}",
                other.index, other.unicast
            )));
        }
        if config.overlaps_local(node.unicast, node.element_count) {
            return Err(CoreError::conflict(format!(
                "address range at {} overlaps the provisioner's own elements",
                node.unicast
            )));
        }
        if self.table.is_full() {
            return Err(CoreError::exhausted("node slots", self.table.capacity()));
        }
        Ok(())
    }

    // ── Mutation ─────────────────────────────────────────────────────

    /// Store (or overwrite) the composition data of the node owning `addr`.
    pub fn store_composition_data(&mut self, addr: Address, data: Vec<u8>) -> Result<(), CoreError> {
        if data.is_empty() {
            return Err(CoreError::invalid_argument(
                "composition data",
                "must not be empty",
            ));
        }
        let slot = self
            .slot_by_address(addr)
            .ok_or_else(|| CoreError::not_found("node", addr))?;
        if let Some(node) = self.table.get_mut(slot) {
            debug!(index = node.index, bytes = data.len(), "composition data stored");
            node.composition_data = Some(data);
        }
        Ok(())
    }

    pub fn set_name(&mut self, index: u16, name: &str) -> Result<(), CoreError> {
        validate_name(name)?;
        let node = self
            .table
            .get_mut(usize::from(index))
            .ok_or_else(|| CoreError::not_found("node", index))?;
        node.name = Some(name.to_owned());
        debug!(index, name, "node renamed");
        Ok(())
    }

    pub fn delete_by_uuid(&mut self, uuid: Uuid) -> Result<NodeRecord, CoreError> {
        let slot = self
            .table
            .position(|n| n.uuid == uuid)
            .ok_or_else(|| CoreError::not_found("node", uuid))?;
        self.delete_slot(slot)
    }

    pub fn delete_by_address(&mut self, addr: Address) -> Result<NodeRecord, CoreError> {
        let slot = self
            .slot_by_address(addr)
            .ok_or_else(|| CoreError::not_found("node", addr))?;
        self.delete_slot(slot)
    }

    fn delete_slot(&mut self, slot: usize) -> Result<NodeRecord, CoreError> {
        let node = self
            .table
            .remove(slot)
            .ok_or_else(|| CoreError::not_found("node", slot))?;
        info!(index = node.index, uuid = %node.uuid, "node deleted");
        Ok(node)
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Name of the node in table slot `index`; `Ok(None)` when unnamed.
    pub fn name(&self, index: u16) -> Result<Option<&str>, CoreError> {
        self.table
            .get(usize::from(index))
            .map(|n| n.name.as_deref())
            .ok_or_else(|| CoreError::not_found("node", index))
    }

    /// Table index of the first node named `name`.
    pub fn index_by_name(&self, name: &str) -> Option<u16> {
        self.table
            .values()
            .find(|n| n.name.as_deref() == Some(name))
            .map(|n| n.index)
    }

    pub fn by_uuid(&self, uuid: Uuid) -> Option<&NodeRecord> {
        self.table.values().find(|n| n.uuid == uuid)
    }

    /// The node owning `addr` as any of its element addresses.
    pub fn by_address(&self, addr: Address) -> Option<&NodeRecord> {
        self.table.values().find(|n| n.covers(addr))
    }

    pub fn by_index(&self, index: u16) -> Option<&NodeRecord> {
        self.table.get(usize::from(index))
    }

    pub fn count(&self) -> usize {
        self.table.len()
    }

    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// The whole table, empty slots included.
    pub fn table(&self) -> &[Option<NodeRecord>] {
        self.table.as_slice()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NodeRecord> {
        self.table.values()
    }

    fn slot_by_address(&self, addr: Address) -> Option<usize> {
        self.table.position(|n| n.covers(addr))
    }

    // ── Snapshot support ─────────────────────────────────────────────

    /// Rebuild a registry from persisted records at their saved indexes.
    pub(crate) fn from_records(
        config: &ProvisionerConfig,
        keys: &KeyStore,
        records: Vec<NodeRecord>,
    ) -> Result<Self, CoreError> {
        let mut registry = Self::new(config.max_nodes);
        for record in records {
            let slot = usize::from(record.index);
            if registry.table.get(slot).is_some() {
                return Err(CoreError::codec(format!("node index {slot} appears twice")));
            }
            if let Some(name) = &record.name {
                validate_name(name).map_err(CoreError::codec)?;
            }
            let new = NewNode {
                uuid: record.uuid,
                unicast: record.unicast,
                element_count: record.element_count,
                net_index: record.net_index,
                device_key: record.device_key.clone(),
            };
            registry
                .check_new(&new, keys, config)
                .map_err(CoreError::codec)?;
            registry.table.insert_at(slot, record).map_err(|r| {
                CoreError::codec(format!(
                    "node index {} exceeds the table size {}",
                    r.index, config.max_nodes
                ))
            })?;
        }
        Ok(registry)
    }
}

fn validate_name(name: &str) -> Result<(), CoreError> {
    if name.is_empty() {
        return Err(CoreError::invalid_argument("node name", "must not be empty"));
    }
    if name.len() > NODE_NAME_MAX_LEN {
        return Err(CoreError::invalid_argument(
            "node name",
            format!("longer than {NODE_NAME_MAX_LEN} bytes"),
        ));
    }
    Ok(())
}

fn slot_index(slot: usize) -> Result<u16, CoreError> {
    u16::try_from(slot)
        .ok()
        .filter(|i| *i != NODE_INDEX_INVALID)
        .ok_or_else(|| CoreError::exhausted("node slots", usize::from(NODE_INDEX_INVALID)))
}
