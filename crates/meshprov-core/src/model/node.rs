// ── Provisioned node records ──

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::address::Address;
use super::key::{KeyIndex, KeyValue};

/// Longest node name accepted, in UTF-8 bytes.
pub const NODE_NAME_MAX_LEN: usize = 31;

/// Raw node-table index meaning "no such node".
pub const NODE_INDEX_INVALID: u16 = 0xFFFF;

/// A device that completed provisioning.
///
/// `index` is the node's slot in the fixed-capacity node table. It is
/// reported in the provisioning-complete event and stays stable until the
/// node is deleted, regardless of other deletions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub index: u16,
    pub uuid: Uuid,
    pub unicast: Address,
    pub element_count: u8,
    pub net_index: KeyIndex,
    pub device_key: KeyValue,
    pub name: Option<String>,
    pub composition_data: Option<Vec<u8>>,
}

impl NodeRecord {
    /// Whether `addr` is one of this node's element addresses.
    pub fn covers(&self, addr: Address) -> bool {
        let first = self.unicast.raw();
        let end = u32::from(first) + u32::from(self.element_count);
        (u32::from(first)..end).contains(&u32::from(addr.raw()))
    }

    /// Whether this node's element range intersects `[start, start + count)`.
    pub(crate) fn overlaps(&self, start: Address, count: u8) -> bool {
        let a0 = u32::from(self.unicast.raw());
        let a1 = a0 + u32::from(self.element_count);
        let b0 = u32::from(start.raw());
        let b1 = b0 + u32::from(count);
        a0 < b1 && b0 < a1
    }
}

/// Everything the provisioning procedure hands over once a device joins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNode {
    pub uuid: Uuid,
    pub unicast: Address,
    pub element_count: u8,
    pub net_index: KeyIndex,
    pub device_key: KeyValue,
}
