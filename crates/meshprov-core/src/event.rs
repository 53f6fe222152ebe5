// ── Provisioner events ──
//
// Fire-and-forget notifications broadcast to every subscriber. Sending
// never fails the operation that produced the event; without subscribers
// the event is simply dropped.

use serde::Serialize;
use uuid::Uuid;

use crate::model::{Address, Heartbeat, KeyIndex, SettingsId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProvisionerEvent {
    /// A NetKey was added with a store-allocated index.
    NetKeyIndexGenerated { net_index: KeyIndex },

    /// An AppKey was added with a store-allocated index.
    AppKeyIndexGenerated {
        net_index: KeyIndex,
        app_index: KeyIndex,
    },

    NodeProvisioned {
        index: u16,
        uuid: Uuid,
        unicast: Address,
        element_count: u8,
        net_index: KeyIndex,
    },

    /// A heartbeat passed the filter.
    HeartbeatReceived { heartbeat: Heartbeat, hops: u8 },

    SettingsRestored { slot: u8, id: SettingsId },

    SettingsReleased {
        slot: u8,
        id: SettingsId,
        erased: bool,
    },
}
