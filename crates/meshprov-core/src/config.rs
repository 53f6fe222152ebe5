// ── Runtime provisioner configuration ──
//
// Capacities and the local composition the provisioner runs with.
// Never touches disk: the CLI (through meshprov-config) builds a
// `ProvisionerConfig` and hands it in.

use crate::error::CoreError;
use crate::model::{Address, ModelId};

/// Configuration server model.
pub const MODEL_CONFIG_SERVER: u16 = 0x0000;
/// Configuration client model.
pub const MODEL_CONFIG_CLIENT: u16 = 0x0001;
/// Health server model.
pub const MODEL_HEALTH_SERVER: u16 = 0x0002;
/// Generic OnOff client model.
pub const MODEL_GENERIC_ONOFF_CLIENT: u16 = 0x1001;

/// One element of the provisioner's own composition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalElement {
    pub models: Vec<ModelId>,
}

impl LocalElement {
    pub fn new(models: impl IntoIterator<Item = ModelId>) -> Self {
        Self {
            models: models.into_iter().collect(),
        }
    }
}

/// Capacities and composition for one provisioner instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionerConfig {
    pub max_nodes: usize,
    pub max_net_keys: usize,
    pub max_app_keys: usize,
    pub max_filter_entries: usize,
    /// Number of settings slots. Slot indexes are `0..max_settings`.
    pub max_settings: usize,
    /// Unicast address of the first local element.
    pub primary_address: Address,
    pub elements: Vec<LocalElement>,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            max_nodes: 10,
            max_net_keys: 3,
            max_app_keys: 3,
            max_filter_entries: 10,
            max_settings: 4,
            primary_address: Address::new(0x0001),
            elements: vec![LocalElement::new([
                ModelId::Sig {
                    model_id: MODEL_CONFIG_SERVER,
                },
                ModelId::Sig {
                    model_id: MODEL_CONFIG_CLIENT,
                },
                ModelId::Sig {
                    model_id: MODEL_HEALTH_SERVER,
                },
                ModelId::Sig {
                    model_id: MODEL_GENERIC_ONOFF_CLIENT,
                },
            ])],
        }
    }
}

impl ProvisionerConfig {
    /// Reject configurations the engines cannot run with.
    pub fn validate(&self) -> Result<(), CoreError> {
        let capacities = [
            ("max_nodes", self.max_nodes),
            ("max_net_keys", self.max_net_keys),
            ("max_app_keys", self.max_app_keys),
            ("max_filter_entries", self.max_filter_entries),
            ("max_settings", self.max_settings),
        ];
        for (field, value) in capacities {
            if value == 0 {
                return Err(CoreError::invalid_argument(field, "must be at least 1"));
            }
        }
        if self.max_settings > usize::from(u8::MAX) + 1 {
            return Err(CoreError::invalid_argument(
                "max_settings",
                "slot indexes must fit in a byte",
            ));
        }
        if self.elements.is_empty() {
            return Err(CoreError::invalid_argument(
                "elements",
                "at least one local element is required",
            ));
        }
        if !self.primary_address.is_unicast() {
            return Err(CoreError::invalid_argument(
                "primary_address",
                format!("{} is not a unicast address", self.primary_address),
            ));
        }
        let count = self.element_count().ok_or_else(|| {
            CoreError::invalid_argument("elements", "more than 255 local elements")
        })?;
        if self.primary_address.offset(u16::from(count) - 1).is_none() {
            return Err(CoreError::invalid_argument(
                "elements",
                "local element range leaves the unicast space",
            ));
        }
        Ok(())
    }

    pub(crate) fn element_count(&self) -> Option<u8> {
        u8::try_from(self.elements.len()).ok()
    }

    /// The local element living at `addr`, if any.
    pub fn element_at(&self, addr: Address) -> Option<&LocalElement> {
        let offset = addr.raw().checked_sub(self.primary_address.raw())?;
        self.elements.get(usize::from(offset))
    }

    /// Whether the local element at `addr` hosts `model`.
    pub fn hosts_model(&self, addr: Address, model: ModelId) -> bool {
        self.element_at(addr)
            .is_some_and(|e| e.models.contains(&model))
    }

    /// Whether `[start, start + count)` intersects the local element range.
    pub(crate) fn overlaps_local(&self, start: Address, count: u8) -> bool {
        let a0 = u32::from(self.primary_address.raw());
        let a1 = a0 + u32::try_from(self.elements.len()).unwrap_or(u32::MAX);
        let b0 = u32::from(start.raw());
        let b1 = b0 + u32::from(count);
        a0 < b1 && b0 < a1
    }
}
