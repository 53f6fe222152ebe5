// ── Heartbeat and heartbeat filter types ──

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::address::Address;

/// How filter entries are interpreted.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum FilterType {
    /// Report every heartbeat except those matching an entry.
    #[default]
    Blacklist,
    /// Report only heartbeats matching a live entry.
    Whitelist,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Add,
    Remove,
    Clean,
}

/// Caller-supplied filter entry information.
///
/// `expiry_secs` only matters for whitelist adds; `0` never expires.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterInfo {
    pub src: Option<Address>,
    pub dst: Option<Address>,
    pub expiry_secs: u32,
}

impl FilterInfo {
    pub fn src(src: Address) -> Self {
        Self {
            src: Some(src),
            ..Self::default()
        }
    }

    pub fn dst(dst: Address) -> Self {
        Self {
            dst: Some(dst),
            ..Self::default()
        }
    }

    pub fn pair(src: Address, dst: Address) -> Self {
        Self {
            src: Some(src),
            dst: Some(dst),
            ..Self::default()
        }
    }

    pub fn with_expiry(mut self, secs: u32) -> Self {
        self.expiry_secs = secs;
        self
    }
}

/// A filter entry as seen from outside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatFilterEntry {
    pub src: Option<Address>,
    pub dst: Option<Address>,
    /// Configured lifetime; `None` means permanent.
    pub expiry: Option<Duration>,
    /// Lifetime left at the moment of enumeration.
    pub remaining: Option<Duration>,
}

/// A heartbeat message handed over by the transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub src: Address,
    pub dst: Address,
    pub init_ttl: u8,
    pub rx_ttl: u8,
    /// Feature bitmap (relay, proxy, friend, low power).
    pub features: u16,
    pub rssi: i8,
}

impl Heartbeat {
    /// Hops travelled, derived from the TTL drop.
    pub fn hops(&self) -> u8 {
        self.init_ttl.saturating_sub(self.rx_ttl).saturating_add(1)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn filter_type_parses_case_insensitively() {
        assert_eq!("Whitelist".parse::<FilterType>().unwrap(), FilterType::Whitelist);
        assert_eq!("blacklist".parse::<FilterType>().unwrap(), FilterType::Blacklist);
        assert_eq!(FilterType::default(), FilterType::Blacklist);
    }

    #[test]
    fn hops_from_ttl() {
        let hb = Heartbeat {
            src: Address::new(1),
            dst: Address::new(2),
            init_ttl: 7,
            rx_ttl: 5,
            features: 0,
            rssi: -60,
        };
        assert_eq!(hb.hops(), 3);
    }
}
