// ── Mesh addressing ──
//
// 16-bit mesh addresses partitioned into unassigned, unicast, virtual and
// group ranges. Every other domain type builds on this.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A 16-bit mesh address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(u16);

impl Address {
    pub const UNASSIGNED: Self = Self(0x0000);
    pub const UNICAST_MAX: u16 = 0x7FFF;

    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u16 {
        self.0
    }

    pub const fn is_unassigned(self) -> bool {
        self.0 == 0
    }

    /// `0x0001..=0x7FFF`.
    pub const fn is_unicast(self) -> bool {
        self.0 != 0 && self.0 & 0x8000 == 0
    }

    /// `0x8000..=0xBFFF`.
    pub const fn is_virtual(self) -> bool {
        self.0 & 0xC000 == 0x8000
    }

    /// `0xC000..=0xFFFF`, fixed group addresses included.
    pub const fn is_group(self) -> bool {
        self.0 & 0xC000 == 0xC000
    }

    /// The address `n` elements after this one, if it is still unicast.
    pub fn offset(self, n: u16) -> Option<Self> {
        let next = Self(self.0.checked_add(n)?);
        next.is_unicast().then_some(next)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

impl From<u16> for Address {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

impl From<Address> for u16 {
    fn from(addr: Address) -> Self {
        addr.0
    }
}

impl FromStr for Address {
    type Err = CoreError;

    /// Accepts `0x`-prefixed hex or plain decimal.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_u16(s).map(Self).ok_or_else(|| {
            CoreError::invalid_argument("address", format!("'{s}' is not a 16-bit value"))
        })
    }
}

/// Parse `0x`-prefixed hex or decimal into a `u16`.
pub(crate) fn parse_u16(s: &str) -> Option<u16> {
    let s = s.trim();
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn address_ranges() {
        assert!(Address::new(0x0000).is_unassigned());
        assert!(Address::new(0x0001).is_unicast());
        assert!(Address::new(0x7FFF).is_unicast());
        assert!(!Address::new(0x8000).is_unicast());
        assert!(Address::new(0x8000).is_virtual());
        assert!(Address::new(0xBFFF).is_virtual());
        assert!(Address::new(0xC000).is_group());
        assert!(Address::new(0xFFFF).is_group());
        assert!(!Address::new(0xFFFF).is_virtual());
    }

    #[test]
    fn offset_stays_in_unicast_range() {
        assert_eq!(Address::new(0x0010).offset(2), Some(Address::new(0x0012)));
        assert_eq!(Address::new(0x7FFE).offset(1), Some(Address::new(0x7FFF)));
        assert_eq!(Address::new(0x7FFF).offset(1), None);
        assert_eq!(Address::new(0xFFFF).offset(1), None);
    }

    #[test]
    fn parses_hex_and_decimal() {
        assert_eq!("0x0010".parse::<Address>().unwrap(), Address::new(0x10));
        assert_eq!("16".parse::<Address>().unwrap(), Address::new(0x10));
        assert!("0x10000".parse::<Address>().is_err());
        assert!("node".parse::<Address>().is_err());
    }

    #[test]
    fn display_is_padded_hex() {
        assert_eq!(Address::new(0x10).to_string(), "0x0010");
    }
}
