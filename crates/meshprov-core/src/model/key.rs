// ── Key material and key indexes ──
//
// NetKeys and AppKeys share one shape: a 16-byte secret plus a 12-bit
// index. `KeyValue` never prints its bytes and wipes them on drop.

use std::fmt;
use std::str::FromStr;

use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use strum::Display;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::address::{Address, parse_u16};
use crate::error::CoreError;

/// Length in bytes of every mesh key.
pub const KEY_LEN: usize = 16;

/// Raw index value asking the store to allocate an index itself.
pub const KEY_INDEX_GENERATE: u16 = 0xFFFF;

/// Raw company id marking a standard (non-vendor) model.
pub const COMPANY_ID_NONE: u16 = 0xFFFF;

// ── KeyValue ────────────────────────────────────────────────────────

/// A 16-byte NetKey, AppKey or device key.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct KeyValue([u8; KEY_LEN]);

impl KeyValue {
    pub const fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Fresh key material from the operating system CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Debug for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyValue(<redacted>)")
    }
}

impl FromStr for KeyValue {
    type Err = CoreError;

    /// Parse 32 hex digits, optionally `0x`-prefixed.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim();
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        let invalid = || CoreError::invalid_argument("key", "expected 32 hex digits");
        if hex.len() != KEY_LEN * 2 || !hex.is_ascii() {
            return Err(invalid());
        }
        let mut bytes = [0u8; KEY_LEN];
        for (byte, chunk) in bytes.iter_mut().zip(hex.as_bytes().chunks(2)) {
            let pair = std::str::from_utf8(chunk).map_err(|_| invalid())?;
            *byte = u8::from_str_radix(pair, 16).map_err(|_| invalid())?;
        }
        Ok(Self(bytes))
    }
}

// ── KeyIndex ────────────────────────────────────────────────────────

/// A 12-bit NetKey or AppKey index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct KeyIndex(u16);

impl KeyIndex {
    pub const MAX: u16 = 0x0FFF;

    pub fn new(raw: u16) -> Result<Self, CoreError> {
        if raw > Self::MAX {
            return Err(CoreError::invalid_argument(
                "key index",
                format!("{raw:#06x} exceeds {:#06x}", Self::MAX),
            ));
        }
        Ok(Self(raw))
    }

    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Every valid index in ascending order.
    pub(crate) fn all() -> impl Iterator<Item = Self> {
        (0..=Self::MAX).map(Self)
    }
}

impl TryFrom<u16> for KeyIndex {
    type Error = CoreError;

    fn try_from(raw: u16) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}

impl From<KeyIndex> for u16 {
    fn from(index: KeyIndex) -> Self {
        index.0
    }
}

impl fmt::Display for KeyIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#05x}", self.0)
    }
}

impl FromStr for KeyIndex {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = parse_u16(s).ok_or_else(|| {
            CoreError::invalid_argument("key index", format!("'{s}' is not a number"))
        })?;
        Self::new(raw)
    }
}

/// Caller intent for a key index: a specific index or "allocate one".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexRequest {
    Generate,
    Exact(KeyIndex),
}

impl TryFrom<u16> for IndexRequest {
    type Error = CoreError;

    /// `0xFFFF` means generate; anything else must be a valid index.
    fn try_from(raw: u16) -> Result<Self, Self::Error> {
        if raw == KEY_INDEX_GENERATE {
            Ok(Self::Generate)
        } else {
            KeyIndex::new(raw).map(Self::Exact)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum KeyKind {
    #[strum(serialize = "NetKey")]
    Net,
    #[strum(serialize = "AppKey")]
    App,
}

// ── Records ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetKeyRecord {
    pub net_index: KeyIndex,
    pub value: KeyValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppKeyRecord {
    pub app_index: KeyIndex,
    pub net_index: KeyIndex,
    pub value: KeyValue,
}

// ── Model bindings ──────────────────────────────────────────────────

/// Identifier of a model hosted on an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelId {
    /// Standard model defined by the mesh profile.
    Sig { model_id: u16 },
    /// Vendor model scoped by a company identifier.
    Vendor { company_id: u16, model_id: u16 },
}

impl ModelId {
    /// Build from the raw `(model_id, company_id)` pair used on the wire,
    /// where [`COMPANY_ID_NONE`] denotes a standard model.
    pub const fn from_parts(model_id: u16, company_id: u16) -> Self {
        if company_id == COMPANY_ID_NONE {
            Self::Sig { model_id }
        } else {
            Self::Vendor {
                company_id,
                model_id,
            }
        }
    }

    pub const fn model_id(self) -> u16 {
        match self {
            Self::Sig { model_id } | Self::Vendor { model_id, .. } => model_id,
        }
    }

    pub const fn company_id(self) -> u16 {
        match self {
            Self::Sig { .. } => COMPANY_ID_NONE,
            Self::Vendor { company_id, .. } => company_id,
        }
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sig { model_id } => write!(f, "{model_id:#06x}"),
            Self::Vendor {
                company_id,
                model_id,
            } => write!(f, "{company_id:#06x}:{model_id:#06x}"),
        }
    }
}

impl FromStr for ModelId {
    type Err = CoreError;

    /// `model` for a standard model, `company:model` for a vendor model.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let field = |part: &str| {
            parse_u16(part).ok_or_else(|| {
                CoreError::invalid_argument("model", format!("'{part}' is not a number"))
            })
        };
        match s.trim().split_once(':') {
            Some((company, model)) => Ok(Self::Vendor {
                company_id: field(company)?,
                model_id: field(model)?,
            }),
            None => Ok(Self::Sig {
                model_id: field(s)?,
            }),
        }
    }
}

/// An AppKey bound to a model on one of the provisioner's own elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppKeyBinding {
    pub element: Address,
    pub app_index: KeyIndex,
    pub model: ModelId,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn key_value_debug_is_redacted() {
        let key = KeyValue::new([0xAB; KEY_LEN]);
        let printed = format!("{key:?}");
        assert!(!printed.contains("ab"));
        assert!(!printed.contains("171"));
    }

    #[test]
    fn model_id_parses_sig_and_vendor_forms() {
        assert_eq!(
            "0x1001".parse::<ModelId>().unwrap(),
            ModelId::Sig { model_id: 0x1001 }
        );
        let vendor: ModelId = "0x02e5:1".parse().unwrap();
        assert_eq!(vendor, ModelId::from_parts(1, 0x02E5));
        assert_eq!(vendor.to_string(), "0x02e5:0x0001");
        assert!("onoff".parse::<ModelId>().is_err());
    }

    #[test]
    fn key_value_hex_roundtrip() {
        let key: KeyValue = "0x000102030405060708090a0b0c0d0e0f".parse().unwrap();
        assert_eq!(key, KeyValue::new([0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15]));
        assert_eq!(key.to_hex(), "000102030405060708090a0b0c0d0e0f");
    }

    #[test]
    fn key_value_rejects_bad_hex() {
        assert!("0011".parse::<KeyValue>().is_err());
        assert!("zz0102030405060708090a0b0c0d0e0f".parse::<KeyValue>().is_err());
    }

    #[test]
    fn generated_keys_differ() {
        assert_ne!(KeyValue::generate(), KeyValue::generate());
    }

    #[test]
    fn key_index_is_twelve_bits() {
        assert!(KeyIndex::new(0x0FFF).is_ok());
        assert!(matches!(
            KeyIndex::new(0x1000),
            Err(CoreError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn index_request_from_raw() {
        assert_eq!(IndexRequest::try_from(0xFFFF).unwrap(), IndexRequest::Generate);
        assert_eq!(
            IndexRequest::try_from(0x0010).unwrap(),
            IndexRequest::Exact(KeyIndex::new(0x10).unwrap())
        );
        assert!(IndexRequest::try_from(0x2000).is_err());
    }

    #[test]
    fn model_id_company_sentinel() {
        assert_eq!(ModelId::from_parts(0x1000, COMPANY_ID_NONE), ModelId::Sig { model_id: 0x1000 });
        let vendor = ModelId::from_parts(0x0001, 0x02E5);
        assert_eq!(vendor.company_id(), 0x02E5);
        assert_eq!(vendor.model_id(), 0x0001);
    }
}
