// ── Settings session identity ──

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::Display;

/// Longest settings user id accepted, in UTF-8 bytes.
pub const SETTINGS_USER_ID_MAX_LEN: usize = 19;

/// How a settings session is addressed.
///
/// The two identity spaces are parallel: a slot opened by index cannot be
/// driven by its user id until it is closed again, and vice versa.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingsId {
    Index(u8),
    UserId(String),
}

impl SettingsId {
    pub fn user_id(id: impl Into<String>) -> Self {
        Self::UserId(id.into())
    }

    pub(crate) fn kind(&self) -> IdKind {
        match self {
            Self::Index(_) => IdKind::Index,
            Self::UserId(_) => IdKind::UserId,
        }
    }
}

impl fmt::Display for SettingsId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "#{i}"),
            Self::UserId(s) => write!(f, "'{s}'"),
        }
    }
}

impl From<u8> for SettingsId {
    fn from(index: u8) -> Self {
        Self::Index(index)
    }
}

impl From<&str> for SettingsId {
    fn from(id: &str) -> Self {
        Self::UserId(id.to_owned())
    }
}

impl FromStr for SettingsId {
    type Err = std::convert::Infallible;

    /// A bare number is an index, anything else a user id.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.parse::<u8>()
            .map_or_else(|_| Self::UserId(s.to_owned()), Self::Index))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IdKind {
    Index,
    UserId,
}

/// Lifecycle state of one settings slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Closed,
    Open,
    /// Holds the live snapshot.
    Restored,
    /// Open, with the live snapshot released.
    Released,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn numbers_parse_as_indexes() {
        assert_eq!("2".parse::<SettingsId>().unwrap(), SettingsId::Index(2));
        assert_eq!(
            "site-a".parse::<SettingsId>().unwrap(),
            SettingsId::user_id("site-a")
        );
        assert_eq!(
            "300".parse::<SettingsId>().unwrap(),
            SettingsId::user_id("300")
        );
    }
}
