//! Configuration for the meshprov CLI.
//!
//! A TOML file in the platform config directory, overlaid with
//! `MESHPROV_`-prefixed environment variables, translated into
//! `meshprov_core::ProvisionerConfig`. Also decides where file-backed
//! settings storage lives when nothing overrides it.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use meshprov_core::{Address, CoreError, LocalElement, ModelId, ProvisionerConfig};

/// Prefix for environment overrides. Nested keys are joined with `__`,
/// e.g. `MESHPROV_CAPACITIES__MAX_NODES=32`.
pub const ENV_PREFIX: &str = "MESHPROV_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub storage: Storage,

    #[serde(default)]
    pub capacities: Capacities,

    #[serde(default)]
    pub local: Local,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    /// Output format: "table", "json" or "yaml".
    #[serde(default = "default_output")]
    pub output: String,

    /// Session used when `--session` is not given. A number selects a slot
    /// by index, anything else is a user id.
    #[serde(default = "default_session")]
    pub session: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            session: default_session(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_session() -> String {
    "0".into()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Storage {
    /// Directory for settings regions. Defaults to [`data_dir()`].
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Capacities {
    pub max_nodes: usize,
    pub max_net_keys: usize,
    pub max_app_keys: usize,
    pub max_filter_entries: usize,
    pub max_settings: usize,
}

impl Default for Capacities {
    fn default() -> Self {
        let core = ProvisionerConfig::default();
        Self {
            max_nodes: core.max_nodes,
            max_net_keys: core.max_net_keys,
            max_app_keys: core.max_app_keys,
            max_filter_entries: core.max_filter_entries,
            max_settings: core.max_settings,
        }
    }
}

/// The provisioner's own composition.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Local {
    /// Unicast address of the first element (`0x0001..=0x7FFF`).
    pub primary_address: u16,

    /// Elements in address order, each listing the models it hosts.
    pub elements: Vec<Element>,
}

impl Default for Local {
    fn default() -> Self {
        let core = ProvisionerConfig::default();
        Self {
            primary_address: core.primary_address.raw(),
            elements: core
                .elements
                .into_iter()
                .map(|e| Element { models: e.models })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Element {
    /// e.g. `{ kind = "sig", model_id = 0x1001 }` or
    /// `{ kind = "vendor", company_id = 0x02E5, model_id = 1 }`.
    pub models: Vec<ModelId>,
}

impl Config {
    /// Build and validate the runtime configuration for the core.
    pub fn to_provisioner_config(&self) -> Result<ProvisionerConfig, ConfigError> {
        let config = ProvisionerConfig {
            max_nodes: self.capacities.max_nodes,
            max_net_keys: self.capacities.max_net_keys,
            max_app_keys: self.capacities.max_app_keys,
            max_filter_entries: self.capacities.max_filter_entries,
            max_settings: self.capacities.max_settings,
            primary_address: Address::new(self.local.primary_address),
            elements: self
                .local
                .elements
                .iter()
                .map(|e| LocalElement::new(e.models.iter().copied()))
                .collect(),
        };
        config.validate().map_err(|err| match err {
            CoreError::InvalidArgument { field, reason } => ConfigError::Validation { field, reason },
            other => ConfigError::Validation {
                field: "config".into(),
                reason: other.to_string(),
            },
        })?;
        Ok(config)
    }

    /// Where settings regions are stored: the configured directory or
    /// the platform data directory.
    pub fn storage_dir(&self) -> PathBuf {
        self.storage.dir.clone().unwrap_or_else(data_dir)
    }
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "meshprov", "meshprov")
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("meshprov");
    p
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Default directory for file-backed settings storage.
pub fn data_dir() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("settings"),
        |dirs| dirs.data_dir().join("settings"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file + environment. A missing file is not an
/// error; defaults fill every absent key.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn defaults_match_core_defaults() {
        let config = Config::default().to_provisioner_config().unwrap();
        assert_eq!(config, ProvisionerConfig::default());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.capacities, Capacities::default());
        assert_eq!(config.defaults.output, "table");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            r#"
[capacities]
max_nodes = 32

[local]
primary_address = 0x0100

[[local.elements]]
models = [
  { kind = "sig", model_id = 0x0000 },
  { kind = "vendor", company_id = 0x02E5, model_id = 1 },
]

[storage]
dir = "/var/lib/meshprov"
"#,
        );
        let config = load_config_from(&path).unwrap();
        assert_eq!(config.capacities.max_nodes, 32);
        assert_eq!(config.capacities.max_settings, 4);
        assert_eq!(config.storage_dir(), PathBuf::from("/var/lib/meshprov"));

        let core = config.to_provisioner_config().unwrap();
        assert_eq!(core.primary_address, Address::new(0x0100));
        assert!(core.hosts_model(Address::new(0x0100), ModelId::from_parts(1, 0x02E5)));
    }

    #[test]
    fn invalid_capacity_is_a_validation_error() {
        let mut config = Config::default();
        config.capacities.max_settings = 0;
        let err = config.to_provisioner_config().unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "max_settings"));
    }

    #[test]
    fn group_primary_address_is_rejected() {
        let mut config = Config::default();
        config.local.primary_address = 0xC000;
        assert!(matches!(
            config.to_provisioner_config(),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn malformed_file_is_a_figment_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "[capacities]\nmax_nodes = \"many\"\n");
        assert!(matches!(
            load_config_from(&path),
            Err(ConfigError::Figment(_))
        ));
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.defaults.session = "lab".into();
        config.capacities.max_filter_entries = 20;

        save_config_to(&config, &path).unwrap();
        assert_eq!(load_config_from(&path).unwrap(), config);
    }
}
