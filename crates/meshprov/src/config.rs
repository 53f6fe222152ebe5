//! CLI configuration: thin wrapper around `meshprov_config`.
//!
//! Re-exports the shared types and adds resolution that respects
//! `GlobalOpts` flag overrides (--config, --storage-dir, --session).

use std::path::PathBuf;
use std::str::FromStr;

use clap::ValueEnum;
use tracing::debug;

use meshprov_core::{FileStorage, Provisioner, SettingsId};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use meshprov_config::{Config, load_config_from, save_config_to};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Config file in effect: `--config` or the platform default.
pub fn config_file(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(meshprov_config::config_path)
}

pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(load_config_from(&config_file(global))?)
}

/// Session selected by `--session`, else the config default.
pub fn session_id(global: &GlobalOpts, config: &Config) -> SettingsId {
    global.session.clone().unwrap_or_else(|| {
        match SettingsId::from_str(&config.defaults.session) {
            Ok(id) => id,
            Err(never) => match never {},
        }
    })
}

/// Output format selected by `--output`, else the config default.
pub fn output_format(global: &GlobalOpts, config: &Config) -> OutputFormat {
    global
        .output
        .or_else(|| OutputFormat::from_str(&config.defaults.output, true).ok())
        .unwrap_or_default()
}

/// Storage directory: flag > config > platform data dir.
pub fn storage_dir(global: &GlobalOpts, config: &Config) -> PathBuf {
    global
        .storage_dir
        .clone()
        .unwrap_or_else(|| config.storage_dir())
}

/// Build a file-backed provisioner from config and flags.
pub fn build_provisioner(global: &GlobalOpts, config: &Config) -> Result<Provisioner, CliError> {
    let provisioner_config = config.to_provisioner_config()?;
    let dir = storage_dir(global, config);
    debug!(dir = %dir.display(), "opening settings storage");
    let storage = FileStorage::new(dir).map_err(|e| CliError::Storage {
        message: e.to_string(),
    })?;
    Ok(Provisioner::new(provisioner_config, Box::new(storage))?)
}
