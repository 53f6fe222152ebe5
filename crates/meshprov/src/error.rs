//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` variants into user-facing errors with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use meshprov_config::ConfigError;
use meshprov_core::CoreError;

/// Process exit codes, one per error family.
pub mod exit_code {
    #[allow(dead_code)]
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 3;
    pub const CONFLICT: i32 = 4;
    pub const STATE: i32 = 5;
    pub const EXHAUSTED: i32 = 6;
    pub const STORAGE: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
#[allow(unused_assignments)]
pub enum CliError {
    // ── Lookups ──────────────────────────────────────────────────────

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(meshprov::not_found),
        help("Run: meshprov {list_command} to see what exists in this session")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("{resource_type} index {index:#05x} is already in use")]
    #[diagnostic(
        code(meshprov::duplicate_index),
        help("Omit --index to let the next free index be chosen.")
    )]
    DuplicateIndex { resource_type: String, index: u16 },

    #[error("{resource_type} refers to a missing {target}")]
    #[diagnostic(
        code(meshprov::invalid_reference),
        help("Create the {target} first, or check the index you passed.")
    )]
    InvalidReference {
        resource_type: String,
        target: String,
    },

    // ── Session lifecycle ────────────────────────────────────────────

    #[error("Cannot {operation} while {state}")]
    #[diagnostic(code(meshprov::invalid_state))]
    InvalidState { operation: String, state: String },

    #[error("{message}")]
    #[diagnostic(code(meshprov::conflict))]
    Conflict { message: String },

    #[error("No free {resource} left (capacity {capacity})")]
    #[diagnostic(
        code(meshprov::exhausted),
        help("Free an entry, or raise the capacity in the [capacities] section of the config file.")
    )]
    Exhausted { resource: String, capacity: usize },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(meshprov::validation))]
    Validation { field: String, reason: String },

    // ── Storage ──────────────────────────────────────────────────────

    #[error("Settings storage failed: {message}")]
    #[diagnostic(
        code(meshprov::storage),
        help("Check that --storage-dir points at a writable directory.")
    )]
    Storage { message: String },

    #[error("Stored settings are unreadable: {message}")]
    #[diagnostic(
        code(meshprov::corrupt_settings),
        help("Remove the slot with: meshprov settings delete <slot>")
    )]
    CorruptSettings { message: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error(transparent)]
    #[diagnostic(
        code(meshprov::config),
        help("Inspect the effective configuration with: meshprov config show")
    )]
    Config(#[from] ConfigError),

    #[error("Config file already exists at {path}")]
    #[diagnostic(
        code(meshprov::config_exists),
        help("Use --force to overwrite it.")
    )]
    ConfigExists { path: String },

    // ── Interactive ──────────────────────────────────────────────────

    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(meshprov::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── Internal ─────────────────────────────────────────────────────

    #[error("Provisioner task stopped unexpectedly")]
    #[diagnostic(code(meshprov::internal))]
    ActorStopped,

    #[error("Unexpected response from provisioner task: {0}")]
    #[diagnostic(code(meshprov::internal))]
    UnexpectedResult(String),

    #[error("Failed to render {format} output: {reason}")]
    #[diagnostic(code(meshprov::render))]
    Render { format: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::DuplicateIndex { .. } | Self::Conflict { .. } | Self::ConfigExists { .. } => {
                exit_code::CONFLICT
            }
            Self::InvalidState { .. } => exit_code::STATE,
            Self::Exhausted { .. } => exit_code::EXHAUSTED,
            Self::Storage { .. } | Self::CorruptSettings { .. } => exit_code::STORAGE,
            Self::Validation { .. }
            | Self::InvalidReference { .. }
            | Self::Config(_)
            | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            Self::ActorStopped
            | Self::UnexpectedResult(_)
            | Self::Render { .. }
            | Self::Io(_) => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

fn list_command_for(entity_type: &str) -> &'static str {
    match entity_type {
        "NetKey" => "net-key list",
        "AppKey" => "app-key list",
        "node" => "node list",
        "local model" => "config show",
        _ => "settings list",
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound {
                entity_type,
                identifier,
            } => CliError::NotFound {
                list_command: list_command_for(&entity_type).into(),
                resource_type: entity_type,
                identifier,
            },

            CoreError::DuplicateIndex { entity_type, index } => CliError::DuplicateIndex {
                resource_type: entity_type,
                index,
            },

            CoreError::InvalidReference {
                entity_type,
                target,
            } => CliError::InvalidReference {
                resource_type: entity_type,
                target,
            },

            CoreError::InvalidState { operation, state } => {
                CliError::InvalidState { operation, state }
            }

            CoreError::Conflict { message } => CliError::Conflict { message },

            CoreError::ResourceExhausted { resource, capacity } => {
                CliError::Exhausted { resource, capacity }
            }

            CoreError::InvalidArgument { field, reason } => CliError::Validation { field, reason },

            CoreError::Storage(e) => CliError::Storage {
                message: e.to_string(),
            },

            CoreError::Codec { message } => CliError::CorruptSettings { message },

            CoreError::ActorStopped => CliError::ActorStopped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_keep_distinct_exit_codes() {
        let not_found: CliError = CoreError::NotFound {
            entity_type: "node".into(),
            identifier: "x".into(),
        }
        .into();
        assert_eq!(not_found.exit_code(), exit_code::NOT_FOUND);
        assert!(matches!(
            not_found,
            CliError::NotFound { ref list_command, .. } if list_command == "node list"
        ));

        let conflict: CliError = CoreError::Conflict {
            message: "busy".into(),
        }
        .into();
        assert_eq!(conflict.exit_code(), exit_code::CONFLICT);

        let exhausted: CliError = CoreError::ResourceExhausted {
            resource: "node slot".into(),
            capacity: 10,
        }
        .into();
        assert_eq!(exhausted.exit_code(), exit_code::EXHAUSTED);

        let state: CliError = CoreError::InvalidState {
            operation: "commit".into(),
            state: "no session is restored".into(),
        }
        .into();
        assert_eq!(state.exit_code(), exit_code::STATE);
        assert_ne!(exit_code::SUCCESS, state.exit_code());
    }
}
