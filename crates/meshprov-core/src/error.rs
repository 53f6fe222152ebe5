// ── Core error types ──
//
// Every fallible operation in the core returns one of these. None of them
// is fatal: a failed operation leaves the live stores exactly as they were.
// Storage collaborator failures are wrapped, never exposed raw.

use thiserror::Error;

use crate::settings::StorageError;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Lookup errors ────────────────────────────────────────────────
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: String,
        identifier: String,
    },

    #[error("{entity_type} index {index:#06x} is already in use")]
    DuplicateIndex { entity_type: String, index: u16 },

    #[error("{entity_type} references a missing {target}")]
    InvalidReference { entity_type: String, target: String },

    // ── Lifecycle errors ─────────────────────────────────────────────
    #[error("Cannot {operation} while {state}")]
    InvalidState { operation: String, state: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("No free {resource} left (capacity {capacity})")]
    ResourceExhausted { resource: String, capacity: usize },

    // ── Validation errors ────────────────────────────────────────────
    #[error("Invalid {field}: {reason}")]
    InvalidArgument { field: String, reason: String },

    // ── Collaborator errors ──────────────────────────────────────────
    #[error("Settings storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Corrupt settings snapshot: {message}")]
    Codec { message: String },

    #[error("Provisioner task is not running")]
    ActorStopped,
}

impl CoreError {
    pub(crate) fn not_found(entity_type: &str, identifier: impl ToString) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            identifier: identifier.to_string(),
        }
    }

    pub(crate) fn invalid_argument(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_state(operation: &str, state: impl ToString) -> Self {
        Self::InvalidState {
            operation: operation.into(),
            state: state.to_string(),
        }
    }

    pub(crate) fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub(crate) fn exhausted(resource: &str, capacity: usize) -> Self {
        Self::ResourceExhausted {
            resource: resource.into(),
            capacity,
        }
    }

    pub(crate) fn codec(message: impl ToString) -> Self {
        Self::Codec {
            message: message.to_string(),
        }
    }
}
