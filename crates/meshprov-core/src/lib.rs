//! Controller-side state and persistence for a mesh network provisioner.
//!
//! This crate owns the stateful engines behind the provisioner API:
//!
//! - **[`KeyStore`]**: NetKeys and AppKeys with generate-or-import
//!   semantics and caller-visible index allocation, plus AppKey bindings to
//!   the provisioner's own models.
//!
//! - **[`NodeRegistry`]**: fixed-capacity table of provisioned nodes
//!   (UUID, element range, name, composition data).
//!
//! - **[`HeartbeatFilter`]**: blacklist/whitelist filter over heartbeat
//!   source and destination, with expiring whitelist entries.
//!
//! - **[`SessionManager`]**: settings slots addressed by index or user id,
//!   moving through open, restore, release and close, with at most one
//!   slot owning the live state. Persistence goes through a
//!   [`SettingsStorage`] backend ([`MemoryStorage`], [`FileStorage`]).
//!
//! - **[`Provisioner`]**: single owner of all of the above plus the event
//!   sender. [`ProvisionerHandle`] moves it into a tokio task and accepts
//!   typed [`Command`]s over an `mpsc` channel;
//!   [`ProvisionerHandle::oneshot()`](ProvisionerHandle::oneshot) wraps a
//!   whole session for single CLI invocations.

pub mod command;
pub mod config;
pub mod error;
pub mod event;
pub mod handle;
pub mod model;
pub mod provisioner;
pub mod settings;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{Command, CommandResult};
pub use config::{LocalElement, ProvisionerConfig};
pub use error::CoreError;
pub use event::ProvisionerEvent;
pub use handle::ProvisionerHandle;
pub use provisioner::Provisioner;
pub use settings::{
    FileStorage, MemoryStorage, SessionManager, SettingsSnapshot, SettingsStorage, SlotInfo,
    StorageError,
};
pub use store::{HeartbeatFilter, KeyStore, NodeRegistry};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    Address, AppKeyBinding, AppKeyRecord, FilterInfo, FilterOp, FilterType, Heartbeat,
    HeartbeatFilterEntry, IndexRequest, KeyIndex, KeyKind, KeyValue, ModelId, NetKeyRecord,
    NewNode, NodeRecord, SessionState, SettingsId,
};
