// ── Live state engines ──
//
// The key store, node registry and heartbeat filter. Each is a plain
// struct mutated through `&mut self`; the `Provisioner` owns all three.

mod arena;
mod heartbeat;
mod keys;
mod nodes;

pub use arena::SlotArena;
pub use heartbeat::{HeartbeatFilter, HeartbeatSnapshot, StoredFilterEntry, WallClock};
pub use keys::KeyStore;
pub use nodes::NodeRegistry;
