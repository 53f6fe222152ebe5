// ── Settings storage collaborator ──
//
// The session manager never touches a physical medium itself. It drives a
// `SettingsStorage` backend that exposes one opaque region per slot plus
// the persisted slot -> user id table.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Errors from storage backends.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings slot {slot} is not open")]
    NotOpen { slot: u8 },

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),
}

/// Persistent regions backing settings slots.
///
/// `read_all` and `write_all` require the slot to be open; `erase` works on
/// any slot. An erased or never-written region reads back as `None`.
pub trait SettingsStorage: Send {
    fn open(&mut self, slot: u8) -> Result<(), StorageError>;

    fn read_all(&mut self, slot: u8) -> Result<Option<Vec<u8>>, StorageError>;

    fn write_all(&mut self, slot: u8, data: &[u8]) -> Result<(), StorageError>;

    fn erase(&mut self, slot: u8) -> Result<(), StorageError>;

    fn close(&mut self, slot: u8) -> Result<(), StorageError>;

    /// Persisted slot -> user id assignments.
    fn load_user_ids(&mut self) -> Result<BTreeMap<u8, String>, StorageError>;

    fn store_user_ids(&mut self, ids: &BTreeMap<u8, String>) -> Result<(), StorageError>;
}

// ── MemoryStorage ───────────────────────────────────────────────────

#[derive(Debug, Default)]
struct MemoryInner {
    regions: HashMap<u8, Vec<u8>>,
    open: HashSet<u8>,
    user_ids: BTreeMap<u8, String>,
}

/// In-process backend. Clones share the same regions, so a test can keep
/// one handle for inspection while the manager owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Raw contents of a region, open or not.
    pub fn region(&self, slot: u8) -> Option<Vec<u8>> {
        self.lock().regions.get(&slot).cloned()
    }

    pub fn is_open(&self, slot: u8) -> bool {
        self.lock().open.contains(&slot)
    }

    pub fn user_ids(&self) -> BTreeMap<u8, String> {
        self.lock().user_ids.clone()
    }
}

impl SettingsStorage for MemoryStorage {
    fn open(&mut self, slot: u8) -> Result<(), StorageError> {
        self.lock().open.insert(slot);
        Ok(())
    }

    fn read_all(&mut self, slot: u8) -> Result<Option<Vec<u8>>, StorageError> {
        let inner = self.lock();
        if !inner.open.contains(&slot) {
            return Err(StorageError::NotOpen { slot });
        }
        Ok(inner.regions.get(&slot).cloned())
    }

    fn write_all(&mut self, slot: u8, data: &[u8]) -> Result<(), StorageError> {
        let mut inner = self.lock();
        if !inner.open.contains(&slot) {
            return Err(StorageError::NotOpen { slot });
        }
        inner.regions.insert(slot, data.to_vec());
        Ok(())
    }

    fn erase(&mut self, slot: u8) -> Result<(), StorageError> {
        self.lock().regions.remove(&slot);
        Ok(())
    }

    fn close(&mut self, slot: u8) -> Result<(), StorageError> {
        self.lock().open.remove(&slot);
        Ok(())
    }

    fn load_user_ids(&mut self) -> Result<BTreeMap<u8, String>, StorageError> {
        Ok(self.lock().user_ids.clone())
    }

    fn store_user_ids(&mut self, ids: &BTreeMap<u8, String>) -> Result<(), StorageError> {
        self.lock().user_ids.clone_from(ids);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn regions_require_open() {
        let mut storage = MemoryStorage::new();
        assert!(matches!(
            storage.write_all(0, b"x"),
            Err(StorageError::NotOpen { slot: 0 })
        ));
        storage.open(0).unwrap();
        storage.write_all(0, b"x").unwrap();
        assert_eq!(storage.read_all(0).unwrap().as_deref(), Some(&b"x"[..]));
        storage.close(0).unwrap();
        assert!(storage.read_all(0).is_err());
    }

    #[test]
    fn clones_share_state() {
        let mut storage = MemoryStorage::new();
        let observer = storage.clone();
        storage.open(1).unwrap();
        storage.write_all(1, b"abc").unwrap();
        storage.erase(2).unwrap();
        assert_eq!(observer.region(1).as_deref(), Some(&b"abc"[..]));
        assert!(observer.is_open(1));

        storage.erase(1).unwrap();
        assert!(observer.region(1).is_none());
    }
}
