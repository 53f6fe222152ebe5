// ── File-backed settings storage ──
//
// One JSON file per slot plus `user_ids.json`, all inside a single
// directory. Writes go to a `.tmp` sibling first and are renamed into
// place, and files are owner-only on Unix since regions hold key material.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::storage::{SettingsStorage, StorageError};

const USER_IDS_FILE: &str = "user_ids.json";

#[derive(Debug)]
pub struct FileStorage {
    base_dir: PathBuf,
    open: HashSet<u8>,
}

impl FileStorage {
    /// Create a backend rooted at `base_dir`, creating the directory if needed.
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir)?;
        Ok(Self {
            base_dir,
            open: HashSet::new(),
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn region_path(&self, slot: u8) -> PathBuf {
        self.base_dir.join(format!("settings_{slot:02}.json"))
    }

    fn ensure_open(&self, slot: u8) -> Result<(), StorageError> {
        if self.open.contains(&slot) {
            Ok(())
        } else {
            Err(StorageError::NotOpen { slot })
        }
    }
}

impl SettingsStorage for FileStorage {
    fn open(&mut self, slot: u8) -> Result<(), StorageError> {
        self.open.insert(slot);
        debug!(slot, "settings region opened");
        Ok(())
    }

    fn read_all(&mut self, slot: u8) -> Result<Option<Vec<u8>>, StorageError> {
        self.ensure_open(slot)?;
        read_optional(&self.region_path(slot))
    }

    fn write_all(&mut self, slot: u8, data: &[u8]) -> Result<(), StorageError> {
        self.ensure_open(slot)?;
        atomic_write(&self.region_path(slot), data)
    }

    fn erase(&mut self, slot: u8) -> Result<(), StorageError> {
        match fs::remove_file(self.region_path(slot)) {
            Ok(()) => {
                debug!(slot, "settings region erased");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    fn close(&mut self, slot: u8) -> Result<(), StorageError> {
        self.open.remove(&slot);
        Ok(())
    }

    fn load_user_ids(&mut self) -> Result<BTreeMap<u8, String>, StorageError> {
        match read_optional(&self.base_dir.join(USER_IDS_FILE))? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| StorageError::Deserialize(e.to_string())),
            None => Ok(BTreeMap::new()),
        }
    }

    fn store_user_ids(&mut self, ids: &BTreeMap<u8, String>) -> Result<(), StorageError> {
        let bytes =
            serde_json::to_vec_pretty(ids).map_err(|e| StorageError::Serialize(e.to_string()))?;
        atomic_write(&self.base_dir.join(USER_IDS_FILE), &bytes)
    }
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, StorageError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StorageError::Io(e)),
    }
}

/// Write to a fresh `.tmp` sibling, then rename over `path`.
///
/// A leftover `.tmp` from an interrupted write is removed first so the
/// new file is always created with owner-only permissions.
fn atomic_write(path: &Path, data: &[u8]) -> Result<(), StorageError> {
    let tmp_path = path.with_extension("tmp");
    match fs::remove_file(&tmp_path) {
        Ok(()) => debug!(path = %tmp_path.display(), "removed stale temp file"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(StorageError::Io(e)),
    }

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(&tmp_path)?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&tmp_path, path)?;
    Ok(())
}
