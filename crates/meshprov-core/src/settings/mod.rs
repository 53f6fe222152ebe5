// ── Settings session manager ──
//
// Multiplexes a fixed set of storage slots across provisioner identities.
// A slot is addressed either by index or by a caller-chosen user id, and
// walks Closed -> Open -> Restored -> Released -> Closed. At most one slot
// is Restored (owns the live state) at a time.
//
// The manager only tracks slot state and talks to storage. Building and
// tearing down the live stores is the caller's job, handed in as closures
// so storage and live state change together or not at all.

mod codec;
mod file;
mod storage;

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::model::{SETTINGS_USER_ID_MAX_LEN, SessionState, SettingsId};

pub use codec::{SNAPSHOT_VERSION, SettingsSnapshot};
pub use file::FileStorage;
pub use storage::{MemoryStorage, SettingsStorage, StorageError};

#[derive(Debug, Clone, Default)]
struct Slot {
    state: SessionState,
    /// Identity the slot is currently driven by, while not Closed.
    held: Option<SettingsId>,
}

/// Read-only view of one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotInfo {
    pub index: u8,
    pub user_id: Option<String>,
    pub state: SessionState,
    pub held_by: Option<SettingsId>,
}

pub struct SessionManager {
    storage: Box<dyn SettingsStorage>,
    slots: Vec<Slot>,
    user_ids: BTreeMap<u8, String>,
    active: Option<u8>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("slots", &self.slots)
            .field("user_ids", &self.user_ids)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Create a manager over `max_settings` slots, loading the persisted
    /// user id table. Entries for slots beyond `max_settings` are ignored.
    pub fn new(
        mut storage: Box<dyn SettingsStorage>,
        max_settings: usize,
    ) -> Result<Self, CoreError> {
        let mut user_ids = storage.load_user_ids()?;
        user_ids.retain(|slot, id| {
            let keep = usize::from(*slot) < max_settings && valid_user_id(id);
            if !keep {
                warn!(slot, user_id = %id, "ignoring stored settings user id");
            }
            keep
        });
        debug!(slots = max_settings, user_ids = user_ids.len(), "settings manager ready");
        Ok(Self {
            storage,
            slots: vec![Slot::default(); max_settings],
            user_ids,
            active: None,
        })
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Open a session. A user id that is not yet known claims the lowest
    /// slot carrying no user id.
    pub fn open(&mut self, id: &SettingsId) -> Result<u8, CoreError> {
        let (slot, claimed) = match id {
            SettingsId::Index(_) => (self.resolve(id)?, false),
            SettingsId::UserId(user_id) => match self.find_user_id(user_id)? {
                Some(slot) => (slot, !self.user_ids.contains_key(&slot)),
                None => (self.free_slot(id)?, true),
            },
        };
        self.check_holder(slot, id)?;

        let state = self.slot(slot).state;
        match state {
            SessionState::Closed => self.storage.open(slot)?,
            SessionState::Released => {}
            SessionState::Open | SessionState::Restored => {
                return Err(CoreError::invalid_state(&format!("open {id}"), state));
            }
        }

        if let (true, SettingsId::UserId(user_id)) = (claimed, id) {
            let mut ids = self.user_ids.clone();
            ids.insert(slot, user_id.clone());
            if let Err(e) = self.storage.store_user_ids(&ids) {
                if state == SessionState::Closed {
                    let _ = self.storage.close(slot);
                }
                return Err(e.into());
            }
            self.user_ids = ids;
        }

        let entry = self.slot_mut(slot);
        entry.state = SessionState::Open;
        entry.held = Some(id.clone());
        info!(slot, id = %id, "settings opened");
        Ok(slot)
    }

    /// Load the slot's snapshot into the live state through `apply`.
    ///
    /// `apply` receives `None` for an empty region. When it fails the slot
    /// stays Open.
    pub fn restore<F>(&mut self, id: &SettingsId, apply: F) -> Result<u8, CoreError>
    where
        F: FnOnce(Option<&[u8]>) -> Result<(), CoreError>,
    {
        let slot = self.resolve(id)?;
        self.check_holder(slot, id)?;
        self.require_state(slot, SessionState::Open, "restore", id)?;
        if let Some(owner) = self.active {
            return Err(CoreError::conflict(format!(
                "settings slot {owner} is already restored"
            )));
        }

        let data = self.storage.read_all(slot)?;
        apply(data.as_deref())?;

        self.slot_mut(slot).state = SessionState::Restored;
        self.active = Some(slot);
        info!(slot, id = %id, empty = data.is_none(), "settings restored");
        Ok(slot)
    }

    /// Give up the live state.
    ///
    /// Without `erase` the current snapshot from `snapshot` is written back
    /// first. With `erase` the region and its user id are wiped instead.
    pub fn release<F>(&mut self, id: &SettingsId, erase: bool, snapshot: F) -> Result<u8, CoreError>
    where
        F: FnOnce() -> Result<Vec<u8>, CoreError>,
    {
        let slot = self.resolve(id)?;
        self.check_holder(slot, id)?;
        self.require_state(slot, SessionState::Restored, "release", id)?;

        if erase {
            let user_ids = self.user_ids.clone();
            self.forget_user_id(slot)?;
            if let Err(e) = self.storage.erase(slot) {
                if let Err(undo) = self.storage.store_user_ids(&user_ids) {
                    warn!(slot, error = %undo, "failed to restore settings user ids");
                }
                self.user_ids = user_ids;
                return Err(e.into());
            }
        } else {
            let bytes = snapshot()?;
            self.storage.write_all(slot, &bytes)?;
        }

        self.slot_mut(slot).state = SessionState::Released;
        self.active = None;
        info!(slot, id = %id, erase, "settings released");
        Ok(slot)
    }

    /// Write the live snapshot to the restored slot without releasing it.
    pub fn commit<F>(&mut self, snapshot: F) -> Result<u8, CoreError>
    where
        F: FnOnce() -> Result<Vec<u8>, CoreError>,
    {
        let slot = self
            .active
            .ok_or_else(|| CoreError::invalid_state("commit", "no settings are restored"))?;
        let bytes = snapshot()?;
        self.storage.write_all(slot, &bytes)?;
        debug!(slot, bytes = bytes.len(), "settings committed");
        Ok(slot)
    }

    pub fn close(&mut self, id: &SettingsId) -> Result<u8, CoreError> {
        let slot = self.resolve(id)?;
        self.check_holder(slot, id)?;
        let state = self.slot(slot).state;
        if !matches!(state, SessionState::Open | SessionState::Released) {
            return Err(CoreError::invalid_state(&format!("close {id}"), state));
        }
        self.storage.close(slot)?;

        let entry = self.slot_mut(slot);
        entry.state = SessionState::Closed;
        entry.held = None;
        info!(slot, id = %id, "settings closed");
        Ok(slot)
    }

    // ── Administration ───────────────────────────────────────────────

    /// Erase a slot that is not open, along with its user id.
    pub fn delete(&mut self, id: &SettingsId) -> Result<u8, CoreError> {
        let slot = self.resolve(id)?;
        let state = self.slot(slot).state;
        if state != SessionState::Closed {
            return Err(CoreError::conflict(format!(
                "settings {id} is {state} and cannot be deleted"
            )));
        }
        self.storage.erase(slot)?;
        self.forget_user_id(slot)?;
        info!(slot, id = %id, "settings deleted");
        Ok(slot)
    }

    /// Erase every slot and the whole user id table.
    pub fn erase_all(&mut self) -> Result<(), CoreError> {
        if let Some((slot, entry)) = self
            .slots
            .iter()
            .enumerate()
            .find(|(_, s)| s.state != SessionState::Closed)
        {
            return Err(CoreError::conflict(format!(
                "settings slot {slot} is {}",
                entry.state
            )));
        }
        for slot in self.slot_indexes() {
            self.storage.erase(slot)?;
        }
        if !self.user_ids.is_empty() {
            self.storage.store_user_ids(&BTreeMap::new())?;
            self.user_ids.clear();
        }
        info!(slots = self.slots.len(), "all settings erased");
        Ok(())
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn user_id(&self, index: u8) -> Result<Option<&str>, CoreError> {
        self.check_index(index)?;
        Ok(self.user_ids.get(&index).map(String::as_str))
    }

    pub fn index_of(&self, user_id: &str) -> Option<u8> {
        self.user_ids
            .iter()
            .find(|(_, id)| id.as_str() == user_id)
            .map(|(slot, _)| *slot)
    }

    /// Slots a new user id could still claim.
    pub fn free_user_id_count(&self) -> usize {
        self.slot_indexes()
            .filter(|slot| self.is_claimable(*slot))
            .count()
    }

    /// State of the slot `id` refers to. An unknown user id is Closed.
    pub fn state(&self, id: &SettingsId) -> Result<SessionState, CoreError> {
        match self.resolve(id) {
            Ok(slot) => Ok(self.slot(slot).state),
            Err(CoreError::NotFound { .. }) => Ok(SessionState::Closed),
            Err(e) => Err(e),
        }
    }

    /// The restored slot and the identity it was restored under.
    pub fn active(&self) -> Option<(u8, SettingsId)> {
        let slot = self.active?;
        let id = self.slot(slot).held.clone()?;
        Some((slot, id))
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn slots(&self) -> Vec<SlotInfo> {
        self.slot_indexes()
            .map(|index| {
                let slot = self.slot(index);
                SlotInfo {
                    index,
                    user_id: self.user_ids.get(&index).cloned(),
                    state: slot.state,
                    held_by: slot.held.clone(),
                }
            })
            .collect()
    }

    // ── Resolution ───────────────────────────────────────────────────

    /// Map an identity to its slot without claiming anything.
    fn resolve(&self, id: &SettingsId) -> Result<u8, CoreError> {
        match id {
            SettingsId::Index(index) => {
                self.check_index(*index)?;
                Ok(*index)
            }
            SettingsId::UserId(user_id) => self
                .find_user_id(user_id)?
                .ok_or_else(|| CoreError::not_found("settings user id", user_id)),
        }
    }

    /// A slot currently held under `user_id` wins over the persisted table,
    /// since an erase-release drops the table entry while the slot is
    /// still open.
    fn find_user_id(&self, user_id: &str) -> Result<Option<u8>, CoreError> {
        if !valid_user_id(user_id) {
            return Err(CoreError::invalid_argument(
                "settings user id",
                format!("must be 1..={SETTINGS_USER_ID_MAX_LEN} bytes"),
            ));
        }
        let held = self.slot_indexes().find(|slot| {
            matches!(&self.slot(*slot).held, Some(SettingsId::UserId(u)) if u == user_id)
        });
        Ok(held.or_else(|| self.index_of(user_id)))
    }

    fn free_slot(&self, id: &SettingsId) -> Result<u8, CoreError> {
        self.slot_indexes()
            .find(|slot| self.is_claimable(*slot))
            .ok_or_else(|| {
                warn!(id = %id, "no free settings slot for user id");
                CoreError::exhausted("settings user id slots", self.slots.len())
            })
    }

    fn is_claimable(&self, slot: u8) -> bool {
        !self.user_ids.contains_key(&slot) && self.slot(slot).state == SessionState::Closed
    }

    /// A slot driven by an index cannot be driven by a user id, and the
    /// other way around, until it is closed.
    fn check_holder(&self, slot: u8, id: &SettingsId) -> Result<(), CoreError> {
        match &self.slot(slot).held {
            Some(held) if held.kind() != id.kind() => Err(CoreError::conflict(format!(
                "settings slot {slot} is held as {held}"
            ))),
            _ => Ok(()),
        }
    }

    fn require_state(
        &self,
        slot: u8,
        expected: SessionState,
        operation: &str,
        id: &SettingsId,
    ) -> Result<(), CoreError> {
        let state = self.slot(slot).state;
        if state == expected {
            Ok(())
        } else {
            Err(CoreError::invalid_state(&format!("{operation} {id}"), state))
        }
    }

    fn forget_user_id(&mut self, slot: u8) -> Result<(), CoreError> {
        if self.user_ids.contains_key(&slot) {
            let mut ids = self.user_ids.clone();
            ids.remove(&slot);
            self.storage.store_user_ids(&ids)?;
            self.user_ids = ids;
        }
        Ok(())
    }

    fn check_index(&self, index: u8) -> Result<(), CoreError> {
        if usize::from(index) < self.slots.len() {
            Ok(())
        } else {
            Err(CoreError::invalid_argument(
                "settings index",
                format!("{index} is not below {}", self.slots.len()),
            ))
        }
    }

    fn slot_indexes(&self) -> impl Iterator<Item = u8> + use<> {
        (0..=u8::MAX).take(self.slots.len())
    }

    fn slot(&self, slot: u8) -> &Slot {
        &self.slots[usize::from(slot)]
    }

    fn slot_mut(&mut self, slot: u8) -> &mut Slot {
        &mut self.slots[usize::from(slot)]
    }
}

fn valid_user_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= SETTINGS_USER_ID_MAX_LEN
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn manager(max: usize) -> (SessionManager, MemoryStorage) {
        let storage = MemoryStorage::new();
        let manager = SessionManager::new(Box::new(storage.clone()), max).unwrap();
        (manager, storage)
    }

    fn uid(s: &str) -> SettingsId {
        SettingsId::user_id(s)
    }

    fn restore_empty(m: &mut SessionManager, id: &SettingsId) -> Result<u8, CoreError> {
        m.restore(id, |_| Ok(()))
    }

    fn release_with(m: &mut SessionManager, id: &SettingsId, bytes: &[u8]) -> Result<u8, CoreError> {
        let bytes = bytes.to_vec();
        m.release(id, false, move || Ok(bytes))
    }

    #[test]
    fn full_lifecycle_by_index() {
        let (mut m, storage) = manager(4);
        let id = SettingsId::Index(2);

        assert_eq!(m.open(&id).unwrap(), 2);
        assert!(storage.is_open(2));
        restore_empty(&mut m, &id).unwrap();
        assert_eq!(m.active(), Some((2, id.clone())));
        release_with(&mut m, &id, b"snap").unwrap();
        assert_eq!(m.state(&id).unwrap(), SessionState::Released);
        m.close(&id).unwrap();

        assert_eq!(storage.region(2).as_deref(), Some(&b"snap"[..]));
        assert!(!storage.is_open(2));
        assert_eq!(m.state(&id).unwrap(), SessionState::Closed);
    }

    #[test]
    fn restore_hands_over_stored_bytes() {
        let (mut m, _) = manager(2);
        let id = SettingsId::Index(0);
        m.open(&id).unwrap();
        restore_empty(&mut m, &id).unwrap();
        release_with(&mut m, &id, b"abc").unwrap();

        m.open(&id).unwrap();
        let mut seen = None;
        m.restore(&id, |data| {
            seen = data.map(<[u8]>::to_vec);
            Ok(())
        })
        .unwrap();
        assert_eq!(seen.as_deref(), Some(&b"abc"[..]));
    }

    #[test]
    fn failed_apply_leaves_slot_open() {
        let (mut m, _) = manager(2);
        let id = SettingsId::Index(0);
        m.open(&id).unwrap();
        let err = m
            .restore(&id, |_| Err(CoreError::codec("bad snapshot")))
            .unwrap_err();
        assert!(matches!(err, CoreError::Codec { .. }));
        assert_eq!(m.state(&id).unwrap(), SessionState::Open);
        assert!(m.active().is_none());
    }

    #[test]
    fn invalid_transitions() {
        let (mut m, _) = manager(2);
        let id = SettingsId::Index(1);

        assert!(matches!(restore_empty(&mut m, &id), Err(CoreError::InvalidState { .. })));
        assert!(matches!(m.close(&id), Err(CoreError::InvalidState { .. })));
        m.open(&id).unwrap();
        assert!(matches!(m.open(&id), Err(CoreError::InvalidState { .. })));
        assert!(matches!(
            release_with(&mut m, &id, b""),
            Err(CoreError::InvalidState { .. })
        ));
        restore_empty(&mut m, &id).unwrap();
        assert!(matches!(m.close(&id), Err(CoreError::InvalidState { .. })));
        assert!(matches!(m.open(&id), Err(CoreError::InvalidState { .. })));
    }

    #[test]
    fn index_must_be_in_range() {
        let (mut m, _) = manager(2);
        assert!(matches!(
            m.open(&SettingsId::Index(2)),
            Err(CoreError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn only_one_session_is_restored() {
        let (mut m, _) = manager(3);
        let a = SettingsId::Index(0);
        let b = uid("site-b");
        m.open(&a).unwrap();
        m.open(&b).unwrap();
        restore_empty(&mut m, &a).unwrap();
        assert!(matches!(restore_empty(&mut m, &b), Err(CoreError::Conflict { .. })));
        assert_eq!(m.state(&b).unwrap(), SessionState::Open);
    }

    #[test]
    fn released_session_can_be_reopened() {
        let (mut m, _) = manager(2);
        let id = SettingsId::Index(0);
        m.open(&id).unwrap();
        restore_empty(&mut m, &id).unwrap();
        release_with(&mut m, &id, b"1").unwrap();
        m.open(&id).unwrap();
        restore_empty(&mut m, &id).unwrap();
        assert_eq!(m.state(&id).unwrap(), SessionState::Restored);
    }

    #[test]
    fn user_ids_claim_lowest_free_slot() {
        let (mut m, storage) = manager(3);
        m.open(&SettingsId::Index(0)).unwrap();
        assert_eq!(m.open(&uid("alpha")).unwrap(), 1);
        assert_eq!(m.open(&uid("beta")).unwrap(), 2);
        assert!(matches!(
            m.open(&uid("gamma")),
            Err(CoreError::ResourceExhausted { .. })
        ));
        assert_eq!(m.index_of("beta"), Some(2));
        assert_eq!(m.user_id(1).unwrap(), Some("alpha"));
        assert_eq!(storage.user_ids().get(&2).map(String::as_str), Some("beta"));
        assert_eq!(m.free_user_id_count(), 0);
    }

    #[test]
    fn user_id_mapping_survives_restart() {
        let storage = MemoryStorage::new();
        {
            let mut m = SessionManager::new(Box::new(storage.clone()), 4).unwrap();
            m.open(&uid("home")).unwrap();
            m.close(&uid("home")).unwrap();
        }
        let mut m = SessionManager::new(Box::new(storage), 4).unwrap();
        assert_eq!(m.index_of("home"), Some(0));
        assert_eq!(m.open(&uid("home")).unwrap(), 0);
        assert_eq!(m.free_user_id_count(), 3);
    }

    #[test]
    fn identity_spaces_do_not_mix() {
        let (mut m, _) = manager(2);
        m.open(&uid("home")).unwrap();
        assert!(matches!(
            m.open(&SettingsId::Index(0)),
            Err(CoreError::Conflict { .. })
        ));
        assert!(matches!(
            restore_empty(&mut m, &SettingsId::Index(0)),
            Err(CoreError::Conflict { .. })
        ));
        m.close(&uid("home")).unwrap();

        m.open(&SettingsId::Index(0)).unwrap();
        assert!(matches!(m.open(&uid("home")), Err(CoreError::Conflict { .. })));
    }

    #[test]
    fn bad_user_ids_are_rejected() {
        let (mut m, _) = manager(2);
        assert!(matches!(m.open(&uid("")), Err(CoreError::InvalidArgument { .. })));
        let long = "x".repeat(SETTINGS_USER_ID_MAX_LEN + 1);
        assert!(matches!(m.open(&uid(&long)), Err(CoreError::InvalidArgument { .. })));
        assert!(matches!(m.close(&uid("nobody")), Err(CoreError::NotFound { .. })));
    }

    #[test]
    fn erase_release_forgets_region_and_user_id() {
        let (mut m, storage) = manager(2);
        let id = uid("temp");
        m.open(&id).unwrap();
        restore_empty(&mut m, &id).unwrap();
        release_with(&mut m, &id, b"x").unwrap();
        m.open(&id).unwrap();
        restore_empty(&mut m, &id).unwrap();

        m.release(&id, true, || Ok(Vec::new())).unwrap();
        assert!(storage.region(0).is_none());
        assert_eq!(m.index_of("temp"), None);
        assert!(storage.user_ids().is_empty());

        // Still held, so it can be closed by the same user id.
        m.close(&id).unwrap();
        assert_eq!(m.free_user_id_count(), 2);
    }

    #[test]
    fn reopening_after_erase_reclaims_user_id() {
        let (mut m, _) = manager(2);
        let id = uid("temp");
        m.open(&id).unwrap();
        restore_empty(&mut m, &id).unwrap();
        m.release(&id, true, || Ok(Vec::new())).unwrap();
        m.open(&id).unwrap();
        assert_eq!(m.index_of("temp"), Some(0));
    }

    #[test]
    fn delete_requires_closed_slot() {
        let (mut m, storage) = manager(2);
        let id = uid("lab");
        m.open(&id).unwrap();
        restore_empty(&mut m, &id).unwrap();
        release_with(&mut m, &id, b"x").unwrap();
        assert!(matches!(m.delete(&id), Err(CoreError::Conflict { .. })));
        m.close(&id).unwrap();

        m.delete(&id).unwrap();
        assert!(storage.region(0).is_none());
        assert!(matches!(m.delete(&id), Err(CoreError::NotFound { .. })));
    }

    #[test]
    fn erase_all_requires_everything_closed() {
        let (mut m, storage) = manager(3);
        m.open(&uid("a")).unwrap();
        restore_empty(&mut m, &uid("a")).unwrap();
        release_with(&mut m, &uid("a"), b"x").unwrap();
        assert!(matches!(m.erase_all(), Err(CoreError::Conflict { .. })));

        m.close(&uid("a")).unwrap();
        m.erase_all().unwrap();
        assert!(storage.region(0).is_none());
        assert!(storage.user_ids().is_empty());
        assert_eq!(m.free_user_id_count(), 3);
    }

    #[test]
    fn commit_needs_a_restored_session() {
        let (mut m, storage) = manager(2);
        assert!(matches!(
            m.commit(|| Ok(b"x".to_vec())),
            Err(CoreError::InvalidState { .. })
        ));
        let id = SettingsId::Index(1);
        m.open(&id).unwrap();
        restore_empty(&mut m, &id).unwrap();
        assert_eq!(m.commit(|| Ok(b"live".to_vec())).unwrap(), 1);
        assert_eq!(storage.region(1).as_deref(), Some(&b"live"[..]));
        assert_eq!(m.state(&id).unwrap(), SessionState::Restored);
    }

    /// Memory backend whose erase always fails.
    #[derive(Debug, Clone, Default)]
    struct EraseFails(MemoryStorage);

    impl SettingsStorage for EraseFails {
        fn open(&mut self, slot: u8) -> Result<(), StorageError> {
            self.0.open(slot)
        }
        fn read_all(&mut self, slot: u8) -> Result<Option<Vec<u8>>, StorageError> {
            self.0.read_all(slot)
        }
        fn write_all(&mut self, slot: u8, data: &[u8]) -> Result<(), StorageError> {
            self.0.write_all(slot, data)
        }
        fn erase(&mut self, _slot: u8) -> Result<(), StorageError> {
            Err(StorageError::Io(std::io::Error::other("medium is read-only")))
        }
        fn close(&mut self, slot: u8) -> Result<(), StorageError> {
            self.0.close(slot)
        }
        fn load_user_ids(&mut self) -> Result<BTreeMap<u8, String>, StorageError> {
            self.0.load_user_ids()
        }
        fn store_user_ids(&mut self, ids: &BTreeMap<u8, String>) -> Result<(), StorageError> {
            self.0.store_user_ids(ids)
        }
    }

    #[test]
    fn failed_erase_keeps_user_id_and_session() {
        let backend = EraseFails::default();
        let storage = backend.0.clone();
        let mut m = SessionManager::new(Box::new(backend), 2).unwrap();
        let id = uid("keep");
        m.open(&id).unwrap();
        restore_empty(&mut m, &id).unwrap();
        m.commit(|| Ok(b"live".to_vec())).unwrap();

        let err = m.release(&id, true, || Ok(Vec::new())).unwrap_err();
        assert!(matches!(err, CoreError::Storage(_)));
        assert_eq!(m.index_of("keep"), Some(0));
        assert_eq!(storage.user_ids().get(&0).map(String::as_str), Some("keep"));
        assert_eq!(storage.region(0).as_deref(), Some(&b"live"[..]));
        assert_eq!(m.state(&id).unwrap(), SessionState::Restored);
        assert_eq!(m.active(), Some((0, id)));
    }

    #[test]
    fn stale_user_ids_are_dropped_on_load() {
        let mut storage = MemoryStorage::new();
        storage
            .store_user_ids(&BTreeMap::from([(0, "ok".to_owned()), (9, "far".to_owned())]))
            .unwrap();
        let m = SessionManager::new(Box::new(storage), 2).unwrap();
        assert_eq!(m.index_of("ok"), Some(0));
        assert_eq!(m.index_of("far"), None);
    }
}
