// ── Fixed-capacity slot arena ──
//
// A table of `capacity` slots where each occupied slot keeps its position
// until removed. Positions are the stable handles callers see (node table
// index, filter entry order).

/// Sparse fixed-capacity table. Empty slots are `None` tombstones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotArena<T> {
    slots: Vec<Option<T>>,
}

impl<T> SlotArena<T> {
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self { slots }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    pub fn is_full(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    /// Lowest empty slot, if any.
    pub fn first_free(&self) -> Option<usize> {
        self.slots.iter().position(Option::is_none)
    }

    /// Store `value` in the lowest empty slot and return that slot.
    ///
    /// Hands the value back when the arena is full.
    pub fn insert(&mut self, value: T) -> Result<usize, T> {
        match self.first_free() {
            Some(slot) => {
                self.slots[slot] = Some(value);
                Ok(slot)
            }
            None => Err(value),
        }
    }

    /// Store the value `make` builds for the lowest empty slot.
    ///
    /// Returns `full` when no slot is empty. A builder error leaves the
    /// arena untouched.
    pub fn try_insert_with<E>(
        &mut self,
        full: E,
        make: impl FnOnce(usize) -> Result<T, E>,
    ) -> Result<usize, E> {
        let slot = self.first_free().ok_or(full)?;
        let value = make(slot)?;
        self.slots[slot] = Some(value);
        Ok(slot)
    }

    /// Store `value` at a specific slot, replacing whatever was there.
    ///
    /// Hands the value back when `slot` is out of range.
    pub fn insert_at(&mut self, slot: usize, value: T) -> Result<Option<T>, T> {
        match self.slots.get_mut(slot) {
            Some(cell) => Ok(cell.replace(value)),
            None => Err(value),
        }
    }

    pub fn get(&self, slot: usize) -> Option<&T> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut T> {
        self.slots.get_mut(slot).and_then(Option::as_mut)
    }

    pub fn remove(&mut self, slot: usize) -> Option<T> {
        self.slots.get_mut(slot).and_then(Option::take)
    }

    /// Occupied slots with their positions, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|v| (i, v)))
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.slots.iter().flatten()
    }

    /// First occupied slot whose value satisfies `pred`.
    pub fn position(&self, mut pred: impl FnMut(&T) -> bool) -> Option<usize> {
        self.iter().find(|(_, v)| pred(v)).map(|(i, _)| i)
    }

    /// Tombstone every occupied slot whose value fails `keep`. Returns the
    /// number of slots cleared.
    pub fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) -> usize {
        let mut removed = 0;
        for cell in &mut self.slots {
            if cell.as_ref().is_some_and(|v| !keep(v)) {
                *cell = None;
                removed += 1;
            }
        }
        removed
    }

    pub fn clear(&mut self) {
        for cell in &mut self.slots {
            *cell = None;
        }
    }

    /// The raw table, tombstones included.
    pub fn as_slice(&self) -> &[Option<T>] {
        &self.slots
    }
}
