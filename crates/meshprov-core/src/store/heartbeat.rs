// ── Heartbeat filter engine ──
//
// Decides per received heartbeat whether it reaches the application.
// Entries are keyed by partial (src, dst) pairs; each address takes part
// in at most one entry. Whitelist entries may expire and are purged lazily
// whenever the table is consulted. Deadlines are persisted as Unix time so
// an entry keeps ageing while its session is released or closed.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, trace};

use super::arena::SlotArena;
use crate::error::CoreError;
use crate::model::{Address, FilterInfo, FilterOp, FilterType, HeartbeatFilterEntry};

// ── Wall clock ──────────────────────────────────────────────────────

/// Maps the tokio clock onto Unix time from a single anchor.
///
/// All filters of one provisioner share an anchor, so a deadline written
/// at release and read back at restore is measured on one timeline, paused
/// test time included.
#[derive(Debug, Clone, Copy)]
pub struct WallClock {
    unix: Duration,
    anchor: Instant,
}

impl WallClock {
    pub fn new() -> Self {
        Self {
            unix: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default(),
            anchor: Instant::now(),
        }
    }

    /// Milliseconds since the Unix epoch at `at`.
    pub fn unix_ms(&self, at: Instant) -> u64 {
        let since = self
            .unix
            .saturating_add(at.saturating_duration_since(self.anchor));
        u64::try_from(since.as_millis()).unwrap_or(u64::MAX)
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

// ── Entries ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct FilterEntry {
    src: Option<Address>,
    dst: Option<Address>,
    expiry: Option<Duration>,
    deadline: Option<Instant>,
}

impl FilterEntry {
    fn matches(&self, src: Address, dst: Address) -> bool {
        self.src.is_none_or(|s| s == src) && self.dst.is_none_or(|d| d == dst)
    }

    /// Shares the given source or the given destination.
    fn overlaps(&self, src: Option<Address>, dst: Option<Address>) -> bool {
        (src.is_some() && self.src == src) || (dst.is_some() && self.dst == dst)
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|d| now >= d)
    }

    fn public(&self, now: Instant) -> HeartbeatFilterEntry {
        HeartbeatFilterEntry {
            src: self.src,
            dst: self.dst,
            expiry: self.expiry,
            remaining: self.deadline.map(|d| d.saturating_duration_since(now)),
        }
    }
}

/// Persisted form of the filter engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatSnapshot {
    pub receiving: bool,
    pub filter_type: FilterType,
    pub entries: Vec<StoredFilterEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFilterEntry {
    pub src: Option<Address>,
    pub dst: Option<Address>,
    /// Configured lifetime in seconds, absent for permanent entries.
    pub expiry_secs: Option<u32>,
    /// Unix time in milliseconds at which the entry expires.
    pub deadline_unix_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct HeartbeatFilter {
    receiving: bool,
    filter_type: FilterType,
    entries: SlotArena<FilterEntry>,
    clock: WallClock,
}

impl HeartbeatFilter {
    pub fn new(max_entries: usize) -> Self {
        Self::with_clock(max_entries, WallClock::new())
    }

    pub fn with_clock(max_entries: usize, clock: WallClock) -> Self {
        Self {
            receiving: false,
            filter_type: FilterType::Blacklist,
            entries: SlotArena::new(max_entries),
            clock,
        }
    }

    pub fn clock(&self) -> WallClock {
        self.clock
    }

    /// Start reporting heartbeats: blacklist, no entries.
    pub fn start_receiving(&mut self) {
        self.receiving = true;
        self.filter_type = FilterType::Blacklist;
        self.entries.clear();
        debug!("heartbeat reception started");
    }

    pub fn stop_receiving(&mut self) {
        self.receiving = false;
        debug!("heartbeat reception stopped");
    }

    pub fn is_receiving(&self) -> bool {
        self.receiving
    }

    pub fn filter_type(&self) -> FilterType {
        self.filter_type
    }

    /// Switch the filter type. Changing it drops every entry.
    pub fn set_filter_type(&mut self, filter_type: FilterType) {
        if filter_type != self.filter_type {
            self.entries.clear();
            self.filter_type = filter_type;
            debug!(%filter_type, "heartbeat filter type changed");
        }
    }

    pub fn set_filter_info(&mut self, op: FilterOp, info: FilterInfo) -> Result<(), CoreError> {
        match op {
            FilterOp::Add => self.add(info),
            FilterOp::Remove => self.remove(info),
            FilterOp::Clean => {
                self.entries.clear();
                debug!("heartbeat filter cleaned");
                Ok(())
            }
        }
    }

    fn add(&mut self, info: FilterInfo) -> Result<(), CoreError> {
        require_address(info)?;
        if let Some(src) = info.src.filter(|a| !a.is_unicast()) {
            return Err(CoreError::invalid_argument(
                "filter source",
                format!("{src} is not a unicast address"),
            ));
        }
        if let Some(dst) = info.dst.filter(|a| !a.is_unicast() && !a.is_group()) {
            return Err(CoreError::invalid_argument(
                "filter destination",
                format!("{dst} is neither unicast nor group"),
            ));
        }

        let now = Instant::now();
        self.purge_expired(now);

        let expiry = match self.filter_type {
            FilterType::Whitelist if info.expiry_secs > 0 => {
                Some(Duration::from_secs(u64::from(info.expiry_secs)))
            }
            _ => None,
        };
        let entry = FilterEntry {
            src: info.src,
            dst: info.dst,
            expiry,
            deadline: expiry.map(|e| now + e),
        };

        let overlapping: Vec<usize> = self
            .entries
            .iter()
            .filter(|(_, e)| e.overlaps(info.src, info.dst))
            .map(|(slot, _)| slot)
            .collect();

        if let &[slot] = overlapping.as_slice() {
            if let Some(existing) = self.entries.get_mut(slot) {
                *existing = entry;
            }
            debug!(slot, src = ?info.src, dst = ?info.dst, "heartbeat filter entry updated");
            return Ok(());
        }

        if self.entries.len() - overlapping.len() >= self.entries.capacity() {
            return Err(CoreError::exhausted(
                "heartbeat filter entries",
                self.entries.capacity(),
            ));
        }
        for slot in &overlapping {
            self.entries.remove(*slot);
        }
        let slot = self.entries.insert(entry).map_err(|_| {
            CoreError::exhausted("heartbeat filter entries", self.entries.capacity())
        })?;
        debug!(
            slot,
            replaced = overlapping.len(),
            src = ?info.src,
            dst = ?info.dst,
            "heartbeat filter entry added"
        );
        Ok(())
    }

    fn remove(&mut self, info: FilterInfo) -> Result<(), CoreError> {
        require_address(info)?;
        let removed = match (info.src, info.dst) {
            (Some(src), Some(dst)) => self
                .entries
                .retain(|e| e.src != Some(src) || e.dst != Some(dst)),
            (Some(src), None) => self.entries.retain(|e| e.src != Some(src)),
            (None, Some(dst)) => self.entries.retain(|e| e.dst != Some(dst)),
            (None, None) => 0,
        };
        debug!(removed, src = ?info.src, dst = ?info.dst, "heartbeat filter entries removed");
        Ok(())
    }

    /// Whether a heartbeat from `src` to `dst` should be reported.
    pub fn evaluate(&mut self, src: Address, dst: Address) -> bool {
        if !self.receiving {
            trace!(%src, %dst, "heartbeat dropped: not receiving");
            return false;
        }
        self.purge_expired(Instant::now());
        let matched = self.entries.values().any(|e| e.matches(src, dst));
        let pass = match self.filter_type {
            FilterType::Blacklist => !matched,
            FilterType::Whitelist => matched,
        };
        trace!(%src, %dst, filter = %self.filter_type, pass, "heartbeat evaluated");
        pass
    }

    /// Live entries in table order.
    pub fn entries(&mut self) -> Vec<HeartbeatFilterEntry> {
        let now = Instant::now();
        self.purge_expired(now);
        self.entries.values().map(|e| e.public(now)).collect()
    }

    pub fn capacity(&self) -> usize {
        self.entries.capacity()
    }

    fn purge_expired(&mut self, now: Instant) {
        let purged = self.entries.retain(|e| !e.is_expired(now));
        if purged > 0 {
            debug!(purged, "expired heartbeat filter entries purged");
        }
    }

    // ── Snapshot support ─────────────────────────────────────────────

    pub(crate) fn snapshot(&self) -> HeartbeatSnapshot {
        let now = Instant::now();
        HeartbeatSnapshot {
            receiving: self.receiving,
            filter_type: self.filter_type,
            entries: self
                .entries
                .values()
                .filter(|e| !e.is_expired(now))
                .map(|e| StoredFilterEntry {
                    src: e.src,
                    dst: e.dst,
                    expiry_secs: e.expiry.map(|d| u32::try_from(d.as_secs()).unwrap_or(u32::MAX)),
                    deadline_unix_ms: e.deadline.map(|d| self.clock.unix_ms(d)),
                })
                .collect(),
        }
    }

    /// Rebuild the engine on `clock`. Entries whose deadline passed while
    /// the snapshot sat in storage are dropped.
    pub(crate) fn from_snapshot(
        max_entries: usize,
        snapshot: HeartbeatSnapshot,
        clock: WallClock,
    ) -> Result<Self, CoreError> {
        let now = Instant::now();
        let now_ms = clock.unix_ms(now);
        let mut filter = Self::with_clock(max_entries, clock);
        let mut expired = 0_usize;
        filter.receiving = snapshot.receiving;
        filter.filter_type = snapshot.filter_type;
        for stored in snapshot.entries {
            if stored.src.is_none() && stored.dst.is_none() {
                return Err(CoreError::codec("heartbeat filter entry without addresses"));
            }
            let expiry = stored
                .expiry_secs
                .filter(|s| *s > 0)
                .map(|s| Duration::from_secs(u64::from(s)));
            let deadline = match (expiry, stored.deadline_unix_ms) {
                (None, _) => None,
                (Some(e), None) => Some(now + e),
                (Some(e), Some(at)) => {
                    let left = Duration::from_millis(at.saturating_sub(now_ms));
                    if left.is_zero() {
                        expired += 1;
                        continue;
                    }
                    Some(now + left.min(e))
                }
            };
            let entry = FilterEntry {
                src: stored.src,
                dst: stored.dst,
                expiry,
                deadline,
            };
            filter.entries.insert(entry).map_err(|_| {
                CoreError::codec(format!(
                    "more heartbeat filter entries than the table holds ({max_entries})"
                ))
            })?;
        }
        if expired > 0 {
            debug!(expired, "heartbeat filter entries expired in storage");
        }
        Ok(filter)
    }
}

fn require_address(info: FilterInfo) -> Result<(), CoreError> {
    if info.src.is_none() && info.dst.is_none() {
        return Err(CoreError::invalid_argument(
            "filter info",
            "source or destination is required",
        ));
    }
    Ok(())
}
