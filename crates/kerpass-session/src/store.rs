//! The time-sharded session store: a fixed-size ring of slots, each
//! holding the entries minted in one time tick, expiring implicitly by
//! overwrite rather than through a dedicated reaper (spec.md §3
//! "Time-sharded store", §4.7 "Store").

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::sid::{SessionId, N_SLOTS, SESSION_ID_LEN};

struct Slot<V> {
    /// The tick every live entry in this slot shares. `None` before the
    /// first insert.
    tick: Option<u32>,
    entries: HashMap<[u8; SESSION_ID_LEN], V>,
}

impl<V> Default for Slot<V> {
    fn default() -> Self {
        Slot {
            tick: None,
            entries: HashMap::new(),
        }
    }
}

/// A `SessionId`-keyed map with O(1) expiry and bounded memory: each of
/// [`N_SLOTS`] slots is guarded by its own lock, and an insert into a slot
/// whose recorded tick differs from the incoming id's tick clears the slot
/// first (spec.md §4.7).
pub struct TimeShardedStore<V> {
    slots: Vec<RwLock<Slot<V>>>,
}

impl<V> Default for TimeShardedStore<V> {
    fn default() -> Self {
        TimeShardedStore {
            slots: (0..N_SLOTS).map(|_| RwLock::new(Slot::default())).collect(),
        }
    }
}

impl<V: Clone> TimeShardedStore<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `value` under `sid`, evicting the rest of the slot first if
    /// its recorded tick is stale.
    pub fn set(&self, sid: &SessionId, value: V) {
        let mut slot = self.slots[sid.slot_index()].write();
        if slot.tick != Some(sid.t()) {
            if let Some(evicted_tick) = slot.tick {
                tracing::debug!(
                    slot_index = sid.slot_index(),
                    evicted_tick,
                    evicted_count = slot.entries.len(),
                    "session store slot rolled over to a new tick"
                );
            }
            slot.tick = Some(sid.t());
            slot.entries.clear();
        }
        slot.entries.insert(*sid.as_bytes(), value);
    }

    /// Returns a copy of the value stored under `sid`, or `None` if absent
    /// or if the slot has since rolled over to a newer tick.
    pub fn get(&self, sid: &SessionId) -> Option<V> {
        let slot = self.slots[sid.slot_index()].read();
        if slot.tick != Some(sid.t()) {
            return None;
        }
        slot.entries.get(sid.as_bytes()).cloned()
    }

    /// Removes and returns the value stored under `sid`, under the same
    /// tick-match rule as [`Self::get`].
    pub fn pop(&self, sid: &SessionId) -> Option<V> {
        let mut slot = self.slots[sid.slot_index()].write();
        if slot.tick != Some(sid.t()) {
            return None;
        }
        let removed = slot.entries.remove(sid.as_bytes());
        if removed.is_some() {
            tracing::debug!(slot_index = sid.slot_index(), "session store entry evicted by pop");
        }
        removed
    }

    /// Re-inserts a value popped earlier, for the enrollment server's
    /// "re-insert the authorization record on the error path" recovery
    /// (spec.md §4.9, §7).
    pub fn restore(&self, sid: &SessionId, value: V) {
        self.set(sid, value);
    }
}
