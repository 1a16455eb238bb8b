//! Registry of in-flight background downloads.

use std::collections::HashMap;

use tokio::task::AbortHandle;

enum Slot {
    /// Claimed by a caller that has not spawned its task yet.
    Reserved,
    Running(AbortHandle),
}

impl Slot {
    fn is_live(&self) -> bool {
        match self {
            Slot::Reserved => true,
            Slot::Running(h) => !h.is_finished(),
        }
    }
}

/// Tracks tokio abort handles of running downloads, keyed by model id.
///
/// A slot is claimed with [`try_reserve`](Self::try_reserve) before any
/// await, so at most one caller per id gets to spawn a task.
pub struct TaskManager {
    slots: std::sync::Mutex<HashMap<String, Slot>>,
}

impl std::fmt::Debug for TaskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.slots.lock().map(|s| s.len()).unwrap_or(0);
        write!(f, "TaskManager({count} slots)")
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskManager {
    pub fn new() -> Self {
        Self {
            slots: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Claim `id`. Returns `false` if a live reservation or task holds it.
    pub fn try_reserve(&self, id: &str) -> bool {
        let Ok(mut map) = self.slots.lock() else {
            return false;
        };
        map.retain(|_, slot| slot.is_live());
        if map.contains_key(id) {
            return false;
        }
        map.insert(id.to_owned(), Slot::Reserved);
        true
    }

    /// Attach the spawned task to a slot, replacing its reservation.
    pub fn insert(&self, id: impl Into<String>, handle: AbortHandle) {
        if let Ok(mut map) = self.slots.lock() {
            map.insert(id.into(), Slot::Running(handle));
        }
    }

    /// `true` while `id` is reserved or its task has not finished.
    pub fn is_running(&self, id: &str) -> bool {
        self.slots
            .lock()
            .map(|map| map.get(id).is_some_and(Slot::is_live))
            .unwrap_or(false)
    }

    /// Abort and remove a running task. Returns `true` if one was found.
    /// A bare reservation is left in place for its owner to resolve.
    pub fn cancel(&self, id: &str) -> bool {
        let Ok(mut map) = self.slots.lock() else {
            return false;
        };
        match map.get(id) {
            Some(Slot::Running(h)) => {
                h.abort();
                map.remove(id);
                true
            }
            _ => false,
        }
    }

    /// Drop the slot for `id`, whether reserved or running.
    pub fn remove(&self, id: &str) {
        if let Ok(mut map) = self.slots.lock() {
            map.remove(id);
        }
    }

    /// Number of live slots, reservations included.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .map(|map| map.values().filter(|s| s.is_live()).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
