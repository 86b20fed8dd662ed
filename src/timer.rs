//! Deterministic timer queue
//!
//! Every deferral in the engine (debounce, keydown probe, iframe injection,
//! periodic sweep, bridge retries) is an entry here, keyed by due time on
//! the host's virtual clock. Nothing fires on its own: the owner pops due
//! entries when the host advances time, so clearing the queue guarantees
//! no callback runs afterwards.

use std::collections::{BTreeMap, HashMap};

/// Handle for cancelling a scheduled entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

#[derive(Debug)]
pub struct TimerQueue<T> {
    next_id: u64,
    /// (due_ms, id) orders ties by scheduling order
    entries: BTreeMap<(u64, TimerId), T>,
    due_by_id: HashMap<TimerId, u64>,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            entries: BTreeMap::new(),
            due_by_id: HashMap::new(),
        }
    }

    pub fn schedule_at(&mut self, due_ms: u64, task: T) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.entries.insert((due_ms, id), task);
        self.due_by_id.insert(id, due_ms);
        id
    }

    /// Cancel an entry; returns its task if it was still pending
    pub fn cancel(&mut self, id: TimerId) -> Option<T> {
        let due = self.due_by_id.remove(&id)?;
        self.entries.remove(&(due, id))
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.due_by_id.contains_key(&id)
    }

    /// Remove and return the earliest entry due at or before `now_ms`
    pub fn pop_due(&mut self, now_ms: u64) -> Option<(TimerId, T)> {
        let (&(due, id), _) = self.entries.first_key_value()?;
        if due > now_ms {
            return None;
        }
        self.due_by_id.remove(&id);
        self.entries.remove(&(due, id)).map(|task| (id, task))
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.entries.first_key_value().map(|(&(due, _), _)| due)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.due_by_id.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.values()
    }
}
