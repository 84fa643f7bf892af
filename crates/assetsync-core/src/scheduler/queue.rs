//! Pending-job queue ordered by (priority desc, submission order asc).

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

use crate::transfer::{Priority, TransferId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct QueueKey {
    rank: Reverse<Priority>,
    seq: u64,
}

/// Priority queue with O(log n) removal and re-positioning by transfer id.
/// A re-prioritized job keeps its original submission sequence, so it stays
/// FIFO relative to jobs that were already in its new tier.
pub(crate) struct JobQueue<J> {
    order: BTreeMap<QueueKey, (TransferId, J)>,
    keys: HashMap<TransferId, QueueKey>,
    next_seq: u64,
}

impl<J> JobQueue<J> {
    pub(crate) fn new() -> Self {
        Self {
            order: BTreeMap::new(),
            keys: HashMap::new(),
            next_seq: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    pub(crate) fn get(&self, id: TransferId) -> Option<&J> {
        let key = self.keys.get(&id)?;
        self.order.get(key).map(|(_, job)| job)
    }

    pub(crate) fn push(&mut self, id: TransferId, priority: Priority, job: J) {
        let key = QueueKey {
            rank: Reverse(priority),
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.keys.insert(id, key);
        self.order.insert(key, (id, job));
    }

    /// Highest-priority, earliest-submitted job.
    pub(crate) fn pop(&mut self) -> Option<(TransferId, J)> {
        let (_, (id, job)) = self.order.pop_first()?;
        self.keys.remove(&id);
        Some((id, job))
    }

    pub(crate) fn remove(&mut self, id: TransferId) -> Option<J> {
        let key = self.keys.remove(&id)?;
        self.order.remove(&key).map(|(_, job)| job)
    }

    /// Move a queued job to a new tier. Returns false if `id` is not queued.
    pub(crate) fn reprioritize(&mut self, id: TransferId, priority: Priority) -> bool {
        let Some(key) = self.keys.get(&id).copied() else {
            return false;
        };
        let Some(entry) = self.order.remove(&key) else {
            return false;
        };
        let new_key = QueueKey {
            rank: Reverse(priority),
            seq: key.seq,
        };
        self.keys.insert(id, new_key);
        self.order.insert(new_key, entry);
        true
    }

    pub(crate) fn drain(&mut self) -> Vec<(TransferId, J)> {
        self.keys.clear();
        std::mem::take(&mut self.order).into_values().collect()
    }
}
