use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;
use wrgl_objects::{Commit, ObjectStore};
use wrgl_types::ObjectSum;

use crate::error::{load_commit, DagResult};

struct Entry {
    time: DateTime<Utc>,
    sum: ObjectSum,
    commit: Commit,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.sum == other.sum
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    // Max-heap: newest commit first, ties broken by sum.
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .cmp(&other.time)
            .then_with(|| self.sum.cmp(&other.sum))
    }
}

/// Priority queue of commits ordered newest-first.
///
/// Every commit that has ever been inserted is remembered as *seen* and is
/// never queued twice, so popping with [`pop_insert_parents`] visits each
/// commit reachable from the initial tips exactly once.
///
/// [`pop_insert_parents`]: CommitsQueue::pop_insert_parents
pub struct CommitsQueue {
    store: Arc<dyn ObjectStore>,
    heap: BinaryHeap<Entry>,
    seen: HashSet<ObjectSum>,
}

impl CommitsQueue {
    /// Seed a queue with the given tips.
    pub fn new(
        store: Arc<dyn ObjectStore>,
        tips: impl IntoIterator<Item = ObjectSum>,
    ) -> DagResult<Self> {
        let mut queue = Self {
            store,
            heap: BinaryHeap::new(),
            seen: HashSet::new(),
        };
        for sum in tips {
            queue.insert(sum)?;
        }
        Ok(queue)
    }

    /// Queue a commit. Returns `false` if it had already been seen.
    pub fn insert(&mut self, sum: ObjectSum) -> DagResult<bool> {
        if self.seen.contains(&sum) {
            return Ok(false);
        }
        let commit = load_commit(self.store.as_ref(), &sum)?;
        self.seen.insert(sum);
        self.heap.push(Entry {
            time: commit.time,
            sum,
            commit,
        });
        Ok(true)
    }

    /// Whether `sum` has ever been queued.
    pub fn seen(&self, sum: &ObjectSum) -> bool {
        self.seen.contains(sum)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Pop the newest commit without touching its parents.
    pub fn pop(&mut self) -> Option<(ObjectSum, Commit)> {
        self.heap.pop().map(|e| (e.sum, e.commit))
    }

    /// Pop the newest commit and queue its unseen parents.
    ///
    /// Returns `Ok(None)` once the queue is exhausted.
    pub fn pop_insert_parents(&mut self) -> DagResult<Option<(ObjectSum, Commit)>> {
        let Some((sum, commit)) = self.pop() else {
            return Ok(None);
        };
        for parent in &commit.parents {
            self.insert(*parent)?;
        }
        Ok(Some((sum, commit)))
    }

    /// Keep popping (and queueing parents) until `target` is popped.
    ///
    /// Returns `Ok(None)` if the queue runs dry first.
    pub fn pop_until(&mut self, target: &ObjectSum) -> DagResult<Option<(ObjectSum, Commit)>> {
        while let Some((sum, commit)) = self.pop_insert_parents()? {
            if sum == *target {
                return Ok(Some((sum, commit)));
            }
        }
        Ok(None)
    }

    /// Drop `sums` and all of their ancestors from the queue and mark them
    /// seen so they are never queued again.
    pub fn remove_ancestors(&mut self, sums: &[ObjectSum]) -> DagResult<()> {
        let mut removed: HashSet<ObjectSum> = HashSet::new();
        let mut stack: Vec<ObjectSum> = sums.to_vec();
        while let Some(sum) = stack.pop() {
            if !removed.insert(sum) {
                continue;
            }
            let commit = load_commit(self.store.as_ref(), &sum)?;
            stack.extend(commit.parents.iter().filter(|p| !removed.contains(p)));
        }
        let before = self.heap.len();
        self.heap.retain(|e| !removed.contains(&e.sum));
        debug!(
            removed = before - self.heap.len(),
            marked = removed.len(),
            "removed ancestors from commits queue"
        );
        self.seen.extend(removed);
        Ok(())
    }
}
