//! Expiring key/value store backing session affinity.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::hash::Hash;
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::debug;

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

struct State<K, V> {
    entries: HashMap<K, Entry<V>>,
    /// Min-heap of expiries. May hold stale pairs for keys that were
    /// removed or re-added; those are skipped when popped.
    expiries: BinaryHeap<Reverse<(Instant, K)>>,
}

impl<K: Hash + Eq + Ord + Clone, V> State<K, V> {
    fn sweep(&mut self, now: Instant) -> usize {
        let mut removed = 0;
        while let Some(Reverse((at, _))) = self.expiries.peek() {
            if *at > now {
                break;
            }
            let Some(Reverse((at, key))) = self.expiries.pop() else {
                break;
            };
            if self.entries.get(&key).is_some_and(|e| e.expires_at == at) {
                self.entries.remove(&key);
                removed += 1;
            }
        }
        removed
    }

    /// Rebuild the heap from live entries once stale pairs outnumber them.
    fn compact(&mut self) {
        if self.expiries.len() <= 2 * self.entries.len() + 16 {
            return;
        }
        self.expiries = self
            .entries
            .iter()
            .map(|(key, entry)| Reverse((entry.expires_at, key.clone())))
            .collect();
    }

    fn next_expiry(&self) -> Option<Instant> {
        self.expiries.peek().map(|Reverse((at, _))| *at)
    }

    fn take_live(&mut self, key: &K, now: Instant) -> Option<V> {
        let entry = self.entries.remove(key)?;
        (entry.expires_at > now).then_some(entry.value)
    }
}

/// A map whose entries disappear once their time-to-live has passed.
///
/// Lookups check expiry themselves, so a stale entry is never returned even
/// if the background sweeper has not run yet. Clones share the same store.
pub struct TtlCache<K, V> {
    state: Arc<Mutex<State<K, V>>>,
}

impl<K, V> Clone for TtlCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<K, V> Default for TtlCache<K, V>
where
    K: Hash + Eq + Ord + Clone + Send + 'static,
    V: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Hash + Eq + Ord + Clone + Send + 'static,
    V: Send + 'static,
{
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                entries: HashMap::new(),
                expiries: BinaryHeap::new(),
            })),
        }
    }

    /// Insert or replace `key`, expiring `ttl` from now.
    pub fn add(&self, key: K, value: V, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        let mut state = self.state.lock().expect("lock poisoned");
        state.expiries.push(Reverse((expires_at, key.clone())));
        state.entries.insert(key, Entry { value, expires_at });
        state.compact();
    }

    /// Remove and return a live entry.
    pub fn pop(&self, key: &K) -> Option<V> {
        let mut state = self.state.lock().expect("lock poisoned");
        state.take_live(key, Instant::now())
    }

    /// Remove an entry. Returns `true` if a live entry was removed.
    pub fn delete(&self, key: &K) -> bool {
        self.pop(key).is_some()
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.state.lock().expect("lock poisoned").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let mut state = self.state.lock().expect("lock poisoned");
        state.sweep(Instant::now())
    }

    /// Sweep on the current tokio runtime, waking at the earliest expiry
    /// and at least every `period`. The task ends once every clone of the
    /// cache has been dropped.
    pub fn spawn_sweeper(&self, period: Duration) -> JoinHandle<()> {
        let state: Weak<Mutex<State<K, V>>> = Arc::downgrade(&self.state);
        tokio::spawn(async move {
            loop {
                let next = {
                    let Some(state) = state.upgrade() else {
                        break;
                    };
                    let mut state = state.lock().expect("lock poisoned");
                    let now = Instant::now();
                    let removed = state.sweep(now);
                    if removed > 0 {
                        debug!(removed, "expired sessions swept");
                    }
                    let latest = now + period;
                    state.next_expiry().map_or(latest, |at| at.min(latest))
                };
                tokio::time::sleep_until(next.into()).await;
            }
        })
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Hash + Eq + Ord + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    /// Return a copy of a live entry, leaving it in place.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut state = self.state.lock().expect("lock poisoned");
        let now = Instant::now();
        match state.entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
            Some(_) => {
                state.entries.remove(key);
                None
            }
            None => None,
        }
    }
}
