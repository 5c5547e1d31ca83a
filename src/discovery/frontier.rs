//! Shared work queue for discovery workers
//!
//! The frontier holds pending items, the visited-set and the number of items
//! currently being worked on. Workers call [`Frontier::next`] until it returns
//! `None`, which happens once nothing is pending and nothing is in flight, and
//! call [`Frontier::done`] after finishing each item (after pushing any new
//! work it produced).

use std::collections::{HashSet, VecDeque};
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::Notify;

struct FrontierState<K, T> {
    pending: VecDeque<T>,
    visited: HashSet<K>,
    in_flight: usize,
}

/// Deduplicating FIFO queue shared by discovery workers
pub struct Frontier<K, T> {
    state: Mutex<FrontierState<K, T>>,
    notify: Notify,
}

impl<K: Eq + Hash, T> Frontier<K, T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FrontierState {
                pending: VecDeque::new(),
                visited: HashSet::new(),
                in_flight: 0,
            }),
            notify: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FrontierState<K, T>> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queues `item` unless `key` was seen before
    ///
    /// Returns true if the item was queued.
    pub fn push_unique(&self, key: K, item: T) -> bool {
        {
            let mut state = self.lock();
            if !state.visited.insert(key) {
                return false;
            }
            state.pending.push_back(item);
        }
        self.notify.notify_one();
        true
    }

    /// Queues `item` again for a key that was already seen
    pub fn push(&self, item: T) {
        self.lock().pending.push_back(item);
        self.notify.notify_one();
    }

    /// Takes the next item, waiting while other workers may still produce work
    pub async fn next(&self) -> Option<T> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if let Some(item) = state.pending.pop_front() {
                    state.in_flight += 1;
                    return Some(item);
                }
                if state.in_flight == 0 {
                    drop(state);
                    self.notify.notify_waiters();
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Marks one item taken by [`Frontier::next`] as finished
    pub fn done(&self) {
        {
            let mut state = self.lock();
            state.in_flight = state.in_flight.saturating_sub(1);
        }
        self.notify.notify_waiters();
    }

    /// Number of distinct keys seen so far
    pub fn visited_len(&self) -> usize {
        self.lock().visited.len()
    }
}

impl<K: Eq + Hash, T> Default for Frontier<K, T> {
    fn default() -> Self {
        Self::new()
    }
}
