//! Copy-on-write maps for the process-wide caches.
//!
//! Readers load the current snapshot without taking a lock. Writers build a
//! complete replacement map and publish it with a single atomic swap, so no
//! reader ever sees half of an update. [`SnapshotMap::update`] serializes its
//! writers; [`SnapshotMap::fill`] never blocks and retries instead.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

pub(crate) struct SnapshotMap<K, V> {
    current: ArcSwap<HashMap<K, V>>,
    writer: Mutex<()>,
}

impl<K, V> SnapshotMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub(crate) fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(HashMap::new()),
            writer: Mutex::new(()),
        }
    }

    pub(crate) fn get(&self, key: &K) -> Option<V> {
        self.current.load().get(key).cloned()
    }

    pub(crate) fn contains(&self, key: &K) -> bool {
        self.current.load().contains_key(key)
    }

    /// Apply `edit` to a copy of the current map and publish the copy.
    ///
    /// `edit` sees the latest published state (writers are serialized) and
    /// returns whether it changed anything; an error or `false` publishes
    /// nothing.
    pub(crate) fn update<E>(
        &self,
        edit: impl FnOnce(&mut HashMap<K, V>) -> Result<bool, E>,
    ) -> Result<(), E> {
        let _writer = self.writer.lock();
        let mut next = HashMap::clone(&self.current.load());
        if edit(&mut next)? {
            self.current.store(Arc::new(next));
        }
        Ok(())
    }

    /// Apply `edit` to a copy of the current map and publish the copy with a
    /// compare-and-swap, retrying on a fresh copy if another writer got there
    /// first.
    ///
    /// `edit` may run more than once, so it must only add entries it would
    /// add again. Must not be mixed with [`update`](Self::update) on the
    /// same map. Returns whether anything was published.
    pub(crate) fn fill(&self, mut edit: impl FnMut(&mut HashMap<K, V>) -> bool) -> bool {
        let mut changed = false;
        self.current.rcu(|current| {
            let mut next = HashMap::clone(current);
            changed = edit(&mut next);
            if changed { Arc::new(next) } else { Arc::clone(current) }
        });
        changed
    }
}
