use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use super::lock;

struct Counts<K> {
    epoch: u64,
    counts: HashMap<K, usize>,
}

/// Per-key loading flags.
///
/// A key reads as loading while at least one [`LoadingGuard`] for it is
/// alive. Guards clear their share on drop, so every exit path of a fetch
/// (success, error, panic, cancellation) releases the flag. Guards taken
/// before a [`clear`](Self::clear) no longer count.
pub struct LoadingSet<K> {
    inner: Arc<Mutex<Counts<K>>>,
}

impl<K> Clone for LoadingSet<K> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K: Eq + Hash> Default for LoadingSet<K> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Counts {
                epoch: 0,
                counts: HashMap::new(),
            })),
        }
    }
}

impl<K: Eq + Hash + Clone> LoadingSet<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `key` as loading until the returned guard is dropped.
    pub fn acquire(&self, key: K) -> LoadingGuard<K> {
        let mut inner = lock(&self.inner);
        *inner.counts.entry(key.clone()).or_insert(0) += 1;
        LoadingGuard {
            set: self.clone(),
            key: Some(key),
            epoch: inner.epoch,
        }
    }

    pub fn is_loading<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        lock(&self.inner)
            .counts
            .get(key)
            .is_some_and(|count| *count > 0)
    }

    pub fn any(&self) -> bool {
        !lock(&self.inner).counts.is_empty()
    }

    /// Force the flag for `key` without a guard. `false` drops any
    /// outstanding share as well.
    pub fn set(&self, key: K, loading: bool) {
        let mut inner = lock(&self.inner);
        let counts = &mut inner.counts;
        if loading {
            let count = counts.entry(key).or_insert(0);
            *count = (*count).max(1);
        } else {
            counts.remove(&key);
        }
    }

    pub fn clear(&self) {
        let mut inner = lock(&self.inner);
        inner.epoch += 1;
        inner.counts.clear();
    }

    fn release(&self, key: &K, epoch: u64) {
        let mut inner = lock(&self.inner);
        if inner.epoch != epoch {
            return;
        }
        if let Some(count) = inner.counts.get_mut(key) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                inner.counts.remove(key);
            }
        }
    }
}

pub struct LoadingGuard<K: Eq + Hash + Clone> {
    set: LoadingSet<K>,
    key: Option<K>,
    epoch: u64,
}

impl<K: Eq + Hash + Clone> Drop for LoadingGuard<K> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.set.release(&key, self.epoch);
        }
    }
}
