use crate::stats::{Op, ShardOps, ShardStats};
use hashbrown::HashMap;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::hash::Hash;
use std::sync::Arc;

type Table<K, V> = HashMap<K, Arc<V>>;

/// A single shard containing a HashMap protected by a read-write lock.
///
/// Callbacks passed to [`upsert`](Self::upsert) and
/// [`remove_if`](Self::remove_if) run under the write lock, which is not
/// reentrant.
pub(crate) struct Shard<K, V> {
    map: RwLock<Table<K, V>>,
    capacity: usize,
    stats: ShardStats,
}

impl<K, V> Shard<K, V> {
    /// Shared access to the table, for iteration and aggregation.
    #[inline]
    pub fn read_lock(&self) -> RwLockReadGuard<'_, Table<K, V>> {
        self.map.read()
    }
}

impl<K, V> Shard<K, V>
where
    K: Hash + Eq + Send + Sync,
    V: Send + Sync,
{
    pub fn new(capacity: Option<usize>) -> Self {
        let capacity = capacity.unwrap_or(0);
        Self {
            map: RwLock::new(HashMap::with_capacity(capacity)),
            capacity,
            stats: ShardStats::new(),
        }
    }

    #[inline]
    fn write(&self) -> RwLockWriteGuard<'_, Table<K, V>> {
        #[cfg(feature = "lock-timing")]
        let start = std::time::Instant::now();
        let guard = self.map.write();
        self.stats.record(Op::LockAcquired);
        #[cfg(feature = "lock-timing")]
        self.stats.record_lock_wait(start.elapsed().as_nanos() as u64);
        guard
    }

    /// Insert a key-value pair, returning the previous value if any.
    pub fn insert(&self, key: K, value: V) -> Option<Arc<V>> {
        let result = self.write().insert(key, Arc::new(value));
        self.stats.record(Op::Write);
        result
    }

    /// Insert only if the key is vacant. Returns whether the value went in.
    pub fn insert_if_absent(&self, key: K, value: V) -> bool {
        let mut map = self.write();
        if map.contains_key(&key) {
            return false;
        }
        map.insert(key, Arc::new(value));
        self.stats.record(Op::Write);
        true
    }

    /// Combine the current value (if any) with `value` and store the result.
    pub fn upsert<F>(&self, key: K, value: V, combine: F) -> Arc<V>
    where
        F: FnOnce(Option<&V>, V) -> V,
    {
        let mut map = self.write();
        let combined = Arc::new(combine(map.get(&key).map(Arc::as_ref), value));
        map.insert(key, Arc::clone(&combined));
        self.stats.record(Op::Write);
        combined
    }

    /// Update a value using a closure, returning the new value if the key existed.
    ///
    /// If the value is shared (other `Arc` handles are alive), it is cloned
    /// before modification so existing readers keep the old value.
    pub fn update<F>(&self, key: &K, f: F) -> Option<Arc<V>>
    where
        F: FnOnce(&mut V),
        V: Clone,
    {
        let mut map = self.write();
        let arc_value = map.get_mut(key)?;
        f(Arc::make_mut(arc_value));
        self.stats.record(Op::Write);
        Some(Arc::clone(arc_value))
    }

    /// Get a value by key, returning an Arc to enable zero-copy access.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        let result = self.read_lock().get(key).cloned();
        if result.is_some() {
            self.stats.record(Op::Read);
        }
        result
    }

    /// Check if a key exists without cloning the value.
    pub fn contains_key(&self, key: &K) -> bool {
        self.read_lock().contains_key(key)
    }

    /// Remove a key-value pair, returning the value if it existed.
    pub fn remove(&self, key: &K) -> Option<Arc<V>> {
        let result = self.write().remove(key);
        if result.is_some() {
            self.stats.record(Op::Remove);
        }
        result
    }

    /// Ask `predicate` whether to remove `key`; returns its answer.
    ///
    /// The entry is only removed when it exists and the predicate agrees.
    pub fn remove_if<F>(&self, key: &K, predicate: F) -> bool
    where
        F: FnOnce(&K, Option<&V>) -> bool,
    {
        let mut map = self.write();
        let remove = predicate(key, map.get(key).map(Arc::as_ref));
        if remove && map.remove(key).is_some() {
            self.stats.record(Op::Remove);
        }
        remove
    }

    /// Replace the contents with an empty table.
    pub fn clear(&self) {
        *self.write() = HashMap::with_capacity(self.capacity);
        self.stats.record(Op::Clear);
    }

    /// Get the number of entries in this shard.
    pub fn len(&self) -> usize {
        self.read_lock().len()
    }

    /// Check if this shard is empty.
    pub fn is_empty(&self) -> bool {
        self.read_lock().is_empty()
    }

    /// Get a snapshot of statistics for this shard.
    pub fn stats(&self) -> ShardOps {
        self.stats.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_sees_previous_value() {
        let shard: Shard<&str, i32> = Shard::new(None);
        let first = shard.upsert("k", 5, |old, new| {
            assert!(old.is_none());
            new
        });
        assert_eq!(*first, 5);
        let second = shard.upsert("k", 3, |old, new| old.copied().unwrap_or(0) + new);
        assert_eq!(*second, 8);
    }

    #[test]
    fn remove_if_reports_predicate_even_when_absent() {
        let shard: Shard<&str, i32> = Shard::new(None);
        assert!(shard.remove_if(&"missing", |_, v| v.is_none()));
        shard.insert("k", 1);
        assert!(!shard.remove_if(&"k", |_, v| v == Some(&2)));
        assert!(shard.contains_key(&"k"));
        assert!(shard.remove_if(&"k", |_, v| v == Some(&1)));
        assert!(!shard.contains_key(&"k"));
    }

    #[test]
    fn clear_empties_shard() {
        let shard: Shard<i32, i32> = Shard::new(Some(8));
        for i in 0..8 {
            shard.insert(i, i);
        }
        shard.clear();
        assert!(shard.is_empty());
        assert_eq!(shard.len(), 0);
    }
}
