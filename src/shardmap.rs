use crate::config::Config;
use crate::error::Error;
use crate::hash::ShardHasher;
use crate::iter::{ConcurrentIter, SnapshotIter};
use crate::shard::Shard;
use crate::stats::{ShardOps, Stats};
use std::hash::Hash;
use std::sync::Arc;
use tracing::debug;

/// Concurrent map split into independently locked shards.
///
/// Shards are arranged as `group_count` groups of `replica_count` replicas.
/// A key's 32-bit hash `h` picks group `h % group_count` and replica
/// `h & (replica_count - 1)` inside it, so operations on keys in different
/// shards never block each other. Values are wrapped in `Arc<V>` so reads can
/// share them without copying.
///
/// Aggregates such as [`len`](Self::len) visit the shards one lock at a time
/// and are not atomic across the whole map.
///
/// # Example
///
/// ```rust
/// use shardkit::ShardMap;
///
/// let map = ShardMap::new();
/// map.insert("key1", "value1");
///
/// if let Some(value) = map.get(&"key1") {
///     println!("Found: {}", *value);
/// }
/// ```
pub struct ShardMap<K, V> {
    shards: Vec<Shard<K, V>>,
    group_count: usize,
    replica_count: usize,
    replica_mask: usize,
    hasher: ShardHasher<K>,
}

impl<K, V> ShardMap<K, V>
where
    K: Hash + Eq + Send + Sync,
    V: Send + Sync,
{
    /// Create a new map with defaults (16 groups, 1 replica, ahash).
    ///
    /// Unlike [`ShardMapBuilder::build`](crate::ShardMapBuilder::build),
    /// this does not require a hash function to be chosen: it always routes
    /// with AHash. Use the builder to pick the routing hash explicitly.
    pub fn new() -> Self {
        Self::from_parts(Config::default(), ShardHasher::AHash)
    }

    /// Create a new map from a layout and a routing hash.
    pub fn with_config(config: Config, hasher: ShardHasher<K>) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self::from_parts(config, hasher))
    }

    fn from_parts(config: Config, hasher: ShardHasher<K>) -> Self {
        let group_count = config.group_count;
        let replica_count = config.replica_count;
        let shards = (0..config.shard_count())
            .map(|_| Shard::new(config.capacity_per_shard))
            .collect();
        debug!(group_count, replica_count, ?hasher, "shard map created");
        Self {
            shards,
            group_count,
            replica_count,
            replica_mask: replica_count - 1,
            hasher,
        }
    }

    /// Index of the shard that owns `key`.
    ///
    /// Pure in the key and the map layout: repeated calls always agree.
    #[inline]
    pub fn shard_index(&self, key: &K) -> usize {
        let hash = self.hasher.hash_key(key) as usize;
        (hash % self.group_count) * self.replica_count + (hash & self.replica_mask)
    }

    #[inline]
    fn shard(&self, key: &K) -> &Shard<K, V> {
        &self.shards[self.shard_index(key)]
    }

    /// Total number of shards (`group_count * replica_count`).
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Number of shard groups.
    pub fn group_count(&self) -> usize {
        self.group_count
    }

    /// Number of replica shards per group.
    pub fn replica_count(&self) -> usize {
        self.replica_count
    }

    /// Insert a key-value pair. Returns the old value if the key existed.
    ///
    /// # Example
    ///
    /// ```rust
    /// use shardkit::ShardMap;
    ///
    /// let map = ShardMap::new();
    /// assert!(map.insert("key", "value").is_none());
    /// assert_eq!(map.insert("key", "new_value").unwrap().as_ref(), &"value");
    /// ```
    pub fn insert(&self, key: K, value: V) -> Option<Arc<V>> {
        self.shard(&key).insert(key, value)
    }

    /// Insert every pair from `entries`, locking each target shard per entry.
    pub fn insert_many<I>(&self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
    {
        for (key, value) in entries {
            self.insert(key, value);
        }
    }

    /// Insert only if no value is associated with `key`.
    ///
    /// Returns `true` if the value was inserted.
    pub fn insert_if_absent(&self, key: K, value: V) -> bool {
        self.shard(&key).insert_if_absent(key, value)
    }

    /// Insert or update `key` through `combine`, returning the stored value.
    ///
    /// `combine` receives the current value (`None` if the key is vacant) and
    /// `value`, and returns what gets stored.
    ///
    /// `combine` runs while the shard's write lock is held. It must not call
    /// back into this map, for any key: the lock is not reentrant and doing
    /// so deadlocks.
    ///
    /// # Example
    ///
    /// ```rust
    /// use shardkit::ShardMap;
    ///
    /// let map = ShardMap::new();
    /// let add = |old: Option<&u64>, new: u64| old.copied().unwrap_or(0) + new;
    /// assert_eq!(*map.upsert("hits", 1, add), 1);
    /// assert_eq!(*map.upsert("hits", 2, add), 3);
    /// ```
    pub fn upsert<F>(&self, key: K, value: V, combine: F) -> Arc<V>
    where
        F: FnOnce(Option<&V>, V) -> V,
    {
        self.shard(&key).upsert(key, value, combine)
    }

    /// Update a value using a closure, returning the new value if the key existed.
    ///
    /// This requires `V: Clone` because if the value is shared (multiple
    /// `Arc` references exist), it is cloned before being modified.
    ///
    /// # Example
    ///
    /// ```rust
    /// use shardkit::ShardMap;
    ///
    /// let map = ShardMap::new();
    /// map.insert("counter", 0);
    ///
    /// map.update(&"counter", |v| *v += 1);
    /// assert_eq!(*map.get(&"counter").unwrap(), 1);
    /// ```
    pub fn update<F>(&self, key: &K, f: F) -> Option<Arc<V>>
    where
        F: FnOnce(&mut V),
        V: Clone,
    {
        self.shard(key).update(key, f)
    }

    /// Get a value by key. Returns an `Arc<V>` so you can share it without copying.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.shard(key).get(key)
    }

    /// Check whether `key` is present.
    pub fn contains_key(&self, key: &K) -> bool {
        self.shard(key).contains_key(key)
    }

    /// Remove `key`. Returns whether it was present.
    pub fn remove(&self, key: &K) -> bool {
        self.shard(key).remove(key).is_some()
    }

    /// Remove `key` and return its value, if it existed.
    pub fn pop(&self, key: &K) -> Option<Arc<V>> {
        self.shard(key).remove(key)
    }

    /// Let `predicate` decide whether to remove `key`, and return its decision.
    ///
    /// `predicate` receives the key and its current value (`None` if absent).
    /// The entry is removed only if it exists and the predicate returns
    /// `true`; the return value is the predicate's answer either way, so a
    /// `true` result does not by itself mean something was removed.
    ///
    /// Like [`upsert`](Self::upsert), the predicate runs under the shard's
    /// write lock and must not touch this map.
    pub fn remove_if<F>(&self, key: &K, predicate: F) -> bool
    where
        F: FnOnce(&K, Option<&V>) -> bool,
    {
        self.shard(key).remove_if(key, predicate)
    }

    /// Empty every replica shard of group `group`.
    ///
    /// Replicas are locked and cleared one after another, not all at once.
    pub fn clear_group(&self, group: usize) -> Result<(), Error> {
        if group >= self.group_count {
            return Err(Error::GroupOutOfRange {
                index: group,
                group_count: self.group_count,
            });
        }
        let start = group * self.replica_count;
        for shard in &self.shards[start..start + self.replica_count] {
            shard.clear();
        }
        debug!(group, "cleared shard group");
        Ok(())
    }

    /// Empty every shard.
    pub fn clear(&self) {
        for shard in &self.shards {
            shard.clear();
        }
        debug!(shards = self.shards.len(), "cleared all shards");
    }

    /// Get the total number of entries across all shards.
    ///
    /// Takes each shard's read lock in turn, so the result is best-effort
    /// while other threads are writing.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.len()).sum()
    }

    /// Check if the map is empty. Same caveats as [`len`](Self::len).
    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|shard| shard.is_empty())
    }

    /// Number of entries in each shard, in shard-index order.
    pub fn shard_loads(&self) -> Vec<usize> {
        self.shards.iter().map(|shard| shard.len()).collect()
    }

    /// Get detailed statistics about the map and its shards.
    pub fn stats(&self) -> Stats {
        let shard_sizes = self.shard_loads();
        let operations: Vec<ShardOps> = self.shards.iter().map(|s| s.stats()).collect();
        Stats {
            size: shard_sizes.iter().sum(),
            group_count: self.group_count,
            replica_count: self.replica_count,
            shard_sizes,
            operations,
        }
    }

    /// Create a snapshot-based iterator over all key-value pairs.
    ///
    /// # Example
    ///
    /// ```rust
    /// use shardkit::ShardMap;
    ///
    /// let map = ShardMap::new();
    /// map.insert("key1", "value1");
    /// map.insert("key2", "value2");
    /// assert_eq!(map.iter_snapshot().count(), 2);
    /// ```
    pub fn iter_snapshot(&self) -> SnapshotIter<K, V>
    where
        K: Clone,
    {
        SnapshotIter::new(&self.shards)
    }

    /// Create an iterator that copies one shard at a time as it advances.
    pub fn iter_concurrent(&self) -> ConcurrentIter<'_, K, V>
    where
        K: Clone,
    {
        ConcurrentIter::new(&self.shards)
    }
}

impl<K, V> Default for ShardMap<K, V>
where
    K: Hash + Eq + Send + Sync,
    V: Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> std::fmt::Debug for ShardMap<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardMap")
            .field("group_count", &self.group_count)
            .field("replica_count", &self.replica_count)
            .field("hasher", &self.hasher)
            .finish_non_exhaustive()
    }
}
