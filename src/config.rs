use crate::error::Error;
use crate::hash::ShardHasher;
use crate::ShardMap;
use std::hash::Hash;

/// Which built-in hash function to use for shard routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashFunction {
    /// Use ahash (default, fast and well-distributed).
    #[default]
    AHash,
    /// Use 32-bit FNV-1 over the key's `Hash` output. For string keys this
    /// includes a trailing `0xff`; see [`ShardHasher::Fnv32`].
    Fnv32,
    /// Use fxhash (faster but potentially less distributed).
    #[cfg(feature = "fxhash")]
    FxHash,
}

impl HashFunction {
    pub(crate) fn into_hasher<K: Hash>(self) -> ShardHasher<K> {
        match self {
            HashFunction::AHash => ShardHasher::AHash,
            HashFunction::Fnv32 => ShardHasher::Fnv32,
            #[cfg(feature = "fxhash")]
            HashFunction::FxHash => ShardHasher::FxHash,
        }
    }
}

/// Shard layout for a ShardMap instance.
///
/// A map owns `group_count * replica_count` shards. A key hash `h` routes to
/// group `h % group_count` and, inside it, to replica `h & (replica_count - 1)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub(crate) group_count: usize,
    pub(crate) replica_count: usize,
    pub(crate) capacity_per_shard: Option<usize>,
}

impl Config {
    /// Create a new config with defaults (16 groups, 1 replica each).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of groups. Any value greater than 0.
    pub fn group_count(mut self, count: usize) -> Result<Self, Error> {
        if count == 0 {
            return Err(Error::InvalidGroupCount);
        }
        self.group_count = count;
        Ok(self)
    }

    /// Set the number of replica shards per group. Must be a power of two.
    pub fn replica_count(mut self, count: usize) -> Result<Self, Error> {
        if !count.is_power_of_two() {
            return Err(Error::InvalidReplicaCount);
        }
        self.replica_count = count;
        Ok(self)
    }

    /// Set initial capacity per shard. Omitted by default (HashMap default).
    pub fn capacity_per_shard(mut self, capacity: usize) -> Self {
        self.capacity_per_shard = Some(capacity);
        self
    }

    /// Total number of shards this layout produces.
    pub fn shard_count(&self) -> usize {
        self.group_count * self.replica_count
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.group_count == 0 {
            return Err(Error::InvalidGroupCount);
        }
        if !self.replica_count.is_power_of_two() {
            return Err(Error::InvalidReplicaCount);
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            group_count: 16,
            replica_count: 1,
            capacity_per_shard: None,
        }
    }
}

/// Builder for creating a ShardMap with custom configuration.
///
/// A hash function is mandatory: [`build`](Self::build) fails with
/// [`Error::MissingHasher`] unless [`hash_function`](Self::hash_function) or
/// [`hasher`](Self::hasher) was called.
///
/// ```rust
/// use shardkit::{HashFunction, ShardMap, ShardMapBuilder};
///
/// let map: ShardMap<String, i32> = ShardMapBuilder::new()
///     .group_count(12)?
///     .replica_count(4)?
///     .hash_function(HashFunction::AHash)
///     .build()?;
/// assert_eq!(map.shard_count(), 48);
/// # Ok::<(), shardkit::Error>(())
/// ```
pub struct ShardMapBuilder<K> {
    config: Config,
    hasher: Option<ShardHasher<K>>,
}

impl<K> ShardMapBuilder<K>
where
    K: Hash + Eq + Send + Sync,
{
    /// Create a new builder with the default layout and no hash function.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            hasher: None,
        }
    }

    /// Start from an existing layout.
    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            hasher: None,
        }
    }

    /// Set the number of groups. Any value greater than 0.
    pub fn group_count(mut self, count: usize) -> Result<Self, Error> {
        self.config = self.config.group_count(count)?;
        Ok(self)
    }

    /// Set the number of replica shards per group. Must be a power of two.
    pub fn replica_count(mut self, count: usize) -> Result<Self, Error> {
        self.config = self.config.replica_count(count)?;
        Ok(self)
    }

    /// Set initial capacity per shard.
    pub fn capacity_per_shard(mut self, capacity: usize) -> Self {
        self.config = self.config.capacity_per_shard(capacity);
        self
    }

    /// Route with one of the built-in hash functions.
    pub fn hash_function(mut self, hash_fn: HashFunction) -> Self {
        self.hasher = Some(hash_fn.into_hasher());
        self
    }

    /// Route with a caller-provided hash. Must be pure: the same key must
    /// always produce the same value.
    pub fn hasher<F>(mut self, f: F) -> Self
    where
        F: Fn(&K) -> u32 + Send + Sync + 'static,
    {
        self.hasher = Some(ShardHasher::Custom(Box::new(f)));
        self
    }

    /// Build a ShardMap with the configured settings.
    pub fn build<V>(self) -> Result<ShardMap<K, V>, Error>
    where
        V: Send + Sync,
    {
        let hasher = self.hasher.ok_or(Error::MissingHasher)?;
        ShardMap::with_config(self.config, hasher)
    }
}

impl<K> Default for ShardMapBuilder<K>
where
    K: Hash + Eq + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.group_count, 16);
        assert_eq!(config.replica_count, 1);
        assert_eq!(config.shard_count(), 16);
    }

    #[test]
    fn group_count_need_not_be_power_of_two() {
        let config = Config::new().group_count(7).unwrap();
        assert_eq!(config.shard_count(), 7);
        assert_eq!(Config::new().group_count(0), Err(Error::InvalidGroupCount));
    }

    #[test]
    fn replica_count_must_be_power_of_two() {
        assert_eq!(Config::new().replica_count(3), Err(Error::InvalidReplicaCount));
        assert_eq!(Config::new().replica_count(0), Err(Error::InvalidReplicaCount));
        let config = Config::new().replica_count(8).unwrap();
        assert_eq!(config.shard_count(), 128);
    }
}
