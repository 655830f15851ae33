use std::hash::{Hash, Hasher};

/// Signature of a user-supplied routing hash.
pub type HashFn<K> = dyn Fn(&K) -> u32 + Send + Sync;

/// Hash function used to route keys to shards.
///
/// Built-in variants hash through [`std::hash::Hash`]; `Custom` lets callers
/// route on any key-derived `u32`. Uses an enum to avoid trait object
/// limitations with generics.
pub enum ShardHasher<K> {
    /// AHash with fixed keys (default, fast and well-distributed).
    AHash,
    /// 32-bit FNV-1 over the bytes the key feeds to its `Hash` impl.
    ///
    /// `str` and `String` append a `0xff` terminator when hashed, so this is
    /// not [`fnv32`] of the raw string bytes. Route string keys with
    /// `hasher(|k: &String| fnv32(k.as_bytes()))` when that exact value matters.
    Fnv32,
    /// FxHash implementation (faster but potentially less distributed).
    #[cfg(feature = "fxhash")]
    FxHash,
    /// Caller-provided routing hash.
    Custom(Box<HashFn<K>>),
}

impl<K: Hash> ShardHasher<K> {
    /// Hash a key to the 32-bit value used for shard routing.
    ///
    /// The result depends only on the key, so a key always lands on the same
    /// shard for the lifetime of a map.
    #[inline]
    pub fn hash_key(&self, key: &K) -> u32 {
        match self {
            ShardHasher::AHash => {
                let mut hasher = ahash::AHasher::default();
                key.hash(&mut hasher);
                fold(hasher.finish())
            }
            ShardHasher::Fnv32 => {
                let mut hasher = Fnv32Hasher::default();
                key.hash(&mut hasher);
                hasher.hash
            }
            #[cfg(feature = "fxhash")]
            ShardHasher::FxHash => {
                let mut hasher = fxhash::FxHasher::default();
                key.hash(&mut hasher);
                fold(hasher.finish())
            }
            ShardHasher::Custom(f) => f(key),
        }
    }
}

impl<K> std::fmt::Debug for ShardHasher<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShardHasher::AHash => write!(f, "ShardHasher::AHash"),
            ShardHasher::Fnv32 => write!(f, "ShardHasher::Fnv32"),
            #[cfg(feature = "fxhash")]
            ShardHasher::FxHash => write!(f, "ShardHasher::FxHash"),
            ShardHasher::Custom(_) => write!(f, "ShardHasher::Custom(...)"),
        }
    }
}

/// Mix the high half in so the low bits used for replica selection see it.
#[inline]
fn fold(hash: u64) -> u32 {
    (hash ^ (hash >> 32)) as u32
}

const FNV_OFFSET_BASIS: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;

/// 32-bit FNV-1 hash of a byte string.
///
/// Handy as a `Custom` routing hash for string-like keys:
///
/// ```rust
/// use shardkit::{hash::fnv32, ShardMap, ShardMapBuilder};
///
/// let map: ShardMap<String, u32> = ShardMapBuilder::new()
///     .hasher(|k: &String| fnv32(k.as_bytes()))
///     .build()?;
/// # Ok::<(), shardkit::Error>(())
/// ```
pub fn fnv32(bytes: &[u8]) -> u32 {
    let mut hasher = Fnv32Hasher::default();
    hasher.write(bytes);
    hasher.hash
}

struct Fnv32Hasher {
    hash: u32,
}

impl Default for Fnv32Hasher {
    fn default() -> Self {
        Self {
            hash: FNV_OFFSET_BASIS,
        }
    }
}

impl Hasher for Fnv32Hasher {
    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.hash = self.hash.wrapping_mul(FNV_PRIME);
            self.hash ^= u32::from(byte);
        }
    }

    fn finish(&self) -> u64 {
        u64::from(self.hash)
    }
}
