//! Per-shard operation counters and map-wide statistics.

#[cfg(feature = "metrics")]
use std::sync::atomic::{AtomicU64, Ordering};

/// Operation counts for one shard, as of the moment they were read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShardOps {
    /// Number of successful reads on this shard.
    pub reads: u64,
    /// Number of writes (inserts, upserts, updates) on this shard.
    pub writes: u64,
    /// Number of entries removed from this shard.
    pub removes: u64,
    /// Number of times this shard was cleared.
    pub clears: u64,
    /// Number of write-lock acquisitions (0 when metrics feature disabled).
    pub lock_acquisitions: u64,
    /// Cumulative write-lock wait time in nanoseconds (0 when lock-timing disabled).
    pub lock_wait_nanos: u64,
}

/// Operation kinds counted per shard.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Op {
    Read,
    Write,
    Remove,
    Clear,
    LockAcquired,
}

/// Counters for one shard, indexed by [`Op`].
#[cfg(feature = "metrics")]
pub(crate) struct ShardStats {
    counts: [AtomicU64; 5],
    #[cfg(feature = "lock-timing")]
    lock_wait_nanos: AtomicU64,
}

#[cfg(feature = "metrics")]
impl ShardStats {
    pub fn new() -> Self {
        Self {
            counts: Default::default(),
            #[cfg(feature = "lock-timing")]
            lock_wait_nanos: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record(&self, op: Op) {
        self.counts[op as usize].fetch_add(1, Ordering::Relaxed);
    }

    #[cfg(feature = "lock-timing")]
    #[inline]
    pub fn record_lock_wait(&self, nanos: u64) {
        self.lock_wait_nanos.fetch_add(nanos, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ShardOps {
        let count = |op: Op| self.counts[op as usize].load(Ordering::Relaxed);
        ShardOps {
            reads: count(Op::Read),
            writes: count(Op::Write),
            removes: count(Op::Remove),
            clears: count(Op::Clear),
            lock_acquisitions: count(Op::LockAcquired),
            #[cfg(feature = "lock-timing")]
            lock_wait_nanos: self.lock_wait_nanos.load(Ordering::Relaxed),
            #[cfg(not(feature = "lock-timing"))]
            lock_wait_nanos: 0,
        }
    }
}

/// Without `metrics` nothing is counted and snapshots are all zero.
#[cfg(not(feature = "metrics"))]
pub(crate) struct ShardStats;

#[cfg(not(feature = "metrics"))]
impl ShardStats {
    pub fn new() -> Self {
        ShardStats
    }

    #[inline]
    pub fn record(&self, _op: Op) {}

    pub fn snapshot(&self) -> ShardOps {
        ShardOps::default()
    }
}

/// Point-in-time view of a map's layout, occupancy and per-shard counters.
///
/// Each shard is read under its own lock in turn, so under concurrent writes
/// the numbers are a best-effort view rather than an atomic snapshot.
#[derive(Debug, Clone)]
pub struct Stats {
    /// Sum of `shard_sizes`.
    pub size: usize,
    /// Number of shard groups.
    pub group_count: usize,
    /// Number of replica shards per group.
    pub replica_count: usize,
    /// Number of entries in each shard, in shard-index order.
    pub shard_sizes: Vec<usize>,
    /// Operation counts for each shard (all zero when metrics disabled).
    pub operations: Vec<ShardOps>,
}

impl Stats {
    /// Number of entries in each group (sum over its replicas).
    pub fn group_sizes(&self) -> Vec<usize> {
        self.shard_sizes
            .chunks(self.replica_count)
            .map(|replicas| replicas.iter().sum())
            .collect()
    }

    /// Largest shard size divided by the average shard size.
    ///
    /// 1.0 is a perfectly even spread; 0.0 for an empty map.
    pub fn max_load_ratio(&self) -> f64 {
        if self.size == 0 || self.shard_sizes.is_empty() {
            return 0.0;
        }
        let avg = self.size as f64 / self.shard_sizes.len() as f64;
        let max = self.shard_sizes.iter().copied().max().unwrap_or(0);
        max as f64 / avg
    }
}
