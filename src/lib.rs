//! # shardkit
//!
//! Concurrent collection primitives for services that push a lot of traffic
//! through shared state.
//!
//! - [`ShardMap`]: a map split into independently locked shards, arranged as
//!   groups of replicas, so writers on different shards never contend.
//! - [`LockFreeSet`]: a sorted set built on a lock-free linked list.
//! - [`LockFreeQueue`]: an unbounded lock-free FIFO queue.
//! - [`EventBuffer`]: a non-blocking "latest value" or "ordered backlog"
//!   notification buffer with a pull-based delivery protocol.
//!
//! The four are independent of each other. The lock-free structures reclaim
//! memory with epoch-based reclamation, so a removed node is freed only after
//! no thread can still be reading it.
//!
//! ## Example
//!
//! ```rust
//! use shardkit::ShardMap;
//!
//! let map = ShardMap::new();
//!
//! map.insert("key1", 1);
//! assert!(!map.insert_if_absent("key1", 5));
//!
//! // Combine with the stored value under the shard lock.
//! let total = map.upsert("key1", 2, |old, new| old.copied().unwrap_or(0) + new);
//! assert_eq!(*total, 3);
//!
//! assert_eq!(map.pop(&"key1").as_deref(), Some(&3));
//! assert!(map.is_empty());
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use shardkit::{HashFunction, ShardMap, ShardMapBuilder};
//!
//! let map: ShardMap<String, i32> = ShardMapBuilder::new()
//!     .group_count(10)?
//!     .replica_count(4)? // Must be power of two
//!     .hash_function(HashFunction::Fnv32)
//!     .build()?;
//! assert_eq!(map.shard_count(), 40);
//! # Ok::<(), shardkit::Error>(())
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

/// Configuration and builder types.
pub mod config;
/// Error types.
pub mod error;
/// Pull-based event buffer.
pub mod event;
/// Hash function implementations.
pub mod hash;
/// Iterator implementations.
pub mod iter;
/// Lock-free FIFO queue.
pub mod queue;
/// Lock-free ordered set.
pub mod set;
/// Internal shard implementation.
mod shard;
/// Main ShardMap implementation.
pub mod shardmap;
/// Statistics and metrics collection.
pub mod stats;

// Re-export main types
pub use config::{Config, HashFunction, ShardMapBuilder};
pub use error::Error;
pub use event::{EventBuffer, EventMode};
pub use hash::ShardHasher;
pub use queue::LockFreeQueue;
pub use set::LockFreeSet;
pub use shardmap::ShardMap;
pub use stats::{ShardOps, Stats};
