use thiserror::Error;

/// Errors returned when building or operating on a ShardMap.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// No hash function was configured for shard routing.
    #[error("a hash function is required for shard routing")]
    MissingHasher,
    /// The replica count is invalid (must be a power of two and greater than 0).
    #[error("replica count must be a power of two and greater than 0")]
    InvalidReplicaCount,
    /// The group count is invalid (must be greater than 0).
    #[error("group count must be greater than 0")]
    InvalidGroupCount,
    /// A shard group index outside `[0, group_count)` was requested.
    #[error("shard group {index} out of range (group count is {group_count})")]
    GroupOutOfRange {
        /// The requested group index.
        index: usize,
        /// The configured number of groups.
        group_count: usize,
    },
}
