//! Partition routing
//!
//! Maps a partition-key value to one of a fixed number of physical
//! partitions by hashing the value with xxh3. The partition count is fixed
//! when a container is created, so a given key value resolves to the same
//! physical partition for the container's lifetime. Several key values may
//! share a physical partition; callers must not assume a 1:1 mapping.

use partdb_core::PartitionKey;
use std::fmt;
use xxhash_rust::xxh3::xxh3_64;

/// Identifier of a physical partition within a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartitionId(u32);

impl PartitionId {
    /// Wrap a raw partition index
    pub const fn new(index: u32) -> Self {
        PartitionId(index)
    }

    /// Raw partition index
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

/// Deterministic key-value → partition mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionRouter {
    partition_count: u32,
}

impl PartitionRouter {
    /// Create a router over `partition_count` physical partitions (minimum 1)
    pub fn new(partition_count: u32) -> Self {
        PartitionRouter {
            partition_count: partition_count.max(1),
        }
    }

    /// Number of physical partitions
    pub fn partition_count(&self) -> u32 {
        self.partition_count
    }

    /// Physical partition owning `key`
    ///
    /// Pure function of the key bytes and the partition count.
    #[inline]
    pub fn locate(&self, key: &PartitionKey) -> PartitionId {
        let hash = xxh3_64(key.as_bytes());
        PartitionId((hash % u64::from(self.partition_count)) as u32)
    }
}
