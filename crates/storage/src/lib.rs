//! Storage layer for PartDB
//!
//! This crate implements per-container document storage with:
//! - PartitionRouter: deterministic key value → physical partition mapping
//! - Partition: logical partitions keyed by partition-key value
//! - PartitionStore: DashMap of partitions, each behind its own RwLock
//! - IdIndex: container-wide id uniqueness across partitions
//! - StoredDocument: document plus version and write timestamp
//!
//! # Concurrency
//!
//! - Reads take a shared lock on one partition
//! - Writes take an exclusive lock on one partition
//! - Different partitions never contend

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod index;
pub mod partition;
pub mod router;
pub mod sharded;
pub mod stored_value;

pub use index::{Claim, IdIndex};
pub use partition::{LogicalPartition, Partition};
pub use router::{PartitionId, PartitionRouter};
pub use sharded::{PartitionHandle, PartitionStore};
pub use stored_value::StoredDocument;
