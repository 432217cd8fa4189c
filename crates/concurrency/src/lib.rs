//! Transactional batches for PartDB
//!
//! This crate implements all-or-nothing batches scoped to one logical
//! partition:
//! - BatchOperation / OperationResult / BatchOutcome: the batch vocabulary
//! - StagedPartition: in-order validation over a staged overlay
//! - BatchExecutor: validate-then-apply under the partition write lock

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod manager;
pub mod transaction;
pub mod validation;

pub use manager::{BatchExecutor, DEFAULT_MAX_BATCH_OPERATIONS};
pub use transaction::{
    BatchOperation, BatchOutcome, OperationKind, OperationResult, OperationStatus,
};
pub use validation::{StagedPartition, StagedWrites};
