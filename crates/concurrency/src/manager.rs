//! Transactional batch executor
//!
//! Executes a batch atomically against one logical partition:
//!
//! ```text
//! 1. Reject empty or oversized batches
//! 2. Check every document's partition key against the batch key
//! 3. Write-lock the owning physical partition
//! 4. Allocate the commit version
//! 5. Validate every operation in order against a staged overlay
//! 6. IF any operation fails: apply nothing
//! 7. Claim ids new to the container; IF one was taken meanwhile by
//!    another partition: release the claims, apply nothing
//! 8. ELSE apply every staged write with the commit version
//! 9. Release the partition lock
//! ```
//!
//! The partition lock is held from step 3 to step 9, so readers of the
//! partition observe either none or all of a batch's writes. Ids are only
//! claimed once the batch is known to commit, so writers in other
//! partitions never see ids of a rejected batch. A rejected batch consumes
//! its version number; versions may have gaps.

use partdb_core::{Error, PartitionKey, PartitionKeyPath, Result};
use partdb_storage::PartitionStore;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

use crate::transaction::{BatchOperation, BatchOutcome, OperationResult};
use crate::validation::StagedPartition;

/// Default upper bound on operations per batch
pub const DEFAULT_MAX_BATCH_OPERATIONS: usize = 100;

/// Executes transactional batches and keeps commit statistics
#[derive(Debug)]
pub struct BatchExecutor {
    max_operations: usize,
    committed: AtomicU64,
    rejected: AtomicU64,
}

impl Default for BatchExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BATCH_OPERATIONS)
    }
}

impl BatchExecutor {
    /// Create an executor accepting at most `max_operations` per batch
    pub fn new(max_operations: usize) -> Self {
        BatchExecutor {
            max_operations: max_operations.max(1),
            committed: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    /// Maximum operations per batch
    pub fn max_operations(&self) -> usize {
        self.max_operations
    }

    /// Batches committed so far
    pub fn committed_count(&self) -> u64 {
        self.committed.load(Ordering::Relaxed)
    }

    /// Batches rejected by validation so far
    pub fn rejected_count(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Execute `operations` atomically in the logical partition `key`
    ///
    /// # Returns
    /// - `Ok(outcome)` whether the batch committed or was rejected by
    ///   validation; `outcome.failure` tells them apart
    /// - `Err(InvalidOperation)` for an empty or oversized batch
    /// - `Err(PartitionKeyMismatch)` if a document belongs to another key
    /// - `Err(InvalidDocument)` if a document has no usable partition key
    pub fn execute(
        &self,
        store: &PartitionStore,
        key: &PartitionKey,
        key_path: &PartitionKeyPath,
        operations: &[BatchOperation],
    ) -> Result<BatchOutcome> {
        self.check(key, key_path, operations)?;

        let partition = store.partition_or_create(store.locate(key));
        let mut guard = partition.write();

        let version = store.next_version();
        let mut staged = StagedPartition::new(&guard, store.id_index(), key, version);
        let mut results = Vec::with_capacity(operations.len());
        let mut first_failure: Option<(usize, String)> = None;

        for (index, op) in operations.iter().enumerate() {
            let result = staged.validate(op).map_err(|e| {
                warn!(target: "partdb::batch", partition_key = %key, error = %e, "Batch aborted");
                e
            })?;
            if first_failure.is_none() && !result.is_success() {
                first_failure = Some((index, failure_reason(&result)));
            }
            results.push(result);
        }

        if first_failure.is_none() {
            if let Some((index, result)) = staged.claim_ids() {
                first_failure = Some((index, failure_reason(&result)));
                results[index] = result;
            }
        }

        if let Some((operation_index, reason)) = first_failure {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            debug!(
                target: "partdb::batch",
                partition_key = %key,
                operation_index,
                reason = %reason,
                "Batch rejected"
            );
            return Ok(rejected_outcome(results, operation_index, reason));
        }

        let writes = staged.into_writes();
        let write_count = writes.len();
        for (id, state) in writes {
            match state {
                Some(stored) => {
                    guard.upsert(stored);
                }
                None => {
                    guard.remove(key, &id);
                    store.id_index().release(&id, key);
                }
            }
        }
        drop(guard);

        self.committed.fetch_add(1, Ordering::Relaxed);
        debug!(
            target: "partdb::batch",
            partition_key = %key,
            version,
            operations = operations.len(),
            writes = write_count,
            "Batch committed"
        );

        Ok(BatchOutcome {
            results,
            commit_version: Some(version),
            failure: None,
        })
    }

    /// Checks that need no lock: batch size and partition keys
    ///
    /// `execute` runs these itself; callers may run them earlier, e.g.
    /// before charging the batch.
    pub fn check(
        &self,
        key: &PartitionKey,
        key_path: &PartitionKeyPath,
        operations: &[BatchOperation],
    ) -> Result<()> {
        if operations.is_empty() {
            return Err(Error::invalid_operation("batch has no operations"));
        }
        if operations.len() > self.max_operations {
            return Err(Error::invalid_operation(format!(
                "batch has {} operations, limit is {}",
                operations.len(),
                self.max_operations
            )));
        }
        check_partition_keys(key, key_path, operations)
    }
}

/// Every document in the batch must carry the batch's partition key
fn check_partition_keys(
    key: &PartitionKey,
    key_path: &PartitionKeyPath,
    operations: &[BatchOperation],
) -> Result<()> {
    for doc in operations.iter().filter_map(BatchOperation::document) {
        let actual = key_path.extract(doc)?;
        if &actual != key {
            return Err(Error::PartitionKeyMismatch {
                expected: key.to_string(),
                actual: actual.to_string(),
            });
        }
    }
    Ok(())
}

fn failure_reason(result: &OperationResult) -> String {
    result
        .reason
        .clone()
        .unwrap_or_else(|| result.status.to_string())
}

/// Results for a rejected batch
///
/// Operations that validated are reported `NotApplied` with the resource
/// they would have written; failing ones keep their own status.
fn rejected_outcome(
    results: Vec<OperationResult>,
    operation_index: usize,
    reason: String,
) -> BatchOutcome {
    BatchOutcome {
        results: results
            .into_iter()
            .map(OperationResult::not_applied)
            .collect(),
        commit_version: None,
        failure: Some(Error::ValidationFailed {
            operation_index,
            reason,
        }),
    }
}
