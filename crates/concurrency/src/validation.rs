//! Batch validation against a staged view of one partition
//!
//! Operations are validated in order. Each one sees the partition as the
//! earlier operations of the same batch would leave it: a `Create`
//! followed by a `Replace` of the same id validates, a `Delete` followed by
//! a `Read` does not. Staged effects live in an overlay; the partition
//! itself is not touched until the whole batch has validated.
//!
//! Rules:
//! - Create: id must not exist anywhere in the container
//! - Upsert: id must not belong to another partition-key value
//! - Replace / Delete / Read: target must exist in this logical partition
//! - `if_match`: the current version (staged or stored) must match
//!
//! Validation only reads the container id index. Ids new to the container
//! are recorded and claimed by [`StagedPartition::claim_ids`] once every
//! operation has validated, so other partitions never see ids of a batch
//! that is rejected.

use chrono::{DateTime, Utc};
use partdb_core::{Error, PartitionKey, Result};
use partdb_storage::{Claim, IdIndex, Partition, StoredDocument};
use rustc_hash::FxHashMap;

use crate::transaction::{BatchOperation, OperationKind, OperationResult, OperationStatus};

/// Final state of a document touched by the batch; `None` means deleted
pub type StagedWrites = FxHashMap<String, Option<StoredDocument>>;

/// An id the batch must claim before applying, with the operation needing it
#[derive(Debug, Clone)]
struct PendingClaim {
    operation_index: usize,
    kind: OperationKind,
    id: String,
}

/// Overlay of staged batch effects over a write-locked partition
pub struct StagedPartition<'a> {
    partition: &'a Partition,
    ids: &'a IdIndex,
    key: &'a PartitionKey,
    version: u64,
    timestamp: DateTime<Utc>,
    staged: StagedWrites,
    pending: Vec<PendingClaim>,
    validated: usize,
}

impl<'a> StagedPartition<'a> {
    /// Stage over `partition`; every staged write will carry `version`
    pub fn new(
        partition: &'a Partition,
        ids: &'a IdIndex,
        key: &'a PartitionKey,
        version: u64,
    ) -> Self {
        StagedPartition {
            partition,
            ids,
            key,
            version,
            timestamp: Utc::now(),
            staged: FxHashMap::default(),
            pending: Vec::new(),
            validated: 0,
        }
    }

    /// Current document with staged effects applied
    pub fn current(&self, id: &str) -> Option<&StoredDocument> {
        match self.staged.get(id) {
            Some(state) => state.as_ref(),
            None => self.partition.get(self.key, id),
        }
    }

    /// Validate one operation and stage its effect if valid
    ///
    /// Precondition failures come back as `Ok` results carrying a failure
    /// status. `Err` is reserved for internal inconsistencies.
    pub fn validate(&mut self, op: &BatchOperation) -> Result<OperationResult> {
        let index = self.validated;
        self.validated += 1;
        let kind = op.kind();
        match op {
            BatchOperation::Create(doc) => {
                if self.current(doc.id()).is_some() {
                    return Ok(conflict(kind, format!("document '{}' already exists", doc.id())));
                }
                if let Some(owner) = self.check_owner(index, kind, doc.id())? {
                    return Ok(conflict(
                        kind,
                        format!(
                            "document '{}' already exists under partition key '{}'",
                            doc.id(),
                            owner
                        ),
                    ));
                }
                Ok(self.stage(kind, OperationStatus::Created, doc.clone()))
            }
            BatchOperation::Upsert(doc) => {
                let status = if self.current(doc.id()).is_some() {
                    OperationStatus::Ok
                } else {
                    OperationStatus::Created
                };
                if let Some(owner) = self.check_owner(index, kind, doc.id())? {
                    return Ok(conflict(
                        kind,
                        format!(
                            "document '{}' belongs to partition key '{}'",
                            doc.id(),
                            owner
                        ),
                    ));
                }
                Ok(self.stage(kind, status, doc.clone()))
            }
            BatchOperation::Replace { document, if_match } => {
                if let Some(failure) = self.check_existing(kind, document.id(), *if_match) {
                    return Ok(failure);
                }
                Ok(self.stage(kind, OperationStatus::Ok, document.clone()))
            }
            BatchOperation::Delete { id, if_match } => {
                if let Some(failure) = self.check_existing(kind, id, *if_match) {
                    return Ok(failure);
                }
                self.staged.insert(id.clone(), None);
                Ok(OperationResult::success(
                    kind,
                    OperationStatus::NoContent,
                    None,
                    None,
                ))
            }
            BatchOperation::Read { id } => match self.current(id) {
                Some(stored) => Ok(OperationResult::success(
                    kind,
                    OperationStatus::Ok,
                    Some(stored.document().clone()),
                    Some(stored.version()),
                )),
                None => Ok(not_found(kind, self.key, id)),
            },
        }
    }

    /// Claim every id the batch introduces to the container
    ///
    /// Ids whose final staged state is deleted are skipped. If another
    /// partition took an id since it was validated, the ids claimed so far
    /// are released and the failing operation's index and result are
    /// returned; the batch must then be rejected.
    pub fn claim_ids(&self) -> Option<(usize, OperationResult)> {
        let mut claimed: Vec<&str> = Vec::with_capacity(self.pending.len());
        for pending in &self.pending {
            if !matches!(self.staged.get(&pending.id), Some(Some(_))) {
                continue;
            }
            match self.ids.claim(&pending.id, self.key) {
                Claim::Claimed => claimed.push(&pending.id),
                Claim::AlreadyOwned => {}
                Claim::OwnedElsewhere(owner) => {
                    for id in claimed {
                        self.ids.release(id, self.key);
                    }
                    let failure = conflict(
                        pending.kind,
                        format!(
                            "document '{}' already exists under partition key '{}'",
                            pending.id, owner
                        ),
                    );
                    return Some((pending.operation_index, failure));
                }
            }
        }
        None
    }

    /// Consume into the final state of every touched document
    pub fn into_writes(self) -> StagedWrites {
        self.staged
    }

    fn check_existing(
        &self,
        kind: OperationKind,
        id: &str,
        if_match: Option<u64>,
    ) -> Option<OperationResult> {
        let current = match self.current(id) {
            Some(current) => current,
            None => return Some(not_found(kind, self.key, id)),
        };
        match if_match {
            Some(expected) if current.version() != expected => Some(conflict(
                kind,
                format!(
                    "version mismatch on '{}': expected {}, found {}",
                    id,
                    expected,
                    current.version()
                ),
            )),
            _ => None,
        }
    }

    /// Owner of `id` if it is another partition-key value
    ///
    /// An id unknown to the container is recorded for [`Self::claim_ids`].
    fn check_owner(
        &mut self,
        index: usize,
        kind: OperationKind,
        id: &str,
    ) -> Result<Option<PartitionKey>> {
        if self.staged.contains_key(id) {
            return Ok(None);
        }
        match self.ids.owner(id) {
            None => {
                self.pending.push(PendingClaim {
                    operation_index: index,
                    kind,
                    id: id.to_string(),
                });
                Ok(None)
            }
            Some(owner) if &owner == self.key => {
                if !self.partition.contains(self.key, id) {
                    return Err(Error::internal(format!(
                        "id index lists '{}' under '{}' but the partition has no such document",
                        id, self.key
                    )));
                }
                Ok(None)
            }
            Some(owner) => Ok(Some(owner)),
        }
    }

    fn stage(
        &mut self,
        kind: OperationKind,
        status: OperationStatus,
        document: partdb_core::Document,
    ) -> OperationResult {
        let stored = StoredDocument::with_timestamp(
            document.clone(),
            self.key.clone(),
            self.version,
            self.timestamp,
        );
        self.staged.insert(document.id().to_string(), Some(stored));
        OperationResult::success(kind, status, Some(document), Some(self.version))
    }
}

fn conflict(kind: OperationKind, reason: String) -> OperationResult {
    OperationResult::failure(kind, OperationStatus::Conflict, reason)
}

fn not_found(kind: OperationKind, key: &PartitionKey, id: &str) -> OperationResult {
    OperationResult::failure(
        kind,
        OperationStatus::NotFound,
        format!("document '{}' not found in partition '{}'", id, key),
    )
}
