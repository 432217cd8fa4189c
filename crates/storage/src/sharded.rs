//! Partitioned document storage
//!
//! `PartitionStore` is the document store of one container: a DashMap of
//! physical partitions, each behind its own `parking_lot::RwLock`.
//!
//! # Design
//!
//! - DashMap: partition lookup without a container-wide lock
//! - RwLock per partition: shared for reads and scans, exclusive for writes
//! - Writers to different partitions never block each other
//! - Partitions are created lazily by the first write routed to them
//!
//! # Thread Safety
//!
//! - get(): shared lock on one partition
//! - upsert()/create()/replace()/delete(): exclusive lock on one partition
//! - The id index is only touched while the owning partition is write-locked
//!
//! # Version Handling
//!
//! A container-wide `AtomicU64` hands out versions. Every write takes a new
//! version, so versions double as concurrency tokens for `replace`.

use dashmap::DashMap;
use parking_lot::RwLock;
use partdb_core::{Document, Error, PartitionKey, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::index::{Claim, IdIndex};
use crate::partition::Partition;
use crate::router::{PartitionId, PartitionRouter};
use crate::stored_value::StoredDocument;

/// Shared handle to a locked partition
pub type PartitionHandle = Arc<RwLock<Partition>>;

/// Document storage for one container
pub struct PartitionStore {
    router: PartitionRouter,
    partitions: DashMap<PartitionId, PartitionHandle>,
    ids: IdIndex,
    version: AtomicU64,
}

impl PartitionStore {
    /// Create an empty store routed over `partition_count` partitions
    pub fn new(partition_count: u32) -> Self {
        Self {
            router: PartitionRouter::new(partition_count),
            partitions: DashMap::new(),
            ids: IdIndex::new(),
            version: AtomicU64::new(0),
        }
    }

    /// The router of this store
    pub fn router(&self) -> &PartitionRouter {
        &self.router
    }

    /// Physical partition owning `key`
    #[inline]
    pub fn locate(&self, key: &PartitionKey) -> PartitionId {
        self.router.locate(key)
    }

    /// The id index
    pub fn id_index(&self) -> &IdIndex {
        &self.ids
    }

    /// Get current version
    #[inline]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Increment version and return new value
    #[inline]
    pub fn next_version(&self) -> u64 {
        self.version.fetch_add(1, Ordering::AcqRel) + 1
    }

    // ========================================================================
    // Partition access
    // ========================================================================

    /// Existing partition, if any write has been routed to it
    ///
    /// The DashMap guard is dropped before returning so callers can lock
    /// the partition freely.
    pub fn partition(&self, id: PartitionId) -> Option<PartitionHandle> {
        self.partitions.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Partition, created empty if absent
    pub fn partition_or_create(&self, id: PartitionId) -> PartitionHandle {
        let entry = self
            .partitions
            .entry(id)
            .or_insert_with(|| Arc::new(RwLock::new(Partition::new(id))));
        Arc::clone(entry.value())
    }

    /// Partition owning `key`, if it exists
    pub fn partition_for(&self, key: &PartitionKey) -> Option<PartitionHandle> {
        self.partition(self.locate(key))
    }

    /// Ids of existing partitions, ascending
    pub fn partition_ids(&self) -> Vec<PartitionId> {
        let mut ids: Vec<_> = self.partitions.iter().map(|e| *e.key()).collect();
        ids.sort();
        ids
    }

    /// Number of existing physical partitions
    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// Every partition-key value ever written, sorted
    pub fn partition_keys(&self) -> Vec<PartitionKey> {
        let mut keys: Vec<PartitionKey> = self
            .partition_ids()
            .into_iter()
            .filter_map(|id| self.partition(id))
            .flat_map(|p| {
                let guard = p.read();
                guard.partition_keys().cloned().collect::<Vec<_>>()
            })
            .collect();
        keys.sort();
        keys
    }

    /// Total documents across all partitions
    ///
    /// Each partition is read-locked in turn; not an atomic snapshot.
    pub fn document_count(&self) -> usize {
        self.partition_ids()
            .into_iter()
            .filter_map(|id| self.partition(id))
            .map(|p| {
                let guard = p.read();
                guard.len()
            })
            .sum()
    }

    /// Documents in a logical partition, or in the whole container
    pub fn count_in_scope(&self, key: Option<&PartitionKey>) -> usize {
        match key {
            Some(key) => self.partition_for(key).map_or(0, |p| {
                let guard = p.read();
                guard.count(Some(key))
            }),
            None => self.document_count(),
        }
    }

    // ========================================================================
    // Point operations
    // ========================================================================

    /// Read one document
    pub fn get(&self, key: &PartitionKey, id: &str) -> Option<StoredDocument> {
        let partition = self.partition_for(key)?;
        let guard = partition.read();
        guard.get(key, id).cloned()
    }

    /// Read every document of a logical partition, ordered by id
    pub fn read_logical(&self, key: &PartitionKey) -> Vec<StoredDocument> {
        self.partition_for(key)
            .map(|p| {
                let guard = p.read();
                let docs: Vec<StoredDocument> = guard.scan(Some(key)).cloned().collect();
                docs
            })
            .unwrap_or_default()
    }

    /// Insert or overwrite a document
    ///
    /// Fails with `PartitionKeyMismatch` if the id already belongs to
    /// another partition-key value.
    pub fn upsert(&self, key: &PartitionKey, document: Document) -> Result<StoredDocument> {
        let partition = self.partition_or_create(self.locate(key));
        let mut guard = partition.write();

        if let Claim::OwnedElsewhere(owner) = self.ids.claim(document.id(), key) {
            return Err(Error::PartitionKeyMismatch {
                expected: owner.to_string(),
                actual: key.to_string(),
            });
        }

        let stored = StoredDocument::new(document, key.clone(), self.next_version());
        guard.upsert(stored.clone());
        Ok(stored)
    }

    /// Insert a document whose id must not exist in the container
    pub fn create(&self, key: &PartitionKey, document: Document) -> Result<StoredDocument> {
        let partition = self.partition_or_create(self.locate(key));
        let mut guard = partition.write();

        match self.ids.claim(document.id(), key) {
            Claim::Claimed => {}
            Claim::AlreadyOwned => {
                if !guard.contains(key, document.id()) {
                    return Err(Error::internal(format!(
                        "id index lists '{}' under '{}' but the partition has no such document",
                        document.id(),
                        key
                    )));
                }
                return Err(Error::Conflict(format!(
                    "document '{}' already exists",
                    document.id()
                )));
            }
            Claim::OwnedElsewhere(_) => {
                return Err(Error::Conflict(format!(
                    "document '{}' already exists",
                    document.id()
                )))
            }
        }

        let stored = StoredDocument::new(document, key.clone(), self.next_version());
        guard.upsert(stored.clone());
        Ok(stored)
    }

    /// Overwrite an existing document
    ///
    /// With `if_match`, the stored version must equal it or the write fails
    /// with `Conflict`.
    pub fn replace(
        &self,
        key: &PartitionKey,
        document: Document,
        if_match: Option<u64>,
    ) -> Result<StoredDocument> {
        let partition = self
            .partition_for(key)
            .ok_or_else(|| Error::document_not_found(key.as_str(), document.id()))?;
        let mut guard = partition.write();

        let current = guard
            .get(key, document.id())
            .ok_or_else(|| Error::document_not_found(key.as_str(), document.id()))?;
        if let Some(expected) = if_match {
            if current.version() != expected {
                return Err(Error::Conflict(format!(
                    "version mismatch on '{}': expected {}, found {}",
                    document.id(),
                    expected,
                    current.version()
                )));
            }
        }

        let stored = StoredDocument::new(document, key.clone(), self.next_version());
        guard.upsert(stored.clone());
        Ok(stored)
    }

    /// Delete a document, returning it
    pub fn delete(&self, key: &PartitionKey, id: &str) -> Result<StoredDocument> {
        let partition = self
            .partition_for(key)
            .ok_or_else(|| Error::document_not_found(key.as_str(), id))?;
        let mut guard = partition.write();

        let removed = guard
            .remove(key, id)
            .ok_or_else(|| Error::document_not_found(key.as_str(), id))?;
        self.ids.release(id, key);
        Ok(removed)
    }
}

impl std::fmt::Debug for PartitionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionStore")
            .field("router", &self.router)
            .field("partition_count", &self.partition_count())
            .field("version", &self.version())
            .finish()
    }
}
