//! Physical and logical partitions
//!
//! A physical [`Partition`] owns every logical partition (one per distinct
//! partition-key value) that the router maps to it. Logical partitions are
//! registered on the first successful write of their key value and stay
//! registered, even when emptied, until the container is dropped.
//!
//! Documents inside a logical partition are kept in a `BTreeMap` by id so
//! scans return them in a stable order.
//!
//! A `Partition` has no internal locking. The store wraps each one in its
//! own reader/writer lock.

use partdb_core::PartitionKey;
use std::collections::BTreeMap;

use crate::router::PartitionId;
use crate::stored_value::StoredDocument;

/// Documents sharing one partition-key value
#[derive(Debug, Default, Clone)]
pub struct LogicalPartition {
    documents: BTreeMap<String, StoredDocument>,
}

impl LogicalPartition {
    /// Look up a document by id
    pub fn get(&self, id: &str) -> Option<&StoredDocument> {
        self.documents.get(id)
    }

    /// Documents ordered by id
    pub fn iter(&self) -> impl Iterator<Item = &StoredDocument> {
        self.documents.values()
    }

    /// Number of documents
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// True if no documents
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// A physical partition
#[derive(Debug)]
pub struct Partition {
    id: PartitionId,
    logical: BTreeMap<PartitionKey, LogicalPartition>,
    document_count: usize,
}

impl Partition {
    /// Create an empty partition
    pub fn new(id: PartitionId) -> Self {
        Partition {
            id,
            logical: BTreeMap::new(),
            document_count: 0,
        }
    }

    /// Partition identifier
    pub fn id(&self) -> PartitionId {
        self.id
    }

    /// Total documents across all logical partitions
    pub fn len(&self) -> usize {
        self.document_count
    }

    /// True if no documents
    pub fn is_empty(&self) -> bool {
        self.document_count == 0
    }

    /// Look up a document
    pub fn get(&self, key: &PartitionKey, id: &str) -> Option<&StoredDocument> {
        self.logical.get(key).and_then(|lp| lp.get(id))
    }

    /// Check if a document exists
    pub fn contains(&self, key: &PartitionKey, id: &str) -> bool {
        self.get(key, id).is_some()
    }

    /// Insert or overwrite a document, registering its logical partition
    ///
    /// Returns the previous document with the same id, if any.
    pub fn upsert(&mut self, stored: StoredDocument) -> Option<StoredDocument> {
        let logical = self
            .logical
            .entry(stored.partition_key().clone())
            .or_default();
        let previous = logical.documents.insert(stored.id().to_string(), stored);
        if previous.is_none() {
            self.document_count += 1;
        }
        previous
    }

    /// Remove a document; the logical partition stays registered
    pub fn remove(&mut self, key: &PartitionKey, id: &str) -> Option<StoredDocument> {
        let removed = self
            .logical
            .get_mut(key)
            .and_then(|lp| lp.documents.remove(id));
        if removed.is_some() {
            self.document_count -= 1;
        }
        removed
    }

    /// A logical partition, if its key value has ever been written
    pub fn logical_partition(&self, key: &PartitionKey) -> Option<&LogicalPartition> {
        self.logical.get(key)
    }

    /// Key values of every registered logical partition
    pub fn partition_keys(&self) -> impl Iterator<Item = &PartitionKey> {
        self.logical.keys()
    }

    /// Documents in scope: one logical partition, or all of them
    ///
    /// Ordered by key value, then id.
    pub fn scan<'a>(
        &'a self,
        key: Option<&PartitionKey>,
    ) -> Box<dyn Iterator<Item = &'a StoredDocument> + 'a> {
        match key {
            Some(key) => match self.logical.get(key) {
                Some(lp) => Box::new(lp.iter()),
                None => Box::new(std::iter::empty()),
            },
            None => Box::new(self.logical.values().flat_map(|lp| lp.iter())),
        }
    }

    /// Number of documents in scope
    pub fn count(&self, key: Option<&PartitionKey>) -> usize {
        match key {
            Some(key) => self.logical.get(key).map_or(0, LogicalPartition::len),
            None => self.document_count,
        }
    }
}
