//! Stored document with storage metadata
//!
//! `StoredDocument` is what a partition holds: the caller's document plus
//! the partition-key value it was routed by, the version assigned by the
//! write that produced it, and the write time.

use chrono::{DateTime, Utc};
use partdb_core::{Document, PartitionKey};

/// A document as held by a partition
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    document: Document,
    partition_key: PartitionKey,
    version: u64,
    last_modified: DateTime<Utc>,
}

impl StoredDocument {
    /// Wrap a document written at `version`, stamped with the current time
    pub fn new(document: Document, partition_key: PartitionKey, version: u64) -> Self {
        Self::with_timestamp(document, partition_key, version, Utc::now())
    }

    /// Wrap a document with an explicit timestamp
    ///
    /// Batches stamp all their writes with one timestamp.
    pub fn with_timestamp(
        document: Document,
        partition_key: PartitionKey,
        version: u64,
        last_modified: DateTime<Utc>,
    ) -> Self {
        StoredDocument {
            document,
            partition_key,
            version,
            last_modified,
        }
    }

    /// The document
    #[inline]
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Consume into the document
    pub fn into_document(self) -> Document {
        self.document
    }

    /// Document id
    #[inline]
    pub fn id(&self) -> &str {
        self.document.id()
    }

    /// Partition-key value
    #[inline]
    pub fn partition_key(&self) -> &PartitionKey {
        &self.partition_key
    }

    /// Version of the write that produced this document
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Version rendered as an entity tag
    pub fn etag(&self) -> String {
        format!("\"{:016x}\"", self.version)
    }

    /// Time of the write that produced this document
    pub fn last_modified(&self) -> DateTime<Utc> {
        self.last_modified
    }
}
