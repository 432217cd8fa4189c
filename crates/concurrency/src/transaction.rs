//! Transactional batch operations and results
//!
//! A batch is an ordered list of [`BatchOperation`]s against one logical
//! partition. Each operation yields an [`OperationResult`]; the batch as a
//! whole yields a [`BatchOutcome`].

use partdb_core::{Document, Error};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One operation of a transactional batch
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOperation {
    /// Insert; the id must not exist in the container
    Create(Document),
    /// Insert or overwrite
    Upsert(Document),
    /// Overwrite an existing document, optionally at an expected version
    Replace {
        /// New document
        document: Document,
        /// Expected current version
        if_match: Option<u64>,
    },
    /// Remove an existing document, optionally at an expected version
    Delete {
        /// Document id
        id: String,
        /// Expected current version
        if_match: Option<u64>,
    },
    /// Read a document as part of the batch
    Read {
        /// Document id
        id: String,
    },
}

impl BatchOperation {
    /// Document carried by the operation, if any
    pub fn document(&self) -> Option<&Document> {
        match self {
            BatchOperation::Create(doc) | BatchOperation::Upsert(doc) => Some(doc),
            BatchOperation::Replace { document, .. } => Some(document),
            BatchOperation::Delete { .. } | BatchOperation::Read { .. } => None,
        }
    }

    /// Id of the target document
    pub fn id(&self) -> &str {
        match self {
            BatchOperation::Create(doc) | BatchOperation::Upsert(doc) => doc.id(),
            BatchOperation::Replace { document, .. } => document.id(),
            BatchOperation::Delete { id, .. } | BatchOperation::Read { id } => id,
        }
    }

    /// Operation kind
    pub fn kind(&self) -> OperationKind {
        match self {
            BatchOperation::Create(_) => OperationKind::Create,
            BatchOperation::Upsert(_) => OperationKind::Upsert,
            BatchOperation::Replace { .. } => OperationKind::Replace,
            BatchOperation::Delete { .. } => OperationKind::Delete,
            BatchOperation::Read { .. } => OperationKind::Read,
        }
    }
}

/// Operation kind, used for costing and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Create
    Create,
    /// Upsert
    Upsert,
    /// Replace
    Replace,
    /// Delete
    Delete,
    /// Read
    Read,
}

impl OperationKind {
    /// True for operations that modify the partition
    pub fn is_write(self) -> bool {
        !matches!(self, OperationKind::Read)
    }
}

/// Per-operation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    /// Read, replace or overwrite succeeded
    Ok,
    /// Document created
    Created,
    /// Document deleted
    NoContent,
    /// Operation was valid but the batch failed elsewhere
    NotApplied,
    /// Target document does not exist
    NotFound,
    /// Id exists, or version mismatch
    Conflict,
}

impl OperationStatus {
    /// HTTP-style status code
    pub fn code(self) -> u16 {
        match self {
            OperationStatus::Ok => 200,
            OperationStatus::Created => 201,
            OperationStatus::NoContent => 204,
            OperationStatus::NotApplied => 424,
            OperationStatus::NotFound => 404,
            OperationStatus::Conflict => 409,
        }
    }

    /// True for success statuses
    pub fn is_success(self) -> bool {
        matches!(
            self,
            OperationStatus::Ok | OperationStatus::Created | OperationStatus::NoContent
        )
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationStatus::Ok => "Ok",
            OperationStatus::Created => "Created",
            OperationStatus::NoContent => "NoContent",
            OperationStatus::NotApplied => "NotApplied",
            OperationStatus::NotFound => "NotFound",
            OperationStatus::Conflict => "Conflict",
        };
        write!(f, "{} ({})", name, self.code())
    }
}

/// Result of one batch operation
#[derive(Debug, Clone, PartialEq)]
pub struct OperationResult {
    /// Operation kind
    pub kind: OperationKind,
    /// Outcome
    pub status: OperationStatus,
    /// Document written or read; for a failed batch, the document the
    /// operation would have written
    pub resource: Option<Document>,
    /// Version of the resource, when known
    pub version: Option<u64>,
    /// Failure description for failing operations
    pub reason: Option<String>,
}

impl OperationResult {
    pub(crate) fn success(
        kind: OperationKind,
        status: OperationStatus,
        resource: Option<Document>,
        version: Option<u64>,
    ) -> Self {
        OperationResult {
            kind,
            status,
            resource,
            version,
            reason: None,
        }
    }

    pub(crate) fn failure(kind: OperationKind, status: OperationStatus, reason: String) -> Self {
        OperationResult {
            kind,
            status,
            resource: None,
            version: None,
            reason: Some(reason),
        }
    }

    /// Downgrade a would-be success to `NotApplied`
    pub(crate) fn not_applied(mut self) -> Self {
        if self.status.is_success() {
            self.status = OperationStatus::NotApplied;
        }
        self
    }

    /// True if the operation succeeded and was applied
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Outcome of a whole batch
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    /// One result per operation, in order
    pub results: Vec<OperationResult>,
    /// Version assigned to every write of a committed batch
    pub commit_version: Option<u64>,
    /// `ValidationFailed` for the first failing operation of a rejected batch
    pub failure: Option<Error>,
}

impl BatchOutcome {
    /// True if every operation was applied
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// Batch-level status: the first failing operation's, or `Ok`
    pub fn status(&self) -> OperationStatus {
        self.results
            .iter()
            .map(|r| r.status)
            .find(|s| !s.is_success() && *s != OperationStatus::NotApplied)
            .unwrap_or(OperationStatus::Ok)
    }

    /// Index of the first failing operation
    pub fn failed_operation_index(&self) -> Option<usize> {
        match &self.failure {
            Some(Error::ValidationFailed {
                operation_index, ..
            }) => Some(*operation_index),
            _ => None,
        }
    }
}
