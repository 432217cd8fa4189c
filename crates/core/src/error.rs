//! Error types for PartDB
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Every failure is a typed variant the caller branches on. Throttling and
//! batch validation failures are expected outcomes, not faults; the
//! `is_retryable` helper separates the former from caller errors.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for PartDB operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for PartDB
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Document (or other resource) does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Container does not exist (or was deleted)
    #[error("Unknown container: {0}")]
    UnknownContainer(String),

    /// Database does not exist (or was deleted)
    #[error("Unknown database: {0}")]
    UnknownDatabase(String),

    /// Request denied by the throughput governor
    #[error("Request rate too large, retry after {retry_after:?}")]
    Throttled {
        /// Time until the current throughput interval ends
        retry_after: Duration,
    },

    /// A document or batch operation carries the wrong partition-key value
    #[error("Partition key mismatch: expected {expected:?}, got {actual:?}")]
    PartitionKeyMismatch {
        /// Partition-key value the request was scoped to
        expected: String,
        /// Partition-key value actually carried
        actual: String,
    },

    /// A transactional batch failed validation; nothing was applied
    #[error("Batch operation {operation_index} failed validation: {reason}")]
    ValidationFailed {
        /// Index of the first failing operation
        operation_index: usize,
        /// Failure description of that operation
        reason: String,
    },

    /// Id already exists on create, or version mismatch on replace
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Document is malformed (missing id, missing partition key, limits)
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// Query text or predicate could not be parsed
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Invalid operation or state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Configuration could not be read or is out of range
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal invariant violated; only the offending operation is aborted
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a NotFound error for a document
    pub fn document_not_found(partition_key: &str, id: &str) -> Self {
        Error::NotFound(format!("document '{}' in partition '{}'", id, partition_key))
    }

    /// Create an InvalidOperation error
    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        Error::InvalidOperation(msg.into())
    }

    /// Create an InvalidDocument error
    pub fn invalid_document(msg: impl Into<String>) -> Self {
        Error::InvalidDocument(msg.into())
    }

    /// Create an Internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    /// True if the caller may retry the same request after backing off
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Throttled { .. })
    }

    /// Retry hint for throttled requests
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Error::Throttled { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    /// HTTP-style status code a request front end can surface
    pub fn status_code(&self) -> u16 {
        match self {
            Error::NotFound(_) | Error::UnknownContainer(_) | Error::UnknownDatabase(_) => 404,
            Error::Throttled { .. } => 429,
            Error::Conflict(_) => 409,
            Error::ValidationFailed { .. } => 424,
            Error::PartitionKeyMismatch { .. }
            | Error::InvalidDocument(_)
            | Error::InvalidQuery(_)
            | Error::InvalidOperation(_)
            | Error::Config(_) => 400,
            Error::Internal(_) => 500,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::InvalidDocument(e.to_string())
    }
}
