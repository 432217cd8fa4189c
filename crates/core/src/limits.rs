//! Size limits for documents and keys
//!
//! Enforced on every write before a partition lock is taken. Violations
//! surface as `Error::InvalidDocument`.

use serde_json::Value;
use thiserror::Error;

use crate::document::{Document, PartitionKey};
use crate::error::Error;

/// Characters not allowed in document ids
const FORBIDDEN_ID_CHARS: [char; 4] = ['/', '\\', '?', '#'];

/// Size limits for documents and keys
#[derive(Debug, Clone)]
pub struct Limits {
    /// Maximum id length in bytes (default: 255)
    pub max_id_bytes: usize,

    /// Maximum partition-key value length in bytes (default: 2048)
    pub max_partition_key_bytes: usize,

    /// Maximum serialized document size in bytes (default: 2MB)
    pub max_document_bytes: usize,

    /// Maximum nesting depth (default: 128)
    pub max_nesting_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_id_bytes: 255,
            max_partition_key_bytes: 2048,
            max_document_bytes: 2 * 1024 * 1024, // 2MB
            max_nesting_depth: 128,
        }
    }
}

impl Limits {
    /// Create limits with small values for testing
    pub fn with_small_limits() -> Self {
        Limits {
            max_id_bytes: 16,
            max_partition_key_bytes: 16,
            max_document_bytes: 256,
            max_nesting_depth: 4,
        }
    }

    /// Validate a document id
    pub fn validate_id(&self, id: &str) -> Result<(), LimitError> {
        if id.is_empty() {
            return Err(LimitError::EmptyId);
        }
        if id.len() > self.max_id_bytes {
            return Err(LimitError::IdTooLong {
                actual: id.len(),
                max: self.max_id_bytes,
            });
        }
        if let Some(c) = id.chars().find(|c| FORBIDDEN_ID_CHARS.contains(c)) {
            return Err(LimitError::ForbiddenIdChar(c));
        }
        Ok(())
    }

    /// Validate a partition-key value
    pub fn validate_partition_key(&self, key: &PartitionKey) -> Result<(), LimitError> {
        let len = key.as_bytes().len();
        if len > self.max_partition_key_bytes {
            return Err(LimitError::PartitionKeyTooLong {
                actual: len,
                max: self.max_partition_key_bytes,
            });
        }
        Ok(())
    }

    /// Validate a whole document: id, nesting depth and encoded size
    pub fn validate_document(&self, doc: &Document) -> Result<(), LimitError> {
        self.validate_id(doc.id())?;
        for value in doc.fields().values() {
            self.validate_depth(value, 1)?;
        }
        let size = serde_json::to_vec(&doc.to_json())
            .map(|bytes| bytes.len())
            .unwrap_or(usize::MAX);
        if size > self.max_document_bytes {
            return Err(LimitError::DocumentTooLarge {
                actual: size,
                max: self.max_document_bytes,
            });
        }
        Ok(())
    }

    fn validate_depth(&self, value: &Value, depth: usize) -> Result<(), LimitError> {
        if depth > self.max_nesting_depth {
            return Err(LimitError::NestingTooDeep {
                actual: depth,
                max: self.max_nesting_depth,
            });
        }
        match value {
            Value::Array(items) => items
                .iter()
                .try_for_each(|v| self.validate_depth(v, depth + 1)),
            Value::Object(map) => map
                .values()
                .try_for_each(|v| self.validate_depth(v, depth + 1)),
            _ => Ok(()),
        }
    }
}

/// Limit validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LimitError {
    /// Empty document id
    #[error("document id must not be empty")]
    EmptyId,

    /// Document id exceeds maximum length
    #[error("document id too long: {actual} bytes exceeds maximum {max}")]
    IdTooLong {
        /// Actual length
        actual: usize,
        /// Maximum allowed
        max: usize,
    },

    /// Document id contains a reserved character
    #[error("document id contains forbidden character '{0}'")]
    ForbiddenIdChar(char),

    /// Partition-key value exceeds maximum length
    #[error("partition key too long: {actual} bytes exceeds maximum {max}")]
    PartitionKeyTooLong {
        /// Actual length
        actual: usize,
        /// Maximum allowed
        max: usize,
    },

    /// Serialized document exceeds maximum size
    #[error("document too large: {actual} bytes exceeds maximum {max}")]
    DocumentTooLarge {
        /// Actual size
        actual: usize,
        /// Maximum allowed
        max: usize,
    },

    /// Nesting exceeds maximum depth
    #[error("nesting too deep: {actual} levels exceeds maximum {max}")]
    NestingTooDeep {
        /// Actual depth
        actual: usize,
        /// Maximum allowed
        max: usize,
    },
}

impl From<LimitError> for Error {
    fn from(e: LimitError) -> Self {
        Error::InvalidDocument(e.to_string())
    }
}
