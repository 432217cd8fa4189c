//! Core types and traits for PartDB
//!
//! This crate defines the foundational types used throughout the system:
//! - Document: JSON document with a string id
//! - PartitionKey / PartitionKeyPath: partition-key values and container paths
//! - FieldPath: nested field addressing for predicates and keys
//! - RequestCharge: operation cost in milli request units
//! - ThroughputMode: manual or autoscale provisioning
//! - Limits: id, key and document size limits
//! - Error: Error type hierarchy
//! - Traits: Clock abstraction

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod charge;
pub mod document;
pub mod error;
pub mod limits;
pub mod throughput;
pub mod traits;

pub use charge::RequestCharge;
pub use document::{Document, FieldPath, PartitionKey, PartitionKeyPath, ID_FIELD};
pub use error::{Error, Result};
pub use limits::{LimitError, Limits};
pub use throughput::{ThroughputMode, AUTOSCALE_FLOOR_RATIO, MAX_CAPACITY};
pub use traits::{Clock, ManualClock, SystemClock};
