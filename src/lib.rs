//! PartDB - embedded partitioned document store
//!
//! Documents live in containers, spread over physical partitions by the
//! hash of their partition-key value. Every request is admitted against a
//! request-unit budget; multi-document writes within one partition-key
//! value commit atomically.
//!
//! # Quick Start
//!
//! ```ignore
//! use partdb::{Client, ContainerProperties, Document, QueryScope, ThroughputMode};
//!
//! let client = Client::new()?;
//! let db = client.create_database_if_not_exists("hotels", Some(ThroughputMode::manual(400)))?;
//! let hotels = db.create_container_if_not_exists(ContainerProperties::new("byCity", "/CityName"))?;
//!
//! hotels.upsert_item(Document::new("h1").with_field("CityName", "Auckland").with_field("StarRating", 2))?;
//!
//! let (cheap, charge) = hotels
//!     .query_text(
//!         "SELECT * FROM Hotels c WHERE c.CityName = 'Auckland' AND c.StarRating < 3",
//!         QueryScope::partition("Auckland"),
//!     )?
//!     .collect_all();
//! ```
//!
//! # Architecture
//!
//! - `partdb-core`: documents, partition keys, charges, errors, limits
//! - `partdb-storage`: partition router and partition store
//! - `partdb-concurrency`: transactional batch validation and commit
//! - `partdb-engine`: client, databases, containers, throughput, queries

pub use partdb_concurrency::{
    BatchOperation, BatchOutcome, OperationKind, OperationResult, OperationStatus,
    DEFAULT_MAX_BATCH_OPERATIONS,
};
pub use partdb_core::{
    Clock, Document, Error, FieldPath, Limits, ManualClock, PartitionKey, PartitionKeyPath,
    RequestCharge, Result, SystemClock, ThroughputMode,
};
pub use partdb_engine::*;
pub use partdb_storage::PartitionId;
