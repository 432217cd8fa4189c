//! Partitioned document store engine
//!
//! This crate orchestrates the lower layers:
//! - Client / Database: named databases owning containers, shared throughput
//! - Container: point operations, queries and transactional batches
//! - Throughput governor: manual and autoscale request-unit budgets
//! - Query engine: predicates, query text, lazy cross-partition feeds
//! - Telemetry: structured events through a pluggable sink
//!
//! The engine is the only component that knows about:
//! - Request costs and admission
//! - Container and database lifecycle
//! - Configuration

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod container;
pub mod database;
pub mod query;
pub mod state_store;
pub mod telemetry;
pub mod throughput;

pub use client::{Client, ClientBuilder};
pub use config::{AutoscaleConfig, CostConfig, EngineConfig, QueryConfig, CONFIG_FILE_NAME};
pub use container::{BatchResponse, Container, ContainerProperties, ItemResponse, TransactionalBatch};
pub use database::Database;
pub use query::{
    compare_values, parse_query, CompareOp, Comparison, Predicate, QueryFeed, QueryOptions,
    QueryPage, QueryScope, ScanStats,
};
pub use state_store::{StateStore, STATE_KEY_PATH};
pub use telemetry::{MemorySink, TelemetryEvent, TelemetrySink, TracingSink};
pub use throughput::{
    Admission, GovernorStats, ThroughputGovernor, ThroughputSnapshot, SCALE_UP_UTILIZATION,
};
