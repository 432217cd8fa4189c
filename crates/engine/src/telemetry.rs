//! Structured telemetry events
//!
//! The engine reports admission decisions, autoscale changes, batch
//! outcomes and lifecycle changes through a [`TelemetrySink`]. The default
//! [`TracingSink`] forwards them to `tracing`; [`MemorySink`] records them
//! for inspection in tests.

use parking_lot::Mutex;
use partdb_core::RequestCharge;
use std::time::Duration;
use tracing::{debug, info, warn};

/// One structured event
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryEvent {
    /// Request admitted by a throughput governor
    Admitted {
        /// Budget owner (`database` or `database/container`)
        scope: String,
        /// Cost admitted
        charge: RequestCharge,
    },
    /// Request denied by a throughput governor
    Throttled {
        /// Budget owner
        scope: String,
        /// Cost requested
        charge: RequestCharge,
        /// Time until the interval ends
        retry_after: Duration,
    },
    /// Autoscale effective capacity changed at an interval boundary
    CapacityChanged {
        /// Budget owner
        scope: String,
        /// Capacity before
        from: RequestCharge,
        /// Capacity after
        to: RequestCharge,
    },
    /// Transactional batch applied
    BatchCommitted {
        /// Container path
        container: String,
        /// Partition-key value of the batch
        partition_key: String,
        /// Number of operations
        operations: usize,
        /// Version stamped on every write
        version: u64,
    },
    /// Transactional batch rejected by validation
    BatchRejected {
        /// Container path
        container: String,
        /// Partition-key value of the batch
        partition_key: String,
        /// Index of the first failing operation
        operation_index: usize,
        /// Failure description
        reason: String,
    },
    /// Database created
    DatabaseCreated {
        /// Database name
        database: String,
    },
    /// Database deleted
    DatabaseDeleted {
        /// Database name
        database: String,
    },
    /// Container created
    ContainerCreated {
        /// Container path
        container: String,
        /// Partition-key path
        partition_key_path: String,
    },
    /// Container deleted
    ContainerDeleted {
        /// Container path
        container: String,
    },
}

/// Receiver of telemetry events
///
/// Called inline on the request path; implementations must not block.
pub trait TelemetrySink: Send + Sync {
    /// Record one event
    fn record(&self, event: TelemetryEvent);
}

/// Forwards events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn record(&self, event: TelemetryEvent) {
        match event {
            TelemetryEvent::Admitted { scope, charge } => {
                debug!(target: "partdb::throughput", scope = %scope, charge = %charge, "Request admitted");
            }
            TelemetryEvent::Throttled {
                scope,
                charge,
                retry_after,
            } => {
                warn!(
                    target: "partdb::throughput",
                    scope = %scope,
                    charge = %charge,
                    retry_after_ms = retry_after.as_millis() as u64,
                    "Request throttled"
                );
            }
            TelemetryEvent::CapacityChanged { scope, from, to } => {
                info!(target: "partdb::throughput", scope = %scope, from = %from, to = %to, "Autoscale capacity changed");
            }
            TelemetryEvent::BatchCommitted {
                container,
                partition_key,
                operations,
                version,
            } => {
                info!(
                    target: "partdb::batch",
                    container = %container,
                    partition_key = %partition_key,
                    operations,
                    version,
                    "Batch committed"
                );
            }
            TelemetryEvent::BatchRejected {
                container,
                partition_key,
                operation_index,
                reason,
            } => {
                warn!(
                    target: "partdb::batch",
                    container = %container,
                    partition_key = %partition_key,
                    operation_index,
                    reason = %reason,
                    "Batch rejected"
                );
            }
            TelemetryEvent::DatabaseCreated { database } => {
                info!(target: "partdb::container", database = %database, "Database created");
            }
            TelemetryEvent::DatabaseDeleted { database } => {
                info!(target: "partdb::container", database = %database, "Database deleted");
            }
            TelemetryEvent::ContainerCreated {
                container,
                partition_key_path,
            } => {
                info!(
                    target: "partdb::container",
                    container = %container,
                    partition_key_path = %partition_key_path,
                    "Container created"
                );
            }
            TelemetryEvent::ContainerDeleted { container } => {
                info!(target: "partdb::container", container = %container, "Container deleted");
            }
        }
    }
}

/// Records events in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every event recorded so far
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().clone()
    }

    /// Events matching `filter`
    pub fn matching(&self, filter: impl Fn(&TelemetryEvent) -> bool) -> Vec<TelemetryEvent> {
        self.events.lock().iter().filter(|e| filter(e)).cloned().collect()
    }

    /// Drop recorded events
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl TelemetrySink for MemorySink {
    fn record(&self, event: TelemetryEvent) {
        self.events.lock().push(event);
    }
}
