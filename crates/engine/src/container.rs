//! Containers: the unit of partitioning, throughput and querying
//!
//! Every request follows the same path:
//!
//! ```text
//! 1. Container still exists?          (else UnknownContainer)
//! 2. Validate document / key limits   (else InvalidDocument)
//! 3. Extract partition key, route     (PartitionKeyPath → PartitionRouter)
//! 4. Admit the cost                   (else Throttled, nothing touched)
//! 5. Execute against the partition store
//! ```
//!
//! Admitted cost stays charged even if the operation then fails.

use chrono::{DateTime, Utc};
use partdb_concurrency::{BatchExecutor, BatchOperation, BatchOutcome, OperationKind, OperationResult};
use partdb_core::{
    Document, Error, Limits, PartitionKey, PartitionKeyPath, RequestCharge, Result, ThroughputMode,
};
use partdb_storage::{PartitionId, PartitionStore, StoredDocument};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::query::{
    parse_query, Predicate, QueryContext, QueryFeed, QueryOptions, QueryScope, ScanStats,
};
use crate::telemetry::{TelemetryEvent, TelemetrySink};
use crate::throughput::{GovernorStats, ThroughputGovernor, ThroughputSnapshot};

/// Settings a container is created with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerProperties {
    /// Container name, unique within its database
    pub id: String,
    /// Partition-key path, e.g. `/CityName`
    pub partition_key_path: String,
    /// Dedicated throughput; `None` draws from the database's shared budget
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throughput: Option<ThroughputMode>,
}

impl ContainerProperties {
    /// Container without dedicated throughput
    pub fn new(id: impl Into<String>, partition_key_path: impl Into<String>) -> Self {
        ContainerProperties {
            id: id.into(),
            partition_key_path: partition_key_path.into(),
            throughput: None,
        }
    }

    /// Provision dedicated throughput
    pub fn with_throughput(mut self, mode: ThroughputMode) -> Self {
        self.throughput = Some(mode);
        self
    }
}

/// Response to a point operation
#[derive(Debug, Clone, PartialEq)]
pub struct ItemResponse {
    /// Document written, read or deleted
    pub resource: Document,
    /// Partition-key value of the document
    pub partition_key: PartitionKey,
    /// Version of the document (of the deleted one, for deletes)
    pub version: u64,
    /// Version as an entity tag
    pub etag: String,
    /// Time of the write that produced this version
    pub last_modified: DateTime<Utc>,
    /// Cost of the operation
    pub request_charge: RequestCharge,
    /// Request identifier
    pub activity_id: Uuid,
}

impl ItemResponse {
    fn new(stored: StoredDocument, request_charge: RequestCharge) -> Self {
        ItemResponse {
            version: stored.version(),
            etag: stored.etag(),
            last_modified: stored.last_modified(),
            partition_key: stored.partition_key().clone(),
            resource: stored.into_document(),
            request_charge,
            activity_id: Uuid::new_v4(),
        }
    }

    /// Deserialize the resource into a typed item
    pub fn item<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        self.resource.deserialize()
    }
}

/// Response to a transactional batch
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResponse {
    /// Per-operation results and batch outcome
    pub outcome: BatchOutcome,
    /// Cost of the batch
    pub request_charge: RequestCharge,
    /// Request identifier
    pub activity_id: Uuid,
}

impl BatchResponse {
    /// True if every operation was applied
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    /// One result per operation, in order
    pub fn results(&self) -> &[OperationResult] {
        &self.outcome.results
    }

    /// The outcome, or `ValidationFailed` if the batch was rejected
    pub fn into_result(self) -> Result<BatchOutcome> {
        match self.outcome.failure {
            Some(e) => Err(e),
            None => Ok(self.outcome),
        }
    }
}

/// Builder for a transactional batch scoped to one partition-key value
#[must_use = "a batch does nothing until executed"]
pub struct TransactionalBatch<'c> {
    container: &'c Container,
    partition_key: PartitionKey,
    operations: Vec<BatchOperation>,
}

impl<'c> TransactionalBatch<'c> {
    /// Insert; fails the batch if the id exists
    pub fn create_item(mut self, document: Document) -> Self {
        self.operations.push(BatchOperation::Create(document));
        self
    }

    /// Insert or overwrite
    pub fn upsert_item(mut self, document: Document) -> Self {
        self.operations.push(BatchOperation::Upsert(document));
        self
    }

    /// Overwrite an existing document
    pub fn replace_item(self, document: Document) -> Self {
        self.push_replace(document, None)
    }

    /// Overwrite an existing document at the expected version
    pub fn replace_item_if_match(self, document: Document, version: u64) -> Self {
        self.push_replace(document, Some(version))
    }

    fn push_replace(mut self, document: Document, if_match: Option<u64>) -> Self {
        self.operations
            .push(BatchOperation::Replace { document, if_match });
        self
    }

    /// Remove an existing document
    pub fn delete_item(mut self, id: impl Into<String>) -> Self {
        self.operations.push(BatchOperation::Delete {
            id: id.into(),
            if_match: None,
        });
        self
    }

    /// Remove an existing document at the expected version
    pub fn delete_item_if_match(mut self, id: impl Into<String>, version: u64) -> Self {
        self.operations.push(BatchOperation::Delete {
            id: id.into(),
            if_match: Some(version),
        });
        self
    }

    /// Read a document as part of the batch
    pub fn read_item(mut self, id: impl Into<String>) -> Self {
        self.operations
            .push(BatchOperation::Read { id: id.into() });
        self
    }

    /// Operations added so far
    pub fn operations(&self) -> &[BatchOperation] {
        &self.operations
    }

    /// Execute atomically
    pub fn execute(self) -> Result<BatchResponse> {
        self.container
            .execute_batch(&self.partition_key, &self.operations)
    }
}

/// A container of partitioned documents
pub struct Container {
    id: String,
    scope: String,
    key_path: PartitionKeyPath,
    store: Arc<PartitionStore>,
    governor: Arc<ThroughputGovernor>,
    dedicated_throughput: bool,
    executor: BatchExecutor,
    stats: Arc<ScanStats>,
    config: Arc<EngineConfig>,
    limits: Limits,
    sink: Arc<dyn TelemetrySink>,
    deleted: AtomicBool,
}

impl Container {
    pub(crate) fn new(
        database: &str,
        properties: &ContainerProperties,
        governor: Arc<ThroughputGovernor>,
        config: Arc<EngineConfig>,
        sink: Arc<dyn TelemetrySink>,
    ) -> Result<Self> {
        let key_path = PartitionKeyPath::parse(&properties.partition_key_path)?;
        Ok(Container {
            id: properties.id.clone(),
            scope: format!("{}/{}", database, properties.id),
            key_path,
            store: Arc::new(PartitionStore::new(config.partitions_per_container)),
            governor,
            dedicated_throughput: properties.throughput.is_some(),
            executor: BatchExecutor::new(config.max_batch_operations),
            stats: Arc::new(ScanStats::new(config.costs.scan_charge(0))),
            limits: Limits::default(),
            config,
            sink,
            deleted: AtomicBool::new(false),
        })
    }

    /// Container name
    pub fn id(&self) -> &str {
        &self.id
    }

    /// `database/container`
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Partition-key path
    pub fn partition_key_path(&self) -> &PartitionKeyPath {
        &self.key_path
    }

    /// True if the container has its own throughput budget
    pub fn has_dedicated_throughput(&self) -> bool {
        self.dedicated_throughput
    }

    pub(crate) fn mark_deleted(&self) {
        self.deleted.store(true, Ordering::Release);
    }

    fn ensure_live(&self) -> Result<()> {
        if self.deleted.load(Ordering::Acquire) {
            return Err(Error::UnknownContainer(self.scope.clone()));
        }
        Ok(())
    }

    /// Validate a document for writing and extract its partition key
    fn prepare(&self, document: &Document) -> Result<PartitionKey> {
        self.limits.validate_id(document.id())?;
        self.limits.validate_document(document)?;
        let key = self.key_path.extract(document)?;
        self.limits.validate_partition_key(&key)?;
        Ok(key)
    }

    fn admit_point(&self, cost: RequestCharge) -> Result<RequestCharge> {
        self.governor.try_admit(cost)?;
        Ok(cost)
    }

    // ========================================================================
    // Routing
    // ========================================================================

    /// Physical partition owning a partition-key value
    pub fn locate(&self, partition_key: &PartitionKey) -> Result<PartitionId> {
        self.ensure_live()?;
        Ok(self.store.locate(partition_key))
    }

    /// Every partition-key value written so far, sorted
    pub fn partition_keys(&self) -> Result<Vec<PartitionKey>> {
        self.ensure_live()?;
        Ok(self.store.partition_keys())
    }

    // ========================================================================
    // Point operations
    // ========================================================================

    /// Insert or overwrite a document by id (last write wins)
    pub fn upsert_item(&self, document: Document) -> Result<ItemResponse> {
        self.ensure_live()?;
        let key = self.prepare(&document)?;
        let charge = self.admit_point(self.config.costs.point_write_charge())?;
        let stored = self.store.upsert(&key, document)?;
        Ok(ItemResponse::new(stored, charge))
    }

    /// Insert a document whose id must not exist in the container
    pub fn create_item(&self, document: Document) -> Result<ItemResponse> {
        self.ensure_live()?;
        let key = self.prepare(&document)?;
        let charge = self.admit_point(self.config.costs.point_write_charge())?;
        let stored = self.store.create(&key, document)?;
        Ok(ItemResponse::new(stored, charge))
    }

    /// Overwrite an existing document
    pub fn replace_item(&self, document: Document) -> Result<ItemResponse> {
        self.replace(document, None)
    }

    /// Overwrite an existing document if its version is still `version`
    pub fn replace_item_if_match(&self, document: Document, version: u64) -> Result<ItemResponse> {
        self.replace(document, Some(version))
    }

    fn replace(&self, document: Document, if_match: Option<u64>) -> Result<ItemResponse> {
        self.ensure_live()?;
        let key = self.prepare(&document)?;
        let charge = self.admit_point(self.config.costs.point_write_charge())?;
        let stored = self.store.replace(&key, document, if_match)?;
        Ok(ItemResponse::new(stored, charge))
    }

    /// Read one document
    pub fn read_item(&self, partition_key: &PartitionKey, id: &str) -> Result<ItemResponse> {
        self.ensure_live()?;
        let charge = self.admit_point(self.config.costs.point_read_charge())?;
        let stored = self
            .store
            .get(partition_key, id)
            .ok_or_else(|| Error::document_not_found(partition_key.as_str(), id))?;
        Ok(ItemResponse::new(stored, charge))
    }

    /// Delete one document, returning it
    pub fn delete_item(&self, partition_key: &PartitionKey, id: &str) -> Result<ItemResponse> {
        self.ensure_live()?;
        let charge = self.admit_point(self.config.costs.point_write_charge())?;
        let removed = self.store.delete(partition_key, id)?;
        Ok(ItemResponse::new(removed, charge))
    }

    /// Number of documents in the container
    pub fn count(&self) -> Result<usize> {
        self.ensure_live()?;
        Ok(self.store.document_count())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Every document of one logical partition
    pub fn read_all_items(&self, partition_key: impl Into<PartitionKey>) -> Result<QueryFeed> {
        self.query(Predicate::all(), QueryScope::Partition(partition_key.into()))
    }

    /// Documents matching `predicate` within `scope`
    pub fn query(&self, predicate: Predicate, scope: QueryScope) -> Result<QueryFeed> {
        self.query_with_options(predicate, scope, QueryOptions::default())
    }

    /// `query` with fan-out overrides
    pub fn query_with_options(
        &self,
        predicate: Predicate,
        scope: QueryScope,
        options: QueryOptions,
    ) -> Result<QueryFeed> {
        self.ensure_live()?;
        let ctx = QueryContext {
            store: Arc::clone(&self.store),
            governor: Arc::clone(&self.governor),
            stats: Arc::clone(&self.stats),
            costs: self.config.costs.clone(),
            defaults: self.config.query.clone(),
        };
        QueryFeed::start(ctx, predicate, scope, options)
    }

    /// Documents matching query text such as
    /// `SELECT * FROM c WHERE c.StarRating < 3`
    pub fn query_text(&self, text: &str, scope: QueryScope) -> Result<QueryFeed> {
        self.query(parse_query(text)?, scope)
    }

    // ========================================================================
    // Transactional batches
    // ========================================================================

    /// Start a batch scoped to `partition_key`
    pub fn transactional_batch(&self, partition_key: impl Into<PartitionKey>) -> TransactionalBatch<'_> {
        TransactionalBatch {
            container: self,
            partition_key: partition_key.into(),
            operations: Vec::new(),
        }
    }

    /// Execute `operations` atomically in one logical partition
    ///
    /// A batch rejected by validation is an `Ok` response whose outcome
    /// carries `ValidationFailed`; see [`BatchResponse::into_result`].
    pub fn execute_batch(
        &self,
        partition_key: &PartitionKey,
        operations: &[BatchOperation],
    ) -> Result<BatchResponse> {
        self.ensure_live()?;
        for op in operations {
            match op.document() {
                Some(doc) => {
                    self.limits.validate_id(doc.id())?;
                    self.limits.validate_document(doc)?;
                }
                None => self.limits.validate_id(op.id())?,
            }
        }
        self.limits.validate_partition_key(partition_key)?;
        self.executor
            .check(partition_key, &self.key_path, operations)?;

        let costs = &self.config.costs;
        let charge: RequestCharge = operations
            .iter()
            .map(|op| match op.kind() {
                OperationKind::Read => costs.point_read_charge(),
                _ => costs.point_write_charge(),
            })
            .sum();
        self.governor.try_admit(charge)?;

        let outcome = self
            .executor
            .execute(&self.store, partition_key, &self.key_path, operations)?;

        match (&outcome.failure, outcome.commit_version) {
            (
                Some(Error::ValidationFailed {
                    operation_index,
                    reason,
                }),
                _,
            ) => self.sink.record(TelemetryEvent::BatchRejected {
                container: self.scope.clone(),
                partition_key: partition_key.to_string(),
                operation_index: *operation_index,
                reason: reason.clone(),
            }),
            (_, Some(version)) => self.sink.record(TelemetryEvent::BatchCommitted {
                container: self.scope.clone(),
                partition_key: partition_key.to_string(),
                operations: operations.len(),
                version,
            }),
            _ => {}
        }

        Ok(BatchResponse {
            outcome,
            request_charge: charge,
            activity_id: Uuid::new_v4(),
        })
    }

    // ========================================================================
    // Throughput
    // ========================================================================

    /// Consumed cost, capacity and time left in the current interval
    ///
    /// For a container on shared throughput this is the database's budget.
    pub fn consumed_throughput(&self) -> Result<ThroughputSnapshot> {
        self.ensure_live()?;
        Ok(self.governor.snapshot())
    }

    /// Lifetime admission totals of the budget this container draws from
    pub fn throughput_stats(&self) -> GovernorStats {
        self.governor.stats()
    }

    /// Batches committed and rejected so far
    pub fn batch_stats(&self) -> (u64, u64) {
        (self.executor.committed_count(), self.executor.rejected_count())
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("scope", &self.scope)
            .field("partition_key_path", &self.key_path.to_string())
            .field("store", &self.store)
            .field("governor", &self.governor)
            .field("deleted", &self.deleted.load(Ordering::Relaxed))
            .finish()
    }
}
