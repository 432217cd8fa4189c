//! Databases: named groups of containers with optional shared throughput
//!
//! A database provisioned with throughput owns one governor that every
//! container without dedicated throughput draws from. A container with its
//! own throughput never touches the shared budget.
//!
//! Deleting a database or container marks it deleted; handles that are
//! still held fail every later call with `UnknownDatabase` /
//! `UnknownContainer`.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use partdb_core::{Clock, Error, PartitionKey, Result, ThroughputMode};
use partdb_storage::PartitionId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::container::{Container, ContainerProperties};
use crate::telemetry::{TelemetryEvent, TelemetrySink};
use crate::throughput::{ThroughputGovernor, ThroughputSnapshot};

/// A named group of containers
pub struct Database {
    id: String,
    shared: Option<Arc<ThroughputGovernor>>,
    containers: DashMap<String, Arc<Container>>,
    config: Arc<EngineConfig>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn TelemetrySink>,
    deleted: AtomicBool,
}

impl Database {
    pub(crate) fn new(
        id: String,
        throughput: Option<ThroughputMode>,
        config: Arc<EngineConfig>,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn TelemetrySink>,
    ) -> Result<Self> {
        validate_name("database", &id)?;
        let shared = match throughput {
            Some(mode) => Some(Arc::new(ThroughputGovernor::new(
                id.clone(),
                mode,
                config.throughput_interval(),
                config.autoscale.clone(),
                Arc::clone(&clock),
                Arc::clone(&sink),
            )?)),
            None => None,
        };
        Ok(Database {
            id,
            shared,
            containers: DashMap::new(),
            config,
            clock,
            sink,
            deleted: AtomicBool::new(false),
        })
    }

    /// Database name
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Shared throughput mode, if provisioned
    pub fn throughput(&self) -> Option<ThroughputMode> {
        self.shared.as_ref().map(|g| g.mode())
    }

    fn ensure_live(&self) -> Result<()> {
        if self.deleted.load(Ordering::Acquire) {
            return Err(Error::UnknownDatabase(self.id.clone()));
        }
        Ok(())
    }

    pub(crate) fn mark_deleted(&self) {
        self.deleted.store(true, Ordering::Release);
        for entry in self.containers.iter() {
            entry.value().mark_deleted();
        }
        self.containers.clear();
    }

    fn build_container(&self, properties: &ContainerProperties) -> Result<Container> {
        validate_name("container", &properties.id)?;
        let governor = match (properties.throughput, &self.shared) {
            (Some(mode), _) => Arc::new(ThroughputGovernor::new(
                format!("{}/{}", self.id, properties.id),
                mode,
                self.config.throughput_interval(),
                self.config.autoscale.clone(),
                Arc::clone(&self.clock),
                Arc::clone(&self.sink),
            )?),
            (None, Some(shared)) => Arc::clone(shared),
            (None, None) => {
                return Err(Error::invalid_operation(format!(
                    "container '{}' needs dedicated throughput: database '{}' has none to share",
                    properties.id, self.id
                )))
            }
        };
        Container::new(
            &self.id,
            properties,
            governor,
            Arc::clone(&self.config),
            Arc::clone(&self.sink),
        )
    }

    fn register(&self, container: &Container) {
        self.sink.record(TelemetryEvent::ContainerCreated {
            container: container.scope().to_string(),
            partition_key_path: container.partition_key_path().to_string(),
        });
    }

    /// Create a container; fails with `Conflict` if the name is taken
    pub fn create_container(&self, properties: ContainerProperties) -> Result<Arc<Container>> {
        self.ensure_live()?;
        match self.containers.entry(properties.id.clone()) {
            Entry::Occupied(_) => Err(Error::Conflict(format!(
                "container '{}' already exists in database '{}'",
                properties.id, self.id
            ))),
            Entry::Vacant(entry) => {
                let container = Arc::new(self.build_container(&properties)?);
                self.register(&container);
                entry.insert(Arc::clone(&container));
                Ok(container)
            }
        }
    }

    /// Create a container, or return the existing one of that name
    ///
    /// An existing container with a different partition-key path is a
    /// `Conflict`; its throughput settings are left as they are.
    pub fn create_container_if_not_exists(
        &self,
        properties: ContainerProperties,
    ) -> Result<Arc<Container>> {
        self.ensure_live()?;
        match self.containers.entry(properties.id.clone()) {
            Entry::Occupied(entry) => {
                let existing = entry.get();
                if existing.partition_key_path().to_string() != properties.partition_key_path {
                    return Err(Error::Conflict(format!(
                        "container '{}' exists with partition key path {}",
                        properties.id,
                        existing.partition_key_path()
                    )));
                }
                Ok(Arc::clone(existing))
            }
            Entry::Vacant(entry) => {
                let container = Arc::new(self.build_container(&properties)?);
                self.register(&container);
                entry.insert(Arc::clone(&container));
                Ok(container)
            }
        }
    }

    /// Look up a container
    pub fn container(&self, id: &str) -> Result<Arc<Container>> {
        self.ensure_live()?;
        self.containers
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| Error::UnknownContainer(format!("{}/{}", self.id, id)))
    }

    /// Delete a container and every document in it
    pub fn delete_container(&self, id: &str) -> Result<()> {
        self.ensure_live()?;
        let (_, container) = self
            .containers
            .remove(id)
            .ok_or_else(|| Error::UnknownContainer(format!("{}/{}", self.id, id)))?;
        container.mark_deleted();
        self.sink.record(TelemetryEvent::ContainerDeleted {
            container: container.scope().to_string(),
        });
        Ok(())
    }

    /// Container names, sorted
    pub fn container_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.containers.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Physical partition owning a partition-key value of a container
    pub fn locate(&self, container: &str, partition_key: &PartitionKey) -> Result<PartitionId> {
        self.container(container)?.locate(partition_key)
    }

    /// Snapshot of the shared budget, if provisioned
    pub fn consumed_throughput(&self) -> Result<Option<ThroughputSnapshot>> {
        self.ensure_live()?;
        Ok(self.shared.as_ref().map(|g| g.snapshot()))
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("id", &self.id)
            .field("throughput", &self.throughput())
            .field("containers", &self.container_ids())
            .field("deleted", &self.deleted.load(Ordering::Relaxed))
            .finish()
    }
}

/// Names are non-empty and free of path separators
pub(crate) fn validate_name(kind: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::invalid_operation(format!("{} name must not be empty", kind)));
    }
    if name.contains(['/', '\\', '?', '#']) {
        return Err(Error::invalid_operation(format!(
            "{} name '{}' contains a forbidden character",
            kind, name
        )));
    }
    Ok(())
}
