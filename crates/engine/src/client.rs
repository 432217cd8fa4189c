//! Client: entry point owning databases, configuration, clock and telemetry
//!
//! ```ignore
//! use partdb_engine::{Client, ContainerProperties, ThroughputMode};
//!
//! // 1. Defaults, wall clock, tracing telemetry
//! let client = Client::new()?;
//!
//! // 2. Builder for config file, clock or sink overrides
//! let client = Client::builder()
//!     .config_file("partdb.toml")
//!     .clock(clock)
//!     .open()?;
//!
//! let db = client.create_database_if_not_exists("hotels", Some(ThroughputMode::manual(400)))?;
//! let c = db.create_container_if_not_exists(ContainerProperties::new("byCity", "/CityName"))?;
//! ```

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use partdb_core::{Clock, Error, Result, SystemClock, ThroughputMode};
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::database::Database;
use crate::telemetry::{TelemetryEvent, TelemetrySink, TracingSink};

// ============================================================================
// Client Builder
// ============================================================================

/// Builder for a [`Client`]
#[derive(Default)]
pub struct ClientBuilder {
    config: Option<EngineConfig>,
    config_file: Option<PathBuf>,
    clock: Option<Arc<dyn Clock>>,
    sink: Option<Arc<dyn TelemetrySink>>,
}

impl ClientBuilder {
    /// Create new builder with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an explicit configuration
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Load configuration from a TOML file, written with defaults if missing
    pub fn config_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Clock driving throughput intervals
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Telemetry destination
    pub fn telemetry(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Validate the configuration and build the client
    ///
    /// An explicit `config` wins over `config_file`.
    pub fn open(self) -> Result<Client> {
        let config = match (self.config, self.config_file) {
            (Some(config), _) => config,
            (None, Some(path)) => {
                EngineConfig::write_default_if_missing(&path)?;
                EngineConfig::from_file(&path)?
            }
            (None, None) => EngineConfig::default(),
        };
        config.validate()?;
        Ok(Client {
            databases: DashMap::new(),
            config: Arc::new(config),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            sink: self.sink.unwrap_or_else(|| Arc::new(TracingSink)),
        })
    }
}

// ============================================================================
// Client
// ============================================================================

/// Owns every database of one store instance
pub struct Client {
    databases: DashMap<String, Arc<Database>>,
    config: Arc<EngineConfig>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn TelemetrySink>,
}

impl Client {
    /// Client with default configuration
    pub fn new() -> Result<Self> {
        ClientBuilder::new().open()
    }

    /// Client with an explicit configuration
    pub fn with_config(config: EngineConfig) -> Result<Self> {
        ClientBuilder::new().config(config).open()
    }

    /// Start configuring a client
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Active configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn build_database(&self, id: &str, throughput: Option<ThroughputMode>) -> Result<Database> {
        let db = Database::new(
            id.to_string(),
            throughput,
            Arc::clone(&self.config),
            Arc::clone(&self.clock),
            Arc::clone(&self.sink),
        )?;
        self.sink.record(TelemetryEvent::DatabaseCreated {
            database: id.to_string(),
        });
        Ok(db)
    }

    /// Create a database; fails with `Conflict` if the name is taken
    ///
    /// `throughput` provisions a budget shared by every container that has
    /// none of its own.
    pub fn create_database(
        &self,
        id: &str,
        throughput: Option<ThroughputMode>,
    ) -> Result<Arc<Database>> {
        match self.databases.entry(id.to_string()) {
            Entry::Occupied(_) => Err(Error::Conflict(format!("database '{}' already exists", id))),
            Entry::Vacant(entry) => {
                let db = Arc::new(self.build_database(id, throughput)?);
                entry.insert(Arc::clone(&db));
                Ok(db)
            }
        }
    }

    /// Create a database, or return the existing one of that name
    ///
    /// An existing database keeps its throughput settings.
    pub fn create_database_if_not_exists(
        &self,
        id: &str,
        throughput: Option<ThroughputMode>,
    ) -> Result<Arc<Database>> {
        match self.databases.entry(id.to_string()) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let db = Arc::new(self.build_database(id, throughput)?);
                entry.insert(Arc::clone(&db));
                Ok(db)
            }
        }
    }

    /// Look up a database
    pub fn database(&self, id: &str) -> Result<Arc<Database>> {
        self.databases
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| Error::UnknownDatabase(id.to_string()))
    }

    /// Delete a database with all its containers
    pub fn delete_database(&self, id: &str) -> Result<()> {
        let (_, db) = self
            .databases
            .remove(id)
            .ok_or_else(|| Error::UnknownDatabase(id.to_string()))?;
        db.mark_deleted();
        self.sink.record(TelemetryEvent::DatabaseDeleted {
            database: id.to_string(),
        });
        Ok(())
    }

    /// Database names, sorted
    pub fn database_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.databases.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("databases", &self.database_ids())
            .field("config", &self.config)
            .finish()
    }
}
