//! Shared test utilities for the integration suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's main.rs.

#![allow(dead_code)]

use partdb::{
    Client, Container, ContainerProperties, Database, Document, EngineConfig, ManualClock,
    MemorySink, ThroughputMode,
};
use std::sync::{Arc, Once};
use std::time::Duration;

static INIT_TRACING: Once = Once::new();

/// Route engine logs to the test harness; `RUST_LOG` filters them
fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// TestEnv - client on a manual clock with recorded telemetry
// ============================================================================

/// Client whose throughput intervals only move when the test advances them
pub struct TestEnv {
    pub client: Client,
    pub clock: Arc<ManualClock>,
    pub sink: Arc<MemorySink>,
}

impl TestEnv {
    /// Default configuration
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Explicit configuration
    pub fn with_config(config: EngineConfig) -> Self {
        init_tracing();
        let clock = Arc::new(ManualClock::new());
        let sink = Arc::new(MemorySink::new());
        let client = Client::builder()
            .config(config)
            .clock(clock.clone())
            .telemetry(sink.clone())
            .open()
            .expect("client");
        TestEnv {
            client,
            clock,
            sink,
        }
    }

    /// Database with shared manual throughput
    pub fn database(&self, name: &str, capacity: u64) -> Arc<Database> {
        self.client
            .create_database(name, Some(ThroughputMode::manual(capacity)))
            .expect("database")
    }

    /// Container with dedicated manual throughput
    pub fn container(&self, key_path: &str, capacity: u64) -> Arc<Container> {
        let db = self
            .client
            .create_database_if_not_exists("test", None)
            .expect("database");
        let name = format!("c{}", db.container_ids().len());
        db.create_container(
            ContainerProperties::new(name, key_path).with_throughput(ThroughputMode::manual(capacity)),
        )
        .expect("container")
    }

    /// Move past the end of the current throughput interval
    pub fn next_interval(&self) {
        self.clock
            .advance(self.client.config().throughput_interval() + Duration::from_millis(1));
    }
}

// ============================================================================
// Documents
// ============================================================================

/// Hotel document partitioned by `/CityName`
pub fn hotel(id: &str, city: &str, star_rating: i64) -> Document {
    Document::new(id)
        .with_field("Name", format!("Hotel {}", id))
        .with_field("CityName", city)
        .with_field("StarRating", star_rating)
}

/// Three Auckland hotels (ratings 2, 4, 1) and two London hotels (5, 2)
pub fn seed_hotels(container: &Container) {
    for doc in [
        hotel("akl-1", "Auckland", 2),
        hotel("akl-2", "Auckland", 4),
        hotel("akl-3", "Auckland", 1),
        hotel("lon-1", "London", 5),
        hotel("lon-2", "London", 2),
    ] {
        container.upsert_item(doc).expect("seed hotel");
    }
}

/// Contact document partitioned by `/ContactName`
pub fn contact(id: &str, name: &str) -> Document {
    Document::new(id).with_field("ContactName", name)
}

/// Sorted ids of a result set
pub fn ids(docs: &[Document]) -> Vec<String> {
    let mut ids: Vec<String> = docs.iter().map(|d| d.id().to_string()).collect();
    ids.sort();
    ids
}
