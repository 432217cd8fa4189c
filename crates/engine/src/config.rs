//! Engine configuration via `partdb.toml`
//!
//! Every tunable of the engine lives in [`EngineConfig`]: throughput
//! interval and autoscale behavior, partition fan-out, request costs,
//! query concurrency and batch limits. A missing field takes its default,
//! so an empty file is a valid configuration.

use partdb_core::{Error, RequestCharge, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Config file name
pub const CONFIG_FILE_NAME: &str = "partdb.toml";

/// Autoscale tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoscaleConfig {
    /// Capacity multiplier after a hot interval (> 90% utilization)
    pub scale_up_factor: f64,
    /// Capacity multiplier after a sustained quiet period
    pub scale_down_factor: f64,
    /// Utilization below which an interval counts as quiet
    pub low_water_mark: f64,
    /// Consecutive quiet intervals before scaling down
    pub sustained_intervals: u32,
}

impl Default for AutoscaleConfig {
    fn default() -> Self {
        AutoscaleConfig {
            scale_up_factor: 2.0,
            scale_down_factor: 0.5,
            low_water_mark: 0.3,
            sustained_intervals: 3,
        }
    }
}

/// Request costs, in request units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostConfig {
    /// Point read
    pub point_read: f64,
    /// Point write or delete
    pub point_write: f64,
    /// Per document scanned by a query
    pub scan_per_document: f64,
    /// Per top-level field of a scanned document
    pub scan_per_field: f64,
}

impl Default for CostConfig {
    fn default() -> Self {
        CostConfig {
            point_read: 1.0,
            point_write: 5.0,
            scan_per_document: 0.5,
            scan_per_field: 0.05,
        }
    }
}

impl CostConfig {
    /// Point read cost
    pub fn point_read_charge(&self) -> RequestCharge {
        RequestCharge::from_f64(self.point_read)
    }

    /// Point write cost
    pub fn point_write_charge(&self) -> RequestCharge {
        RequestCharge::from_f64(self.point_write)
    }

    /// Cost of scanning one document with `field_count` fields
    pub fn scan_charge(&self, field_count: usize) -> RequestCharge {
        RequestCharge::from_f64(self.scan_per_document)
            + RequestCharge::from_f64(self.scan_per_field) * field_count as u64
    }
}

/// Cross-partition query execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Partitions scanned concurrently
    pub max_concurrency: usize,
    /// Matching documents buffered ahead of the consumer
    pub max_buffered_item_count: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        QueryConfig {
            max_concurrency: 4,
            max_buffered_item_count: 100,
        }
    }
}

/// Engine configuration loaded from `partdb.toml`.
///
/// # Example
///
/// ```toml
/// throughput_interval_ms = 1000
/// partitions_per_container = 16
/// max_batch_operations = 100
///
/// [autoscale]
/// scale_up_factor = 2.0
///
/// [costs]
/// point_write = 5.0
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Length of one throughput interval in milliseconds
    pub throughput_interval_ms: u64,
    /// Physical partitions per container, fixed at container creation
    pub partitions_per_container: u32,
    /// Maximum operations per transactional batch
    pub max_batch_operations: usize,
    /// Autoscale tuning
    pub autoscale: AutoscaleConfig,
    /// Request costs
    pub costs: CostConfig,
    /// Query execution
    pub query: QueryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            throughput_interval_ms: 1000,
            partitions_per_container: 16,
            max_batch_operations: 100,
            autoscale: AutoscaleConfig::default(),
            costs: CostConfig::default(),
            query: QueryConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Throughput interval as a `Duration`
    pub fn throughput_interval(&self) -> Duration {
        Duration::from_millis(self.throughput_interval_ms)
    }

    /// Check that every value is in range.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(Error::invalid_operation(msg.to_string()));

        if self.throughput_interval_ms == 0 {
            return fail("throughput_interval_ms must be greater than zero");
        }
        if self.partitions_per_container == 0 {
            return fail("partitions_per_container must be greater than zero");
        }
        if self.max_batch_operations == 0 {
            return fail("max_batch_operations must be greater than zero");
        }

        let a = &self.autoscale;
        if !(a.scale_up_factor > 1.0) || !a.scale_up_factor.is_finite() {
            return fail("autoscale.scale_up_factor must be greater than 1");
        }
        if !(a.scale_down_factor > 0.0 && a.scale_down_factor < 1.0) {
            return fail("autoscale.scale_down_factor must be between 0 and 1");
        }
        if !(a.low_water_mark >= 0.0 && a.low_water_mark < 0.9) {
            return fail("autoscale.low_water_mark must be in [0, 0.9)");
        }
        if a.sustained_intervals == 0 {
            return fail("autoscale.sustained_intervals must be greater than zero");
        }

        let c = &self.costs;
        for (name, value) in [
            ("costs.point_read", c.point_read),
            ("costs.point_write", c.point_write),
            ("costs.scan_per_document", c.scan_per_document),
            ("costs.scan_per_field", c.scan_per_field),
        ] {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(Error::invalid_operation(format!(
                    "{} must be a non-negative number",
                    name
                )));
            }
        }

        if self.query.max_concurrency == 0 {
            return fail("query.max_concurrency must be greater than zero");
        }
        if self.query.max_buffered_item_count == 0 {
            return fail("query.max_buffered_item_count must be greater than zero");
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# PartDB engine configuration

# Length of one throughput interval (default: 1000 ms)
throughput_interval_ms = 1000

# Physical partitions per container, fixed when the container is created
partitions_per_container = 16

# Maximum operations in one transactional batch
max_batch_operations = 100

[autoscale]
# Multiplier applied after an interval above 90% utilization
scale_up_factor = 2.0
# Multiplier applied after a sustained quiet period
scale_down_factor = 0.5
# Utilization below which an interval counts as quiet
low_water_mark = 0.3
# Quiet intervals in a row before scaling down
sustained_intervals = 3

[costs]
# Request units per operation
point_read = 1.0
point_write = 5.0
# Query cost per scanned document, plus per top-level field
scan_per_document = 0.5
scan_per_field = 0.05

[query]
# Partitions scanned in parallel by a cross-partition query
max_concurrency = 4
# Documents buffered ahead of the consumer
max_buffered_item_count = 100
"#
    }

    /// Parse and validate config from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate config from a file path.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the file cannot be read or parsed, and
    /// `InvalidOperation` if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: EngineConfig = toml::from_str(&content).map_err(|e| {
            Error::Config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                Error::Config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            Error::Config(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}
