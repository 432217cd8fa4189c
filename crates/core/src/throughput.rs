//! Provisioned throughput settings
//!
//! A container (or a database shared by several containers) is provisioned
//! either with a fixed manual capacity or with an autoscale maximum. The
//! autoscale floor is a tenth of the maximum.

use serde::{Deserialize, Serialize};

use crate::charge::RequestCharge;
use crate::error::{Error, Result};

/// Ratio between the autoscale maximum and its floor
pub const AUTOSCALE_FLOOR_RATIO: u64 = 10;

/// Largest capacity whose milli-RU value fits in a `u64`
pub const MAX_CAPACITY: u64 = u64::MAX / 1000;

/// How a throughput budget is provisioned, in request units per interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ThroughputMode {
    /// Fixed capacity
    Manual {
        /// Request units per interval
        capacity: u64,
    },
    /// Capacity floating between `max_capacity / 10` and `max_capacity`
    Autoscale {
        /// Upper bound in request units per interval
        max_capacity: u64,
    },
}

impl ThroughputMode {
    /// Manual throughput with the given capacity
    pub fn manual(capacity: u64) -> Self {
        ThroughputMode::Manual { capacity }
    }

    /// Autoscale throughput with the given maximum
    pub fn autoscale(max_capacity: u64) -> Self {
        ThroughputMode::Autoscale { max_capacity }
    }

    /// Reject zero capacities and capacities beyond [`MAX_CAPACITY`]
    pub fn validate(&self) -> Result<()> {
        let units = match *self {
            ThroughputMode::Manual { capacity } => capacity,
            ThroughputMode::Autoscale { max_capacity } => max_capacity,
        };
        if units > MAX_CAPACITY {
            return Err(Error::invalid_operation(format!(
                "throughput capacity {} exceeds the maximum of {}",
                units, MAX_CAPACITY
            )));
        }
        match self {
            ThroughputMode::Manual { capacity: 0 } => Err(Error::invalid_operation(
                "manual throughput capacity must be greater than zero",
            )),
            ThroughputMode::Autoscale { max_capacity } if *max_capacity < AUTOSCALE_FLOOR_RATIO => {
                Err(Error::invalid_operation(format!(
                    "autoscale max capacity must be at least {}",
                    AUTOSCALE_FLOOR_RATIO
                )))
            }
            _ => Ok(()),
        }
    }

    /// Highest capacity this mode can reach
    pub fn max_capacity(&self) -> RequestCharge {
        match self {
            ThroughputMode::Manual { capacity } => RequestCharge::from_units(*capacity),
            ThroughputMode::Autoscale { max_capacity } => RequestCharge::from_units(*max_capacity),
        }
    }

    /// Lowest capacity this mode can fall to
    pub fn floor_capacity(&self) -> RequestCharge {
        match self {
            ThroughputMode::Manual { capacity } => RequestCharge::from_units(*capacity),
            ThroughputMode::Autoscale { max_capacity } => {
                RequestCharge::from_milli(max_capacity.saturating_mul(1000) / AUTOSCALE_FLOOR_RATIO)
            }
        }
    }

    /// True for autoscale
    pub fn is_autoscale(&self) -> bool {
        matches!(self, ThroughputMode::Autoscale { .. })
    }
}
