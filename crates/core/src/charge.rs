//! Request charges
//!
//! Every operation costs request units (RU). Charges are carried as integer
//! milli-RU so that sums over partitions are exact; `as_units` converts for
//! display.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul};

/// Cost of an operation in milli request units
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RequestCharge(u64);

impl RequestCharge {
    /// Zero cost
    pub const ZERO: RequestCharge = RequestCharge(0);

    /// Charge from milli-RU
    pub const fn from_milli(milli: u64) -> Self {
        RequestCharge(milli)
    }

    /// Charge from whole request units, saturating at `u64::MAX` milli-RU
    pub const fn from_units(units: u64) -> Self {
        RequestCharge(units.saturating_mul(1000))
    }

    /// Charge from fractional request units, rounded to the nearest milli-RU
    pub fn from_f64(units: f64) -> Self {
        if units <= 0.0 || !units.is_finite() {
            return RequestCharge::ZERO;
        }
        RequestCharge((units * 1000.0).round() as u64)
    }

    /// Raw milli-RU
    pub const fn milli(self) -> u64 {
        self.0
    }

    /// Fractional request units
    pub fn as_units(self) -> f64 {
        self.0 as f64 / 1000.0
    }

    /// Subtraction clamped at zero
    pub fn saturating_sub(self, other: RequestCharge) -> Self {
        RequestCharge(self.0.saturating_sub(other.0))
    }

    /// True if no cost
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl Add for RequestCharge {
    type Output = RequestCharge;

    fn add(self, rhs: RequestCharge) -> RequestCharge {
        RequestCharge(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for RequestCharge {
    fn add_assign(&mut self, rhs: RequestCharge) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl Mul<u64> for RequestCharge {
    type Output = RequestCharge;

    fn mul(self, rhs: u64) -> RequestCharge {
        RequestCharge(self.0.saturating_mul(rhs))
    }
}

impl Sum for RequestCharge {
    fn sum<I: Iterator<Item = RequestCharge>>(iter: I) -> Self {
        iter.fold(RequestCharge::ZERO, |acc, c| acc + c)
    }
}

impl fmt::Display for RequestCharge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} RU", self.as_units())
    }
}
