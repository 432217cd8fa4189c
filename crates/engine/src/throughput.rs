//! Throughput governor
//!
//! Each budget (a container's own, or a database's shared one) is guarded by
//! a [`ThroughputGovernor`]. Requests are admitted against the capacity of
//! the current interval:
//!
//! - Manual: admit while `consumed + cost <= capacity`
//! - Autoscale: same check against an effective capacity that floats
//!   between `max / 10` and `max`, re-evaluated at every interval boundary
//!
//! Interval boundaries reset `consumed`; nothing carries over. Throttling
//! never queues: a denied request gets the time left in the interval.
//!
//! # Thread Safety
//!
//! Check-then-increment happens under one `parking_lot::Mutex`. Running
//! totals are `Relaxed` atomics, read without the lock.

use parking_lot::Mutex;
use partdb_core::{Clock, Error, RequestCharge, Result, ThroughputMode};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::AutoscaleConfig;
use crate::telemetry::{TelemetryEvent, TelemetrySink};

/// Utilization above which autoscale steps capacity up
pub const SCALE_UP_UTILIZATION: f64 = 0.9;

/// Idle intervals evaluated at most per rollover
const MAX_ROLLOVER_STEPS: u128 = 1024;

/// Admission decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Cost has been added to the current interval
    Admitted,
    /// Budget exhausted; retry after the interval ends
    Throttled {
        /// Time left in the current interval
        retry_after: Duration,
    },
}

impl Admission {
    /// True if admitted
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted)
    }

    /// Convert a throttle decision into `Error::Throttled`
    pub fn into_result(self) -> Result<()> {
        match self {
            Admission::Admitted => Ok(()),
            Admission::Throttled { retry_after } => Err(Error::Throttled { retry_after }),
        }
    }
}

/// Point-in-time view of a budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThroughputSnapshot {
    /// Provisioned mode
    pub mode: ThroughputMode,
    /// Cost consumed in the current interval
    pub consumed: RequestCharge,
    /// Effective capacity of the current interval
    pub capacity: RequestCharge,
    /// Time until the interval ends
    pub interval_remaining: Duration,
}

/// Lifetime totals of a governor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GovernorStats {
    /// Requests admitted
    pub admitted: u64,
    /// Requests throttled
    pub throttled: u64,
    /// Total cost charged
    pub charged: RequestCharge,
}

struct IntervalState {
    start: Instant,
    consumed: RequestCharge,
    capacity: RequestCharge,
    quiet_intervals: u32,
}

/// Admits or throttles requests against one throughput budget
pub struct ThroughputGovernor {
    scope: String,
    mode: ThroughputMode,
    interval: Duration,
    autoscale: AutoscaleConfig,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn TelemetrySink>,
    state: Mutex<IntervalState>,
    total_admitted: AtomicU64,
    total_throttled: AtomicU64,
    total_charged_milli: AtomicU64,
}

impl ThroughputGovernor {
    /// Create a governor for `scope`
    ///
    /// Autoscale budgets start at their floor.
    pub fn new(
        scope: impl Into<String>,
        mode: ThroughputMode,
        interval: Duration,
        autoscale: AutoscaleConfig,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn TelemetrySink>,
    ) -> Result<Self> {
        mode.validate()?;
        if interval.is_zero() {
            return Err(Error::invalid_operation(
                "throughput interval must be greater than zero",
            ));
        }
        let start = clock.now();
        Ok(ThroughputGovernor {
            scope: scope.into(),
            mode,
            interval,
            autoscale,
            clock,
            sink,
            state: Mutex::new(IntervalState {
                start,
                consumed: RequestCharge::ZERO,
                capacity: mode.floor_capacity(),
                quiet_intervals: 0,
            }),
            total_admitted: AtomicU64::new(0),
            total_throttled: AtomicU64::new(0),
            total_charged_milli: AtomicU64::new(0),
        })
    }

    /// Budget owner, used in telemetry
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Provisioned mode
    pub fn mode(&self) -> ThroughputMode {
        self.mode
    }

    /// Admit `cost` if the current interval has room for it
    pub fn admit(&self, cost: RequestCharge) -> Admission {
        let now = self.clock.now();
        let mut state = self.state.lock();
        self.roll_over(&mut state, now);

        if state.consumed + cost <= state.capacity {
            state.consumed += cost;
            drop(state);
            self.total_admitted.fetch_add(1, Ordering::Relaxed);
            self.total_charged_milli
                .fetch_add(cost.milli(), Ordering::Relaxed);
            self.sink.record(TelemetryEvent::Admitted {
                scope: self.scope.clone(),
                charge: cost,
            });
            Admission::Admitted
        } else {
            let retry_after = self.remaining(&state, now);
            drop(state);
            self.total_throttled.fetch_add(1, Ordering::Relaxed);
            self.sink.record(TelemetryEvent::Throttled {
                scope: self.scope.clone(),
                charge: cost,
                retry_after,
            });
            Admission::Throttled { retry_after }
        }
    }

    /// `admit`, with throttling as `Error::Throttled`
    pub fn try_admit(&self, cost: RequestCharge) -> Result<()> {
        self.admit(cost).into_result()
    }

    /// Replace an admitted estimate with the actual cost
    ///
    /// The difference is applied to the current interval. An overrun may
    /// push `consumed` past capacity; later requests in the interval are
    /// then throttled.
    pub fn reconcile(&self, estimated: RequestCharge, actual: RequestCharge) {
        if estimated == actual {
            return;
        }
        let now = self.clock.now();
        let mut state = self.state.lock();
        self.roll_over(&mut state, now);
        if actual > estimated {
            let extra = actual.saturating_sub(estimated);
            state.consumed += extra;
            self.total_charged_milli
                .fetch_add(extra.milli(), Ordering::Relaxed);
        } else {
            let refund = estimated.saturating_sub(actual);
            state.consumed = state.consumed.saturating_sub(refund);
            let _ = self.total_charged_milli.fetch_update(
                Ordering::Relaxed,
                Ordering::Relaxed,
                |v| Some(v.saturating_sub(refund.milli())),
            );
        }
    }

    /// Consumed cost, capacity and time left in the current interval
    pub fn snapshot(&self) -> ThroughputSnapshot {
        let now = self.clock.now();
        let mut state = self.state.lock();
        self.roll_over(&mut state, now);
        ThroughputSnapshot {
            mode: self.mode,
            consumed: state.consumed,
            capacity: state.capacity,
            interval_remaining: self.remaining(&state, now),
        }
    }

    /// Lifetime totals
    pub fn stats(&self) -> GovernorStats {
        GovernorStats {
            admitted: self.total_admitted.load(Ordering::Relaxed),
            throttled: self.total_throttled.load(Ordering::Relaxed),
            charged: RequestCharge::from_milli(self.total_charged_milli.load(Ordering::Relaxed)),
        }
    }

    fn remaining(&self, state: &IntervalState, now: Instant) -> Duration {
        (state.start + self.interval).saturating_duration_since(now)
    }

    /// Close every interval that ended before `now`
    fn roll_over(&self, state: &mut IntervalState, now: Instant) {
        let elapsed = now.saturating_duration_since(state.start);
        if elapsed < self.interval {
            return;
        }
        let interval_nanos = self.interval.as_nanos();
        let closed = elapsed.as_nanos() / interval_nanos;
        let into_current = elapsed.as_nanos() % interval_nanos;
        state.start = now - Duration::from_nanos(into_current as u64);

        if self.mode.is_autoscale() {
            let before = state.capacity;
            let last = state.consumed;
            self.evaluate(state, last);
            for _ in 1..closed.min(MAX_ROLLOVER_STEPS) {
                self.evaluate(state, RequestCharge::ZERO);
            }
            if state.capacity != before {
                self.sink.record(TelemetryEvent::CapacityChanged {
                    scope: self.scope.clone(),
                    from: before,
                    to: state.capacity,
                });
            }
        }
        state.consumed = RequestCharge::ZERO;
    }

    /// Adjust autoscale capacity from one closed interval's consumption
    fn evaluate(&self, state: &mut IntervalState, consumed: RequestCharge) {
        let floor = self.mode.floor_capacity().milli();
        let max = self.mode.max_capacity().milli();
        let capacity = state.capacity.milli().max(1);
        let utilization = consumed.milli() as f64 / capacity as f64;

        if utilization > SCALE_UP_UTILIZATION {
            state.quiet_intervals = 0;
            if capacity < max {
                let scaled = (capacity as f64 * self.autoscale.scale_up_factor) as u64;
                state.capacity = RequestCharge::from_milli(scaled.max(capacity + 1).min(max));
            }
        } else if utilization < self.autoscale.low_water_mark {
            state.quiet_intervals += 1;
            if state.quiet_intervals >= self.autoscale.sustained_intervals {
                state.quiet_intervals = 0;
                let scaled = (capacity as f64 * self.autoscale.scale_down_factor) as u64;
                state.capacity = RequestCharge::from_milli(scaled.max(floor));
            }
        } else {
            state.quiet_intervals = 0;
        }
    }
}

impl std::fmt::Debug for ThroughputGovernor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThroughputGovernor")
            .field("scope", &self.scope)
            .field("mode", &self.mode)
            .field("interval", &self.interval)
            .field("stats", &self.stats())
            .finish()
    }
}
