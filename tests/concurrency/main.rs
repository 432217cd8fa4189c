//! Concurrency tests
//!
//! Multi-threaded scenarios for partition locking, batch atomicity under
//! concurrent readers and governor admission under contention.

#[path = "../common/mod.rs"]
mod common;

mod batch_isolation;
mod governor_contention;
mod id_uniqueness;
