//! Admission is exact under contention

use crate::common::*;
use partdb::{Error, RequestCharge};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn concurrent_writers_never_exceed_capacity() {
    let env = TestEnv::new();
    let c = env.container("/ContactName", 500);
    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));
    let admitted = Arc::new(AtomicU64::new(0));
    let throttled = Arc::new(AtomicU64::new(0));

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let c = Arc::clone(&c);
            let barrier = Arc::clone(&barrier);
            let admitted = Arc::clone(&admitted);
            let throttled = Arc::clone(&throttled);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..50 {
                    match c.upsert_item(contact(&format!("t{}-{}", t, i), "Will")) {
                        Ok(_) => admitted.fetch_add(1, Ordering::Relaxed),
                        Err(Error::Throttled { .. }) => throttled.fetch_add(1, Ordering::Relaxed),
                        Err(e) => panic!("unexpected error: {}", e),
                    };
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    // 500 RU at 5 RU per write
    assert_eq!(admitted.load(Ordering::Relaxed), 100);
    assert_eq!(throttled.load(Ordering::Relaxed), 300);
    assert_eq!(c.count().unwrap(), 100);
    assert_eq!(
        c.consumed_throughput().unwrap().consumed,
        RequestCharge::from_units(500)
    );
    let stats = c.throughput_stats();
    assert_eq!((stats.admitted, stats.throttled), (100, 300));
}
