//! Container-wide id uniqueness under racing creates

use crate::common::*;
use partdb::Error;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn one_create_wins_per_id() {
    let env = TestEnv::new();
    let c = env.container("/ContactName", 10_000_000);
    let threads = 6;
    let barrier = Arc::new(Barrier::new(threads));
    let wins = Arc::new(AtomicU64::new(0));

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let c = Arc::clone(&c);
            let barrier = Arc::clone(&barrier);
            let wins = Arc::clone(&wins);
            thread::spawn(move || {
                let owner = format!("owner-{}", t);
                barrier.wait();
                for i in 0..50 {
                    match c.create_item(contact(&format!("shared-{}", i), &owner)) {
                        Ok(_) => {
                            wins.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(Error::Conflict(_)) | Err(Error::PartitionKeyMismatch { .. }) => {}
                        Err(e) => panic!("unexpected error: {}", e),
                    }
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(wins.load(Ordering::Relaxed), 50);
    assert_eq!(c.count().unwrap(), 50);
}
