//! Readers never observe a partial batch

use crate::common::*;
use partdb::{Error, PartitionKey, Predicate, QueryScope};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

const PAIRS: usize = 200;

/// Each batch writes a contact and an address with the same revision;
/// a reader seeing both must see equal revisions.
#[test]
fn point_readers_see_whole_batches() {
    let env = TestEnv::new();
    let c = env.container("/ContactName", 10_000_000);
    c.transactional_batch("Will")
        .upsert_item(contact("contact", "Will").with_field("Rev", 0))
        .upsert_item(contact("address", "Will").with_field("Rev", 0))
        .execute()
        .unwrap();

    let barrier = Arc::new(Barrier::new(3));
    let done = Arc::new(AtomicBool::new(false));
    let torn = Arc::new(AtomicU64::new(0));

    let writer = {
        let c = Arc::clone(&c);
        let barrier = Arc::clone(&barrier);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            barrier.wait();
            for rev in 1..=PAIRS as i64 {
                let response = c
                    .transactional_batch("Will")
                    .upsert_item(contact("contact", "Will").with_field("Rev", rev))
                    .upsert_item(contact("address", "Will").with_field("Rev", rev))
                    .execute()
                    .unwrap();
                assert!(response.is_success());
            }
            done.store(true, Ordering::Release);
        })
    };

    let readers: Vec<_> = (0..2)
        .map(|_| {
            let c = Arc::clone(&c);
            let barrier = Arc::clone(&barrier);
            let done = Arc::clone(&done);
            let torn = Arc::clone(&torn);
            thread::spawn(move || {
                barrier.wait();
                while !done.load(Ordering::Acquire) {
                    let (docs, _) = c
                        .query(Predicate::all(), QueryScope::partition("Will"))
                        .unwrap()
                        .collect_all();
                    let revs: Vec<_> = docs.iter().map(|d| d.get("Rev").cloned()).collect();
                    if revs.len() != 2 || revs[0] != revs[1] {
                        torn.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for r in readers {
        r.join().unwrap();
    }
    assert_eq!(torn.load(Ordering::Relaxed), 0);
}

/// A batch that fails validation is never visible, even transiently
#[test]
fn rejected_batches_are_never_visible() {
    let env = TestEnv::new();
    let c = env.container("/ContactName", 10_000_000);
    c.upsert_item(contact("blocker", "Will")).unwrap();

    let barrier = Arc::new(Barrier::new(2));
    let done = Arc::new(AtomicBool::new(false));
    let leaked = Arc::new(AtomicU64::new(0));

    let writer = {
        let c = Arc::clone(&c);
        let barrier = Arc::clone(&barrier);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            barrier.wait();
            for i in 0..PAIRS {
                let response = c
                    .transactional_batch("Will")
                    .create_item(contact(&format!("ghost-{}", i), "Will"))
                    .create_item(contact("blocker", "Will"))
                    .execute()
                    .unwrap();
                assert!(!response.is_success());
            }
            done.store(true, Ordering::Release);
        })
    };

    let reader = {
        let c = Arc::clone(&c);
        let barrier = Arc::clone(&barrier);
        let done = Arc::clone(&done);
        let leaked = Arc::clone(&leaked);
        thread::spawn(move || {
            barrier.wait();
            while !done.load(Ordering::Acquire) {
                if c.count().unwrap() != 1 {
                    leaked.fetch_add(1, Ordering::Relaxed);
                }
            }
        })
    };

    writer.join().unwrap();
    reader.join().unwrap();
    assert_eq!(leaked.load(Ordering::Relaxed), 0);
    assert_eq!(c.count().unwrap(), 1);
    assert_eq!(c.batch_stats(), (0, PAIRS as u64));
}

/// Ids of a rejected batch are never taken away from writers on other keys
#[test]
fn rejected_batches_never_hold_ids() {
    let env = TestEnv::new();
    let c = env.container("/ContactName", 1_000_000_000_000);
    c.upsert_item(contact("blocker", "Will")).unwrap();

    let barrier = Arc::new(Barrier::new(2));
    let done = Arc::new(AtomicBool::new(false));

    let batcher = {
        let c = Arc::clone(&c);
        let barrier = Arc::clone(&barrier);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            barrier.wait();
            for _ in 0..PAIRS * 5 {
                let response = c
                    .transactional_batch("Will")
                    .create_item(contact("contested", "Will"))
                    .upsert_item(contact("contested-2", "Will"))
                    .create_item(contact("blocker", "Will"))
                    .execute()
                    .unwrap();
                assert!(!response.is_success());
            }
            done.store(true, Ordering::Release);
        })
    };

    let writer = {
        let c = Arc::clone(&c);
        let barrier = Arc::clone(&barrier);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let bob = PartitionKey::from("Bob");
            let mut refused = 0u64;
            barrier.wait();
            while !done.load(Ordering::Acquire) {
                match c.create_item(contact("contested", "Bob")) {
                    Ok(_) => {
                        c.delete_item(&bob, "contested").unwrap();
                    }
                    Err(Error::Conflict(_)) => refused += 1,
                    Err(e) => panic!("unexpected error: {}", e),
                }
                match c.upsert_item(contact("contested-2", "Bob")) {
                    Ok(_) => {
                        c.delete_item(&bob, "contested-2").unwrap();
                    }
                    Err(Error::PartitionKeyMismatch { .. }) => refused += 1,
                    Err(e) => panic!("unexpected error: {}", e),
                }
            }
            refused
        })
    };

    batcher.join().unwrap();
    assert_eq!(writer.join().unwrap(), 0);
    assert_eq!(c.count().unwrap(), 1);
}

/// Batches on different partition keys proceed independently
#[test]
fn parallel_batches_on_distinct_keys() {
    let env = TestEnv::new();
    let c = env.container("/ContactName", 10_000_000);
    let barrier = Arc::new(Barrier::new(4));

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let c = Arc::clone(&c);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let name = format!("user-{}", t);
                barrier.wait();
                for i in 0..25 {
                    c.transactional_batch(name.as_str())
                        .create_item(contact(&format!("{}-a{}", name, i), &name))
                        .create_item(contact(&format!("{}-b{}", name, i), &name))
                        .execute()
                        .unwrap()
                        .into_result()
                        .unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(c.count().unwrap(), 200);
    assert_eq!(c.batch_stats(), (100, 0));
}
