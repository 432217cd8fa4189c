//! Transactional batches through containers

use crate::common::*;
use partdb::{BatchOperation, Error, OperationStatus, PartitionKey, RequestCharge};

#[test]
fn contact_and_address_commit_together() {
    let env = TestEnv::new();
    let c = env.container("/ContactName", 10_000);

    let response = c
        .transactional_batch("Will")
        .create_item(contact("contact-will", "Will").with_field("Email", "will@example.com"))
        .create_item(contact("address-will", "Will").with_field("City", "Seattle"))
        .execute()
        .unwrap();
    assert!(response.is_success());
    assert_eq!(response.request_charge, RequestCharge::from_units(10));

    let outcome = response.into_result().unwrap();
    let version = outcome.commit_version.unwrap();
    for id in ["contact-will", "address-will"] {
        let read = c.read_item(&"Will".into(), id).unwrap();
        assert_eq!(read.version, version);
    }
}

#[test]
fn failing_middle_operation_leaves_nothing_visible() {
    let env = TestEnv::new();
    let c = env.container("/ContactName", 10_000);
    let key = PartitionKey::from("Will");

    let response = c
        .transactional_batch("Will")
        .create_item(contact("one", "Will"))
        .replace_item(contact("missing", "Will"))
        .create_item(contact("three", "Will"))
        .execute()
        .unwrap();

    assert!(!response.is_success());
    let statuses: Vec<_> = response.results().iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![
            OperationStatus::NotApplied,
            OperationStatus::NotFound,
            OperationStatus::NotApplied
        ]
    );
    assert_eq!(
        response.results()[0].resource.as_ref().map(|d| d.id()),
        Some("one")
    );
    assert_eq!(response.outcome.failed_operation_index(), Some(1));
    for id in ["one", "missing", "three"] {
        assert!(matches!(c.read_item(&key, id), Err(Error::NotFound(_))));
    }
    assert_eq!(c.count().unwrap(), 0);
}

#[test]
fn later_operations_see_earlier_staged_effects() {
    let env = TestEnv::new();
    let c = env.container("/ContactName", 10_000);

    let response = c
        .transactional_batch("Will")
        .create_item(contact("c1", "Will").with_field("Step", 1))
        .replace_item(contact("c1", "Will").with_field("Step", 2))
        .read_item("c1")
        .delete_item("c1")
        .create_item(contact("c1", "Will").with_field("Step", 3))
        .execute()
        .unwrap();

    assert!(response.is_success());
    let read_back = response.results()[2].resource.as_ref().unwrap();
    assert_eq!(read_back.get("Step"), Some(&serde_json::json!(2)));

    let stored = c.read_item(&"Will".into(), "c1").unwrap();
    assert_eq!(stored.resource.get("Step"), Some(&serde_json::json!(3)));
}

#[test]
fn if_match_mismatch_conflicts() {
    let env = TestEnv::new();
    let c = env.container("/ContactName", 10_000);
    let written = c.upsert_item(contact("c1", "Will")).unwrap();

    let stale = c
        .transactional_batch("Will")
        .replace_item_if_match(contact("c1", "Will").with_field("x", 1), written.version + 100)
        .execute()
        .unwrap();
    assert_eq!(stale.results()[0].status, OperationStatus::Conflict);

    let fresh = c
        .transactional_batch("Will")
        .delete_item_if_match("c1", written.version)
        .execute()
        .unwrap();
    assert!(fresh.is_success());
    assert_eq!(c.count().unwrap(), 0);
}

#[test]
fn foreign_partition_key_fails_whole_batch() {
    let env = TestEnv::new();
    let c = env.container("/ContactName", 10_000);

    let err = c
        .execute_batch(
            &"Will".into(),
            &[
                BatchOperation::Create(contact("a", "Will")),
                BatchOperation::Create(contact("b", "Bob")),
            ],
        )
        .unwrap_err();
    assert!(matches!(err, Error::PartitionKeyMismatch { .. }));
    assert_eq!(c.count().unwrap(), 0);
}

#[test]
fn batch_size_limits() {
    let env = TestEnv::new();
    let c = env.container("/ContactName", 100_000);

    assert!(matches!(
        c.execute_batch(&"Will".into(), &[]),
        Err(Error::InvalidOperation(_))
    ));

    let limit = env.client.config().max_batch_operations;
    let ops: Vec<_> = (0..=limit)
        .map(|i| BatchOperation::Upsert(contact(&format!("c{}", i), "Will")))
        .collect();
    assert!(matches!(
        c.execute_batch(&"Will".into(), &ops),
        Err(Error::InvalidOperation(_))
    ));
    assert!(c.execute_batch(&"Will".into(), &ops[..limit]).unwrap().is_success());
    assert_eq!(c.count().unwrap(), limit);
}

#[test]
fn throttled_batch_applies_nothing() {
    let env = TestEnv::new();
    let c = env.container("/ContactName", 12);

    let err = c
        .transactional_batch("Will")
        .create_item(contact("a", "Will"))
        .create_item(contact("b", "Will"))
        .create_item(contact("c", "Will"))
        .execute()
        .unwrap_err();
    assert!(matches!(err, Error::Throttled { .. }));
    assert_eq!(c.count().unwrap(), 0);
}
