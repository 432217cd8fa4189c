//! Throughput governance through containers and databases

use crate::common::*;
use partdb::{
    ContainerProperties, Error, Predicate, QueryScope, RequestCharge, TelemetryEvent,
    ThroughputMode,
};

/// Upsert 5 RU writes until the budget throttles; returns writes admitted
fn fill(container: &partdb::Container, prefix: &str) -> usize {
    let mut admitted = 0;
    loop {
        match container.upsert_item(contact(&format!("{}-{}", prefix, admitted), "Will")) {
            Ok(_) => admitted += 1,
            Err(Error::Throttled { .. }) => return admitted,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }
}

#[test]
fn manual_budget_admits_until_capacity_then_resets() {
    let env = TestEnv::new();
    let c = env.container("/ContactName", 400);

    assert_eq!(fill(&c, "a"), 80);
    let snapshot = c.consumed_throughput().unwrap();
    assert_eq!(snapshot.consumed, RequestCharge::from_units(400));
    assert_eq!(snapshot.capacity, RequestCharge::from_units(400));

    let err = c.upsert_item(contact("late", "Will")).unwrap_err();
    assert!(err.is_retryable());
    let retry_after = err.retry_after().unwrap();
    assert!(retry_after <= env.client.config().throughput_interval());
    assert!(c.read_item(&"Will".into(), "late").is_err());

    env.next_interval();
    assert!(c.consumed_throughput().unwrap().consumed.is_zero());
    c.upsert_item(contact("late", "Will")).unwrap();
    assert_eq!(
        c.consumed_throughput().unwrap().consumed,
        RequestCharge::from_units(5)
    );
}

#[test]
fn database_budget_is_shared_by_containers() {
    let env = TestEnv::new();
    let db = env.database("shared", 10);
    let a = db
        .create_container(ContainerProperties::new("a", "/ContactName"))
        .unwrap();
    let b = db
        .create_container(ContainerProperties::new("b", "/ContactName"))
        .unwrap();
    let own = db
        .create_container(
            ContainerProperties::new("own", "/ContactName")
                .with_throughput(ThroughputMode::manual(10)),
        )
        .unwrap();

    a.upsert_item(contact("1", "Will")).unwrap();
    b.upsert_item(contact("2", "Will")).unwrap();
    assert!(matches!(
        a.upsert_item(contact("3", "Will")),
        Err(Error::Throttled { .. })
    ));
    own.upsert_item(contact("4", "Will")).unwrap();

    let shared = db.consumed_throughput().unwrap().unwrap();
    assert_eq!(shared.consumed, RequestCharge::from_units(10));
    assert_eq!(a.consumed_throughput().unwrap(), shared);
}

#[test]
fn autoscale_scales_up_strictly_then_decays_to_floor() {
    let env = TestEnv::new();
    let db = env.client.create_database("auto", None).unwrap();
    let c = db
        .create_container(
            ContainerProperties::new("c", "/ContactName")
                .with_throughput(ThroughputMode::autoscale(4000)),
        )
        .unwrap();
    let floor = RequestCharge::from_units(400);
    let max = RequestCharge::from_units(4000);

    let mut capacities = vec![c.consumed_throughput().unwrap().capacity];
    assert_eq!(capacities[0], floor);
    for round in 0..6 {
        fill(&c, &format!("r{}", round));
        env.next_interval();
        capacities.push(c.consumed_throughput().unwrap().capacity);
    }

    for pair in capacities.windows(2) {
        assert!(pair[1] >= pair[0]);
        assert!(pair[1] > pair[0] || pair[1] == max);
    }
    assert!(capacities.iter().all(|cap| *cap >= floor && *cap <= max));
    assert_eq!(*capacities.last().unwrap(), max);

    env.clock
        .advance(env.client.config().throughput_interval() * 30);
    assert_eq!(c.consumed_throughput().unwrap().capacity, floor);

    let changes = env
        .sink
        .matching(|e| matches!(e, TelemetryEvent::CapacityChanged { .. }));
    assert!(!changes.is_empty());
}

#[test]
fn throttled_query_scans_nothing() {
    let env = TestEnv::new();
    let c = env.container("/CityName", 10);
    c.upsert_item(hotel("h1", "Auckland", 2)).unwrap();
    c.upsert_item(hotel("h2", "Auckland", 3)).unwrap();

    let err = c
        .query(Predicate::all(), QueryScope::partition("Auckland"))
        .unwrap_err();
    assert!(matches!(err, Error::Throttled { .. }));
    assert_eq!(c.throughput_stats().throttled, 1);
    assert_eq!(c.throughput_stats().admitted, 2);
}

#[test]
fn telemetry_records_admissions_and_throttles() {
    let env = TestEnv::new();
    let c = env.container("/ContactName", 5);
    c.upsert_item(contact("1", "Will")).unwrap();
    let _ = c.upsert_item(contact("2", "Will"));

    let admitted = env
        .sink
        .matching(|e| matches!(e, TelemetryEvent::Admitted { .. }));
    let throttled = env
        .sink
        .matching(|e| matches!(e, TelemetryEvent::Throttled { .. }));
    assert_eq!(admitted.len(), 1);
    assert_eq!(throttled.len(), 1);
}
