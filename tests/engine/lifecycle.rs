//! Database and container lifecycle

use crate::common::*;
use partdb::{ContainerProperties, Error, TelemetryEvent, ThroughputMode};

#[test]
fn idempotent_setup_like_repeated_startup() {
    let env = TestEnv::new();
    for _ in 0..3 {
        let db = env
            .client
            .create_database_if_not_exists("Contacts", Some(ThroughputMode::manual(400)))
            .unwrap();
        db.create_container_if_not_exists(ContainerProperties::new("Contacts", "/ContactName"))
            .unwrap();
    }
    assert_eq!(env.client.database_ids(), vec!["Contacts".to_string()]);
    let created = env
        .sink
        .matching(|e| matches!(e, TelemetryEvent::ContainerCreated { .. }));
    assert_eq!(created.len(), 1);
}

#[test]
fn deleted_container_loses_documents() {
    let env = TestEnv::new();
    let db = env.database("db", 400);
    let c = db
        .create_container(ContainerProperties::new("c", "/CityName"))
        .unwrap();
    seed_hotels(&c);
    db.delete_container("c").unwrap();

    assert!(matches!(c.upsert_item(hotel("x", "Oslo", 1)), Err(Error::UnknownContainer(_))));
    assert!(matches!(c.locate(&"Oslo".into()), Err(Error::UnknownContainer(_))));

    let fresh = db
        .create_container(ContainerProperties::new("c", "/CityName"))
        .unwrap();
    assert_eq!(fresh.count().unwrap(), 0);
    assert_eq!(
        env.sink
            .matching(|e| matches!(e, TelemetryEvent::ContainerDeleted { .. }))
            .len(),
        1
    );
}

#[test]
fn deleted_database_rejects_everything() {
    let env = TestEnv::new();
    let db = env.database("db", 400);
    let c = db
        .create_container(ContainerProperties::new("c", "/CityName"))
        .unwrap();
    env.client.delete_database("db").unwrap();

    assert!(matches!(
        db.create_container(ContainerProperties::new("d", "/CityName")),
        Err(Error::UnknownDatabase(_))
    ));
    assert!(matches!(c.count(), Err(Error::UnknownContainer(_))));
    assert!(matches!(env.client.database("db"), Err(Error::UnknownDatabase(_))));
}

#[test]
fn invalid_throughput_rejected() {
    let env = TestEnv::new();
    assert!(matches!(
        env.client.create_database("db", Some(ThroughputMode::manual(0))),
        Err(Error::InvalidOperation(_))
    ));
    let db = env.client.create_database("db2", None).unwrap();
    assert!(matches!(
        db.create_container(
            ContainerProperties::new("c", "/k").with_throughput(ThroughputMode::autoscale(1))
        ),
        Err(Error::InvalidOperation(_))
    ));
}
