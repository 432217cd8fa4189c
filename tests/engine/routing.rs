//! Partition routing

use crate::common::*;
use partdb::{ContainerProperties, EngineConfig, Error, PartitionKey, ThroughputMode};
use proptest::prelude::*;

#[test]
fn locate_through_database() {
    let env = TestEnv::new();
    let db = env.database("hotels", 400);
    db.create_container(ContainerProperties::new("byCity", "/CityName"))
        .unwrap();

    let key = PartitionKey::from("Auckland");
    let first = db.locate("byCity", &key).unwrap();
    assert_eq!(db.locate("byCity", &key).unwrap(), first);
    assert!(first.index() < env.client.config().partitions_per_container);

    assert!(matches!(
        db.locate("missing", &key),
        Err(Error::UnknownContainer(_))
    ));
}

#[test]
fn single_partition_container_colocates_everything() {
    let env = TestEnv::with_config(EngineConfig {
        partitions_per_container: 1,
        ..EngineConfig::default()
    });
    let db = env
        .client
        .create_database("db", Some(ThroughputMode::manual(400)))
        .unwrap();
    let c = db
        .create_container(ContainerProperties::new("c", "/CityName"))
        .unwrap();
    let a = c.locate(&"Auckland".into()).unwrap();
    let b = c.locate(&"London".into()).unwrap();
    assert_eq!(a, b);
}

proptest! {
    #[test]
    fn identical_values_resolve_identically(value in ".{0,64}") {
        let env = TestEnv::new();
        let c = env.container("/k", 400);
        let key = PartitionKey::from(value.as_str());
        let first = c.locate(&key).unwrap();
        for _ in 0..4 {
            prop_assert_eq!(c.locate(&key).unwrap(), first);
        }
    }
}
