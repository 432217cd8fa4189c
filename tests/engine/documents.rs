//! Point operations through the public API

use crate::common::*;
use partdb::{Document, Error, PartitionKey};
use proptest::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Hotel {
    #[serde(rename = "id")]
    id: String,
    name: String,
    city_name: String,
    star_rating: i64,
}

#[test]
fn typed_items_round_trip() {
    let env = TestEnv::new();
    let hotels = env.container("/CityName", 10_000);
    let item = Hotel {
        id: "h1".into(),
        name: "Harbour View".into(),
        city_name: "Auckland".into(),
        star_rating: 3,
    };

    hotels
        .upsert_item(Document::from_serializable(&item).unwrap())
        .unwrap();
    let read: Hotel = hotels
        .read_item(&"Auckland".into(), "h1")
        .unwrap()
        .item()
        .unwrap();
    assert_eq!(read, item);
}

#[test]
fn nested_partition_key_path() {
    let env = TestEnv::new();
    let people = env.container("/address/city", 10_000);
    let doc = Document::from_json(serde_json::json!({
        "id": "p1",
        "address": { "city": "Seattle", "zip": "98101" }
    }))
    .unwrap();

    let written = people.upsert_item(doc).unwrap();
    assert_eq!(written.partition_key, PartitionKey::from("Seattle"));
    assert!(people.read_item(&"Seattle".into(), "p1").is_ok());
    assert!(matches!(
        people.read_item(&"Portland".into(), "p1"),
        Err(Error::NotFound(_))
    ));
}

#[test]
fn ids_are_unique_across_partition_keys() {
    let env = TestEnv::new();
    let hotels = env.container("/CityName", 10_000);
    hotels.create_item(hotel("h1", "Auckland", 2)).unwrap();

    assert!(matches!(
        hotels.create_item(hotel("h1", "London", 2)),
        Err(Error::PartitionKeyMismatch { .. })
    ));

    hotels.delete_item(&"Auckland".into(), "h1").unwrap();
    hotels.create_item(hotel("h1", "London", 2)).unwrap();
    assert_eq!(hotels.count().unwrap(), 1);
}

#[test]
fn forbidden_ids_rejected() {
    let env = TestEnv::new();
    let hotels = env.container("/CityName", 10_000);
    for id in ["a/b", "a?b", "a#b"] {
        assert!(matches!(
            hotels.upsert_item(hotel(id, "Auckland", 2)),
            Err(Error::InvalidDocument(_))
        ));
    }
}

#[test]
fn versions_increase_per_write() {
    let env = TestEnv::new();
    let hotels = env.container("/CityName", 10_000);
    let v1 = hotels.upsert_item(hotel("h1", "Auckland", 2)).unwrap().version;
    let v2 = hotels.upsert_item(hotel("h1", "Auckland", 3)).unwrap().version;
    let v3 = hotels.upsert_item(hotel("h2", "London", 3)).unwrap().version;
    assert!(v1 < v2 && v2 < v3);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn put_then_get_returns_document(
        id in "[a-z0-9]{1,16}",
        city in "[A-Za-z]{1,12}",
        rating in -10i64..10,
    ) {
        let env = TestEnv::new();
        let hotels = env.container("/CityName", 10_000);
        let doc = hotel(&id, &city, rating);
        hotels.upsert_item(doc.clone()).unwrap();
        let read = hotels.read_item(&PartitionKey::from(city.as_str()), &id).unwrap();
        prop_assert_eq!(read.resource, doc);
    }

    #[test]
    fn repeated_put_keeps_one_document(
        id in "[a-z0-9]{1,16}",
        city in "[A-Za-z]{1,12}",
        times in 1usize..5,
    ) {
        let env = TestEnv::new();
        let hotels = env.container("/CityName", 10_000);
        let doc = hotel(&id, &city, 3);
        for _ in 0..times {
            hotels.upsert_item(doc.clone()).unwrap();
        }
        prop_assert_eq!(hotels.count().unwrap(), 1);
        let read = hotels.read_item(&PartitionKey::from(city.as_str()), &id).unwrap();
        prop_assert_eq!(read.resource, doc);
    }
}
