//! Hotels by city: five hotels across Auckland and London, manual 400 RU

use crate::common::*;
use partdb::{
    CompareOp, ContainerProperties, Predicate, QueryScope, RequestCharge, ThroughputMode,
};
use std::sync::Arc;

fn hotels(env: &TestEnv) -> Arc<partdb::Container> {
    let db = env
        .client
        .create_database_if_not_exists("HotelsDb", None)
        .unwrap();
    let c = db
        .create_container_if_not_exists(
            ContainerProperties::new("Hotels", "/CityName")
                .with_throughput(ThroughputMode::manual(400)),
        )
        .unwrap();
    seed_hotels(&c);
    c
}

#[test]
fn city_query_returns_exactly_that_city() {
    let env = TestEnv::new();
    let c = hotels(&env);

    let predicate = Predicate::eq("CityName", "Auckland").unwrap();
    let (docs, charge) = c
        .query(predicate, QueryScope::partition("Auckland"))
        .unwrap()
        .collect_all();
    assert_eq!(ids(&docs), vec!["akl-1", "akl-2", "akl-3"]);
    // Three documents of three fields each: 3 x (0.5 + 3 x 0.05)
    assert_eq!(charge, RequestCharge::from_milli(1950));
}

#[test]
fn rating_query_spans_both_cities() {
    let env = TestEnv::new();
    let c = hotels(&env);

    let predicate = Predicate::all()
        .and("StarRating", CompareOp::Lt, 3)
        .unwrap();
    let (docs, charge) = c.query(predicate, QueryScope::All).unwrap().collect_all();
    assert_eq!(ids(&docs), vec!["akl-1", "akl-3", "lon-2"]);
    assert_eq!(charge, RequestCharge::from_milli(5 * 650));
}

#[test]
fn query_text_matches_builder_predicate() {
    let env = TestEnv::new();
    let c = hotels(&env);

    let (docs, _) = c
        .query_text(
            "SELECT * FROM Hotels c WHERE c.CityName = 'Auckland' AND c.StarRating < 3",
            QueryScope::All,
        )
        .unwrap()
        .collect_all();
    assert_eq!(ids(&docs), vec!["akl-1", "akl-3"]);
}

#[test]
fn feeds_are_restartable() {
    let env = TestEnv::new();
    let c = hotels(&env);
    let predicate = Predicate::all().and("StarRating", CompareOp::Ge, 2).unwrap();

    let first: Vec<_> = c.query(predicate.clone(), QueryScope::All).unwrap().collect();
    let second: Vec<_> = c.query(predicate, QueryScope::All).unwrap().collect();
    assert_eq!(ids(&first), ids(&second));
    assert_eq!(ids(&first), vec!["akl-1", "akl-2", "lon-1", "lon-2"]);
}

#[test]
fn paged_read_all_charges_sum_to_total() {
    let env = TestEnv::new();
    let c = hotels(&env);

    let mut feed = c.read_all_items("Auckland").unwrap();
    let mut pages = Vec::new();
    while let Some(page) = feed.next_page(2) {
        pages.push(page);
    }
    assert!(!feed.has_more_results());
    let docs: usize = pages.iter().map(|p| p.documents.len()).sum();
    let charge: RequestCharge = pages.iter().map(|p| p.request_charge).sum();
    assert_eq!(docs, 3);
    assert_eq!(charge, feed.request_charge());
    assert_eq!(pages[0].documents.len(), 2);
}

#[test]
fn missing_fields_and_mismatched_types_never_match() {
    let env = TestEnv::new();
    let c = hotels(&env);
    c.upsert_item(
        partdb::Document::new("odd")
            .with_field("CityName", "Auckland")
            .with_field("StarRating", "two"),
    )
    .unwrap();
    c.upsert_item(partdb::Document::new("bare").with_field("CityName", "Auckland"))
        .unwrap();

    let predicate = Predicate::all().and("StarRating", CompareOp::Lt, 3).unwrap();
    let (docs, _) = c
        .query(predicate, QueryScope::partition("Auckland"))
        .unwrap()
        .collect_all();
    assert_eq!(ids(&docs), vec!["akl-1", "akl-3"]);
}
