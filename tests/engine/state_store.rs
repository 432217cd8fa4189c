//! Key/value state over a container

use crate::common::*;
use partdb::StateStore;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ToDoItem {
    id: String,
    title: String,
    is_complete: bool,
}

#[test]
fn todo_items_through_state_store() {
    let env = TestEnv::new();
    let db = env.database("todo", 1_000);
    let store = StateStore::open(&db, "statestore").unwrap();

    let item = ToDoItem {
        id: "1".into(),
        title: "Buy milk".into(),
        is_complete: false,
    };
    store.save_state(&item.id, &item).unwrap();

    let loaded: ToDoItem = store.get_state("1").unwrap().unwrap();
    assert_eq!(loaded, item);

    let reopened = StateStore::open(&db, "statestore").unwrap();
    assert!(reopened.get_state::<ToDoItem>("1").unwrap().is_some());

    reopened.delete_state("1").unwrap();
    assert!(store.get_state::<ToDoItem>("1").unwrap().is_none());
}

#[test]
fn each_key_is_its_own_partition() {
    let env = TestEnv::new();
    let db = env.database("todo", 1_000);
    let store = StateStore::open(&db, "statestore").unwrap();
    store.save_state("a", &1u8).unwrap();
    store.save_state("b", &2u8).unwrap();

    let keys = store.container().partition_keys().unwrap();
    assert_eq!(keys.len(), 2);
}
