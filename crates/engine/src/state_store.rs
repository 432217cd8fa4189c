//! Key/value state over a container
//!
//! Each key is stored as one document whose id and partition-key value are
//! both the key, so every state operation is a single-partition point
//! operation. The value lives under the `value` field.

use partdb_core::{Document, Error, PartitionKey, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use crate::container::{Container, ContainerProperties};
use crate::database::Database;

/// Partition-key path of state containers
pub const STATE_KEY_PATH: &str = "/id";

const VALUE_FIELD: &str = "value";

/// Typed key/value access to a container partitioned by `/id`
#[derive(Debug, Clone)]
pub struct StateStore {
    container: Arc<Container>,
}

impl StateStore {
    /// Open (creating if needed) the state container `name` in `database`
    pub fn open(database: &Database, name: &str) -> Result<Self> {
        let container = database
            .create_container_if_not_exists(ContainerProperties::new(name, STATE_KEY_PATH))?;
        Ok(StateStore { container })
    }

    /// Wrap an existing container; it must be partitioned by `/id`
    pub fn from_container(container: Arc<Container>) -> Result<Self> {
        if container.partition_key_path().to_string() != STATE_KEY_PATH {
            return Err(Error::invalid_operation(format!(
                "state container '{}' must be partitioned by {}, not {}",
                container.id(),
                STATE_KEY_PATH,
                container.partition_key_path()
            )));
        }
        Ok(StateStore { container })
    }

    /// Underlying container
    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }

    /// Value stored under `key`, or `None`
    pub fn get_state<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let response = match self.container.read_item(&PartitionKey::new(key), key) {
            Ok(response) => response,
            Err(Error::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let value = response.resource.get(VALUE_FIELD).cloned().ok_or_else(|| {
            Error::InvalidDocument(format!("state '{}' has no {} field", key, VALUE_FIELD))
        })?;
        Ok(Some(serde_json::from_value(value)?))
    }

    /// Store `value` under `key`, overwriting any previous value
    pub fn save_state<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let document = Document::new(key).with_field(VALUE_FIELD, serde_json::to_value(value)?);
        self.container.upsert_item(document)?;
        Ok(())
    }

    /// Remove `key`; removing an absent key succeeds
    pub fn delete_state(&self, key: &str) -> Result<()> {
        match self.container.delete_item(&PartitionKey::new(key), key) {
            Ok(_) | Err(Error::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}
