//! Document model
//!
//! A [`Document`] is a JSON object with a mandatory string `id`. Its
//! partition-key value is not stored separately: it is read from the
//! document at the container's [`PartitionKeyPath`], so a document always
//! agrees with the partition it lives in.
//!
//! Paths come in two spellings. Partition-key paths use the container form
//! (`/CityName`, `/address/city`); query field paths also accept the dotted
//! form (`StarRating`, `c.address.city`). Both parse into a [`FieldPath`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Borrow;
use std::fmt;

use crate::error::{Error, Result};

/// Name of the identifier property inside a document's JSON form
pub const ID_FIELD: &str = "id";

// =============================================================================
// PartitionKey
// =============================================================================

/// A partition-key value
///
/// All documents with equal values are colocated in one logical partition.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartitionKey(String);

impl PartitionKey {
    /// Wrap a partition-key value
    pub fn new(value: impl Into<String>) -> Self {
        PartitionKey(value.into())
    }

    /// The raw value
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Raw bytes, used for routing
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PartitionKey {
    fn from(s: &str) -> Self {
        PartitionKey(s.to_string())
    }
}

impl From<String> for PartitionKey {
    fn from(s: String) -> Self {
        PartitionKey(s)
    }
}

impl Borrow<str> for PartitionKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// FieldPath
// =============================================================================

/// A path to a (possibly nested) field of a document
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    /// Parse a slash path (`/a/b`) or a dotted path (`a.b`)
    ///
    /// A leading `c.` alias (as in `SELECT * FROM c WHERE c.a`) is stripped
    /// by the query parser, not here.
    pub fn parse(path: &str) -> Result<Self> {
        let trimmed = path.trim();
        let segments: Vec<String> = if let Some(rest) = trimmed.strip_prefix('/') {
            rest.split('/').map(str::to_string).collect()
        } else {
            trimmed.split('.').map(str::to_string).collect()
        };

        if segments.is_empty() || segments.iter().any(|s| s.is_empty()) {
            return Err(Error::InvalidQuery(format!("invalid field path '{}'", path)));
        }
        Ok(FieldPath { segments })
    }

    /// Path segments, outermost first
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Resolve this path against a document
    ///
    /// `id` at the top level resolves to the document identifier.
    pub fn resolve<'a>(&self, doc: &'a Document) -> Option<&'a Value> {
        let (first, rest) = self.segments.split_first()?;
        let mut current = if first == ID_FIELD && rest.is_empty() {
            return Some(&doc.id_value);
        } else {
            doc.fields.get(first)?
        };
        for segment in rest {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

// =============================================================================
// PartitionKeyPath
// =============================================================================

/// The partition-key path of a container, e.g. `/CityName`
///
/// Immutable once a container is created.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartitionKeyPath(FieldPath);

impl PartitionKeyPath {
    /// Parse a container partition-key path; must start with `/`
    pub fn parse(path: &str) -> Result<Self> {
        if !path.starts_with('/') {
            return Err(Error::invalid_operation(format!(
                "partition key path '{}' must start with '/'",
                path
            )));
        }
        let field = FieldPath::parse(path)
            .map_err(|_| Error::invalid_operation(format!("invalid partition key path '{}'", path)))?;
        Ok(PartitionKeyPath(field))
    }

    /// The underlying field path
    pub fn field(&self) -> &FieldPath {
        &self.0
    }

    /// Read the partition-key value of a document
    ///
    /// The value must exist and be a string.
    pub fn extract(&self, doc: &Document) -> Result<PartitionKey> {
        match self.0.resolve(doc) {
            Some(Value::String(s)) => Ok(PartitionKey::new(s.clone())),
            Some(other) => Err(Error::invalid_document(format!(
                "partition key {} of document '{}' must be a string, found {}",
                self, doc.id, other
            ))),
            None => Err(Error::invalid_document(format!(
                "document '{}' has no value at partition key path {}",
                doc.id, self
            ))),
        }
    }
}

impl fmt::Display for PartitionKeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// =============================================================================
// Document
// =============================================================================

/// A JSON document with a string identifier
///
/// Serializes as a flat JSON object with the `id` property alongside the
/// other fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct Document {
    id: String,
    /// `id` as a JSON value, so path resolution can hand out a reference
    id_value: Value,
    fields: Map<String, Value>,
}

impl Document {
    /// Create an empty document with the given id
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Document {
            id_value: Value::String(id.clone()),
            id,
            fields: Map::new(),
        }
    }

    /// Builder-style field setter
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Build a document from a JSON object carrying a string `id`
    pub fn from_json(value: Value) -> Result<Self> {
        let mut fields = match value {
            Value::Object(map) => map,
            other => {
                return Err(Error::invalid_document(format!(
                    "document must be a JSON object, found {}",
                    other
                )))
            }
        };
        let id = match fields.remove(ID_FIELD) {
            Some(Value::String(id)) => id,
            Some(other) => {
                return Err(Error::invalid_document(format!(
                    "document id must be a string, found {}",
                    other
                )))
            }
            None => return Err(Error::invalid_document("document has no 'id' property")),
        };
        Ok(Document {
            id_value: Value::String(id.clone()),
            id,
            fields,
        })
    }

    /// Parse a document from JSON text
    pub fn from_json_str(text: &str) -> Result<Self> {
        Self::from_json(serde_json::from_str(text)?)
    }

    /// The JSON object form, `id` included
    pub fn to_json(&self) -> Value {
        let mut map = self.fields.clone();
        map.insert(ID_FIELD.to_string(), self.id_value.clone());
        Value::Object(map)
    }

    /// Document identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// All fields except `id`
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Number of top-level fields, `id` excluded
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Top-level field lookup
    pub fn get(&self, name: &str) -> Option<&Value> {
        if name == ID_FIELD {
            return Some(&self.id_value);
        }
        self.fields.get(name)
    }

    /// Set a top-level field; setting `id` is ignored
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        if name == ID_FIELD {
            return;
        }
        self.fields.insert(name, value.into());
    }

    /// Remove a top-level field
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    /// Deserialize the document into a caller type
    pub fn deserialize<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.to_json())?)
    }

    /// Serialize a caller type into a document
    pub fn from_serializable<T: Serialize>(item: &T) -> Result<Self> {
        Self::from_json(serde_json::to_value(item)?)
    }
}

impl TryFrom<Value> for Document {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        Document::from_json(value)
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        doc.to_json()
    }
}
