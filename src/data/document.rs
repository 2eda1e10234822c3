//! Open JSON document behind every entity

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::session::{ApiError, ApiResult};

/// JSON object returned by the API
///
/// Entities expose typed accessors for the fields they know about and hand
/// out the document for everything else.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    /// Empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// Document holding only an id
    pub fn with_id(id: impl Into<String>) -> Self {
        let mut doc = Self::new();
        doc.insert("id", Value::String(id.into()));
        doc
    }

    /// Wrap a JSON value, which must be an object
    pub fn from_value(value: Value) -> ApiResult<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(ApiError::Parse(format!("expected a JSON object, got {other}"))),
        }
    }

    /// Raw field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String field
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Integer field
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    /// Array field, empty when absent
    pub fn get_array(&self, key: &str) -> &[Value] {
        self.get(key)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether the field is present
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Set a field, returning the previous value
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    /// The `id` field
    pub fn id(&self) -> Option<&str> {
        self.get_str("id")
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the document has no fields
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Underlying map
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Document as a JSON value
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    /// Consume into a JSON value
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Document {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
