//! Core record types for vecindex.
//!
//! A [`Record`] is a mapping from attribute name to [`MetadataValue`]. It must
//! carry an `embedding` attribute holding a vector; every other attribute is
//! opaque metadata used for equality filtering and returned as result payload.

use crate::config::EMBEDDING_FIELD;
use crate::error::{Result, SearchError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A typed attribute value attached to a record.
///
/// Uses the default externally-tagged serde representation for bincode
/// compatibility. JSON conversion goes through [`Record::from_json`] and
/// [`Record::to_json`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetadataValue {
    /// Boolean value (`true` / `false`).
    Boolean(bool),
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit floating-point number.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Numeric vector, used for the embedding attribute.
    Vector(Vec<f32>),
}

impl MetadataValue {
    /// Exact-match comparison used by filters.
    ///
    /// Integers and floats compare numerically; every other pair must have the
    /// same variant and an equal payload.
    pub fn matches(&self, other: &MetadataValue) -> bool {
        match (self, other) {
            (MetadataValue::Integer(a), MetadataValue::Float(b))
            | (MetadataValue::Float(b), MetadataValue::Integer(a)) => *a as f64 == *b,
            (a, b) => a == b,
        }
    }

    /// Returns the vector payload, or `None` for scalar values.
    pub fn as_vector(&self) -> Option<&[f32]> {
        match self {
            MetadataValue::Vector(v) => Some(v),
            _ => None,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            MetadataValue::Boolean(_) => "boolean",
            MetadataValue::Integer(_) => "integer",
            MetadataValue::Float(_) => "float",
            MetadataValue::String(_) => "string",
            MetadataValue::Vector(_) => "vector",
        }
    }
}

impl From<bool> for MetadataValue {
    fn from(v: bool) -> Self {
        MetadataValue::Boolean(v)
    }
}

impl From<i64> for MetadataValue {
    fn from(v: i64) -> Self {
        MetadataValue::Integer(v)
    }
}

impl From<i32> for MetadataValue {
    fn from(v: i32) -> Self {
        MetadataValue::Integer(v as i64)
    }
}

impl From<f64> for MetadataValue {
    fn from(v: f64) -> Self {
        MetadataValue::Float(v)
    }
}

impl From<&str> for MetadataValue {
    fn from(v: &str) -> Self {
        MetadataValue::String(v.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(v: String) -> Self {
        MetadataValue::String(v)
    }
}

impl From<Vec<f32>> for MetadataValue {
    fn from(v: Vec<f32>) -> Self {
        MetadataValue::Vector(v)
    }
}

/// A stored record: attribute name → value, including the `embedding`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, MetadataValue>,
}

impl Record {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a record holding only an embedding.
    pub fn with_embedding(embedding: Vec<f32>) -> Self {
        Self::new().with(EMBEDDING_FIELD, embedding)
    }

    /// Builder-style attribute setter.
    pub fn with(mut self, key: &str, value: impl Into<MetadataValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Sets an attribute, returning the previous value if any.
    pub fn insert(&mut self, key: &str, value: impl Into<MetadataValue>) -> Option<MetadataValue> {
        self.fields.insert(key.to_string(), value.into())
    }

    /// Returns the value of an attribute.
    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.fields.get(key)
    }

    /// Returns `true` if the attribute is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Attribute names in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Number of attributes, including the embedding.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if the record has no attributes.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the embedding if present and vector-typed, without validation.
    pub fn embedding(&self) -> Option<&[f32]> {
        self.fields.get(EMBEDDING_FIELD).and_then(MetadataValue::as_vector)
    }

    /// Returns the embedding after checking it is present, numeric and NaN-free.
    pub fn validated_embedding(&self) -> Result<&[f32]> {
        let value = self.fields.get(EMBEDDING_FIELD).ok_or_else(|| {
            SearchError::Validation(format!("record has no '{EMBEDDING_FIELD}' attribute"))
        })?;
        let embedding = value.as_vector().ok_or_else(|| {
            SearchError::Validation(format!(
                "'{EMBEDDING_FIELD}' must be a numeric vector, got {}",
                value.type_name()
            ))
        })?;
        if let Some(pos) = embedding.iter().position(|x| x.is_nan()) {
            return Err(SearchError::Validation(format!(
                "'{EMBEDDING_FIELD}' contains NaN at position {pos}"
            )));
        }
        Ok(embedding)
    }

    /// Builds a record from a JSON object.
    ///
    /// Integral numbers become [`MetadataValue::Integer`], other numbers
    /// [`MetadataValue::Float`], arrays of numbers [`MetadataValue::Vector`].
    /// Nulls, nested objects and non-numeric arrays are rejected.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        let serde_json::Value::Object(map) = value else {
            return Err(SearchError::Validation("record must be a JSON object".into()));
        };
        let mut record = Record::new();
        for (key, value) in map {
            let converted = json_to_metadata(&key, value)?;
            record.fields.insert(key, converted);
        }
        Ok(record)
    }

    /// Converts the record to a JSON object. Non-finite floats become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), metadata_to_json(v)))
            .collect();
        serde_json::Value::Object(map)
    }
}

impl FromIterator<(String, MetadataValue)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, MetadataValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

fn json_to_metadata(key: &str, value: serde_json::Value) -> Result<MetadataValue> {
    use serde_json::Value;
    match value {
        Value::Bool(b) => Ok(MetadataValue::Boolean(b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(MetadataValue::Integer(i)),
            None => n
                .as_f64()
                .map(MetadataValue::Float)
                .ok_or_else(|| SearchError::Validation(format!("'{key}': unsupported number {n}"))),
        },
        Value::String(s) => Ok(MetadataValue::String(s)),
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_f64().map(|f| f as f32))
            .collect::<Option<Vec<f32>>>()
            .map(MetadataValue::Vector)
            .ok_or_else(|| {
                SearchError::Validation(format!("'{key}': arrays must contain only numbers"))
            }),
        Value::Null | Value::Object(_) => Err(SearchError::Validation(format!(
            "'{key}': null and nested objects are not supported"
        ))),
    }
}

fn metadata_to_json(value: &MetadataValue) -> serde_json::Value {
    use serde_json::Value;
    match value {
        MetadataValue::Boolean(b) => Value::Bool(*b),
        MetadataValue::Integer(i) => Value::from(*i),
        MetadataValue::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        MetadataValue::String(s) => Value::String(s.clone()),
        MetadataValue::Vector(v) => Value::Array(
            v.iter()
                .map(|&x| {
                    serde_json::Number::from_f64(x as f64)
                        .map(Value::Number)
                        .unwrap_or(Value::Null)
                })
                .collect(),
        ),
    }
}
