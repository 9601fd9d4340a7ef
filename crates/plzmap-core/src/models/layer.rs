//! Polygon layers and their heterogeneous attribute bags.

use geo::{Geometry, GeometryCollection};
use std::collections::BTreeMap;
use std::fmt;

use super::geometry::Crs;

/// Attribute value as delivered by a layer loader
///
/// District layers come from many official sources with differing column
/// types, so values stay loosely typed until serialization.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    /// Raw bytes in an unknown legacy encoding
    Bytes(Vec<u8>),
    /// Calendar date rendered as `YYYY-MM-DD`
    Date(String),
    List(Vec<AttributeValue>),
    Map(BTreeMap<String, AttributeValue>),
    /// Anything the loader could not classify, kept verbatim
    Json(serde_json::Value),
}

impl AttributeValue {
    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    /// Short human-readable rendering for logs and diagnostics
    pub fn display_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Null => write!(f, "null"),
            AttributeValue::Bool(b) => write!(f, "{}", b),
            AttributeValue::Integer(i) => write!(f, "{}", i),
            AttributeValue::Float(v) => write!(f, "{}", v),
            AttributeValue::Text(s) | AttributeValue::Date(s) => write!(f, "{}", s),
            AttributeValue::Bytes(bytes) => write!(f, "{}", String::from_utf8_lossy(bytes)),
            AttributeValue::List(items) => {
                let rendered: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", rendered.join(", "))
            }
            AttributeValue::Map(map) => {
                let rendered: Vec<String> =
                    map.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
                write!(f, "{{{}}}", rendered.join(", "))
            }
            AttributeValue::Json(value) => write!(f, "{}", value),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Integer(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Float(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl From<serde_json::Value> for AttributeValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => AttributeValue::Null,
            serde_json::Value::Bool(b) => AttributeValue::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    AttributeValue::Integer(i)
                } else if n.is_u64() {
                    // Out of i64 range, keep the exact number
                    AttributeValue::Json(serde_json::Value::Number(n))
                } else {
                    n.as_f64()
                        .map(AttributeValue::Float)
                        .unwrap_or(AttributeValue::Json(serde_json::Value::Number(n)))
                }
            }
            serde_json::Value::String(s) => AttributeValue::Text(s),
            serde_json::Value::Array(items) => {
                AttributeValue::List(items.into_iter().map(AttributeValue::from).collect())
            }
            serde_json::Value::Object(map) => AttributeValue::Map(
                map.into_iter().map(|(k, v)| (k, AttributeValue::from(v))).collect(),
            ),
        }
    }
}

/// Attribute bag of one feature
pub type Attributes = BTreeMap<String, AttributeValue>;

/// A single area with its attributes
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: Geometry<f64>,
    pub attributes: Attributes,
}

impl Feature {
    pub fn new(geometry: impl Into<Geometry<f64>>, attributes: Attributes) -> Self {
        Self { geometry: geometry.into(), attributes }
    }

    /// Feature whose source geometry was null
    pub fn without_geometry(attributes: Attributes) -> Self {
        Self {
            geometry: Geometry::GeometryCollection(GeometryCollection::default()),
            attributes,
        }
    }

    /// Look up an attribute by exact key
    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }
}

/// Ordered, immutable collection of features sharing one CRS
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    name: String,
    crs: Option<Crs>,
    features: Vec<Feature>,
    schema: Vec<String>,
}

impl Layer {
    /// Create a layer; the schema is derived from the features' attribute keys
    /// in first-seen order
    pub fn new(name: impl Into<String>, crs: Option<Crs>, features: Vec<Feature>) -> Self {
        let mut schema: Vec<String> = Vec::new();
        for feature in &features {
            for key in feature.attributes.keys() {
                if !schema.iter().any(|k| k == key) {
                    schema.push(key.clone());
                }
            }
        }
        Self { name: name.into(), crs, features, schema }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// CRS of the layer; `None` means undefined
    pub fn crs(&self) -> Option<&Crs> {
        self.crs.as_ref()
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn feature(&self, index: usize) -> Option<&Feature> {
        self.features.get(index)
    }

    /// Available attribute names
    pub fn schema(&self) -> &[String] {
        &self.schema
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    /// New layer with the same name and schema but replaced geometries
    pub fn with_geometries(&self, crs: Crs, geometries: Vec<Geometry<f64>>) -> Self {
        let features = self
            .features
            .iter()
            .zip(geometries)
            .map(|(feature, geometry)| Feature::new(geometry, feature.attributes.clone()))
            .collect();
        Self { name: self.name.clone(), crs: Some(crs), features, schema: self.schema.clone() }
    }
}
