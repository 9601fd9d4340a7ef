//! GeoJSON output of overlap records

use geojson::{Feature, FeatureCollection, JsonObject};
use plzmap_core::error::{PlzmapError, Result};
use plzmap_core::models::AttributeValue;
use serde_json::Value;

use crate::join::OverlapRecord;

pub const PLZ_PROPERTY: &str = "plz";
pub const DISTRICT_NAME_PROPERTY: &str = "wahlkreis";
pub const DISTRICT_ID_PROPERTY: &str = "wahlkreis_nr";

/// Convert an attribute value into plain JSON
///
/// Total: non-finite floats become `null` and bytes are decoded lossily.
pub fn json_safe(value: &AttributeValue) -> Value {
    match value {
        AttributeValue::Null => Value::Null,
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::Integer(i) => Value::from(*i),
        AttributeValue::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        AttributeValue::Text(s) | AttributeValue::Date(s) => Value::String(s.clone()),
        AttributeValue::Bytes(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        AttributeValue::List(items) => Value::Array(items.iter().map(json_safe).collect()),
        AttributeValue::Map(map) => {
            Value::Object(map.iter().map(|(k, v)| (k.clone(), json_safe(v))).collect())
        }
        AttributeValue::Json(json) => json.clone(),
    }
}

fn record_feature(record: &OverlapRecord) -> Feature {
    let mut properties = JsonObject::new();
    properties.insert(PLZ_PROPERTY.to_string(), json_safe(&record.base_id));
    properties.insert(DISTRICT_NAME_PROPERTY.to_string(), json_safe(&record.district_name));
    properties.insert(DISTRICT_ID_PROPERTY.to_string(), json_safe(&record.district_id));

    Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(geojson::Value::from(&record.geometry))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Build the output document, one feature per record in record order
pub fn serialize(records: &[OverlapRecord]) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: records.iter().map(record_feature).collect(),
        foreign_members: None,
    }
}

/// Pretty-printed GeoJSON; non-ASCII text is kept as is
pub fn to_json_string(collection: &FeatureCollection) -> Result<String> {
    serde_json::to_string_pretty(collection)
        .map_err(|e| PlzmapError::Serialization(format!("Failed to render GeoJSON: {}", e)))
}
