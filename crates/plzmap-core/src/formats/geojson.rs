//! GeoJSON layer reader and writer

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use geojson::{FeatureCollection, GeoJson, JsonObject};

use crate::error::{PlzmapError, Result};
use crate::formats::validation::FormatValidator;
use crate::formats::{layer_name, FormatValidation, LayerReader, LayerWriter};
use crate::models::{AttributeValue, Attributes, Crs, Feature, Layer};

/// GeoJSON layer reader
pub struct GeoJsonReader;

impl LayerReader for GeoJsonReader {
    fn read(&self, path: &Path) -> Result<Layer> {
        let content = fs::read_to_string(path)?;

        let geojson: GeoJson = content.parse().map_err(|e| PlzmapError::FormatError {
            format: "GeoJSON".to_string(),
            message: format!("Failed to parse GeoJSON: {}", e),
        })?;

        let name = layer_name(path);
        let (features, crs) = match geojson {
            GeoJson::FeatureCollection(fc) => {
                let crs = match fc.foreign_members.as_ref().and_then(|fm| fm.get("crs")) {
                    Some(crs_obj) => {
                        let crs = extract_epsg_from_crs(crs_obj).map(Crs::from_epsg);
                        if crs.is_none() {
                            tracing::warn!(
                                "Unrecognized CRS member in {}: {}",
                                path.display(),
                                crs_obj
                            );
                        }
                        crs
                    }
                    // RFC 7946: coordinates without a crs member are WGS 84
                    None => Some(Crs::wgs84()),
                };

                let features = fc
                    .features
                    .into_iter()
                    .enumerate()
                    .map(|(idx, feature)| convert_feature(feature, idx, &name))
                    .collect();
                (features, crs)
            }
            GeoJson::Feature(feature) => {
                (vec![convert_feature(feature, 0, &name)], Some(Crs::wgs84()))
            }
            GeoJson::Geometry(geometry) => {
                let feature = convert_geometry(geometry, 0, &name)
                    .map(|g| Feature::new(g, Attributes::new()))
                    .unwrap_or_else(|| Feature::without_geometry(Attributes::new()));
                (vec![feature], Some(Crs::wgs84()))
            }
        };

        Ok(Layer::new(name, crs, features))
    }

    fn supported_extensions(&self) -> &[&str] {
        &["geojson", "json"]
    }

    fn format_name(&self) -> &str {
        "GeoJSON"
    }

    fn validate(&self, path: &Path) -> Result<FormatValidation> {
        let validation = FormatValidator::validate_file_exists(path);
        if !validation.is_valid() {
            return Ok(validation);
        }

        let json_validation = FormatValidator::validate_json_structure(path);
        Ok(FormatValidator::merge_validations(vec![validation, json_validation]))
    }
}

/// Convert a GeoJSON feature into a layer feature
fn convert_feature(feature: geojson::Feature, idx: usize, layer: &str) -> Feature {
    let attributes: Attributes = feature
        .properties
        .map(|props| props.into_iter().map(|(k, v)| (k, AttributeValue::from(v))).collect())
        .unwrap_or_default();

    match feature.geometry.and_then(|g| convert_geometry(g, idx, layer)) {
        Some(geometry) => Feature::new(geometry, attributes),
        None => Feature::without_geometry(attributes),
    }
}

fn convert_geometry(
    geometry: geojson::Geometry,
    idx: usize,
    layer: &str,
) -> Option<geo::Geometry<f64>> {
    match geo::Geometry::<f64>::try_from(geometry) {
        Ok(geometry) => Some(geometry),
        Err(e) => {
            tracing::warn!("Feature {} in '{}' has an unreadable geometry: {}", idx, layer, e);
            None
        }
    }
}

/// Extract EPSG code from a legacy GeoJSON CRS object
fn extract_epsg_from_crs(crs: &serde_json::Value) -> Option<u32> {
    crs.get("properties")
        .and_then(|props| props.get("name"))
        .and_then(|name| name.as_str())
        .and_then(parse_crs_name)
}

/// Parse "EPSG:4326", "urn:ogc:def:crs:EPSG::25832" or "urn:ogc:def:crs:OGC:1.3:CRS84"
pub fn parse_crs_name(name: &str) -> Option<u32> {
    if name.to_ascii_uppercase().ends_with("CRS84") {
        return Some(4326);
    }
    name.rsplit(':').next().and_then(|code| code.trim().parse().ok())
}

/// Legacy GeoJSON CRS member for a known CRS
fn crs_member(crs: &Crs) -> serde_json::Value {
    serde_json::json!({
        "type": "name",
        "properties": {
            "name": format!("urn:ogc:def:crs:EPSG::{}", crs.epsg)
        }
    })
}

/// GeoJSON layer writer
#[derive(Debug, Clone, Copy)]
pub struct GeoJsonWriter {
    pub pretty: bool,
}

impl Default for GeoJsonWriter {
    fn default() -> Self {
        Self { pretty: true }
    }
}

impl LayerWriter for GeoJsonWriter {
    fn write(&self, collection: &FeatureCollection, crs: Option<&Crs>, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut document = collection.clone();
        if let Some(crs) = crs {
            document
                .foreign_members
                .get_or_insert_with(JsonObject::new)
                .insert("crs".to_string(), crs_member(crs));
        }

        let file = fs::File::create(path)?;
        let mut writer = BufWriter::new(file);
        let written = if self.pretty {
            serde_json::to_writer_pretty(&mut writer, &document)
        } else {
            serde_json::to_writer(&mut writer, &document)
        };
        written.map_err(|e| PlzmapError::Serialization(format!("Failed to write GeoJSON: {}", e)))?;
        writer.flush()?;

        tracing::debug!("Wrote {} features to {}", document.features.len(), path.display());
        Ok(())
    }
}
