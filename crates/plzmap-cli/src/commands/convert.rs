//! Convert command implementation

use crate::cli::ConvertArgs;
use crate::discovery::{find_files, relative_display};
use crate::output::OutputWriter;
use anyhow::{Context, Result};
use geo::Geometry;
use geojson::{Feature, FeatureCollection, JsonObject};
use plzmap_core::config::LayeredConfig;
use plzmap_core::formats::geojson::GeoJsonWriter;
use plzmap_core::formats::{FormatRegistry, LayerWriter};
use plzmap_core::models::Layer;
use plzmap_geo::json_safe;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Default, Serialize)]
struct ConvertSummary {
    converted: usize,
    skipped: usize,
    failed: Vec<String>,
}

pub fn execute(args: ConvertArgs, config: &LayeredConfig, output: &OutputWriter) -> Result<()> {
    let data_root = &config.data_root.value;
    tracing::info!("Searching shapefiles below {}", data_root.display());

    let registry = FormatRegistry::with_defaults();
    let writer = GeoJsonWriter::default();
    let mut summary = ConvertSummary::default();

    for source in find_files(data_root, "shp") {
        let target = source.with_extension("geojson");
        let name = relative_display(&source, data_root);

        if target.exists() && !args.force {
            tracing::info!("Skipping {}: already converted", name);
            summary.skipped += 1;
            continue;
        }

        match convert_file(&registry, &writer, &source, &target) {
            Ok(features) => {
                tracing::info!("Converted {} ({} features)", name, features);
                summary.converted += 1;
            }
            Err(e) => {
                tracing::error!("Failed to convert {}: {:#}", name, e);
                output.error(format!("{}: {:#}", name, e));
                summary.failed.push(name);
            }
        }
    }

    tracing::info!(
        "Conversion finished: {} converted, {} skipped, {} failed",
        summary.converted,
        summary.skipped,
        summary.failed.len()
    );

    if output.is_json() {
        output.result(&summary)?;
    } else {
        output.success(format!(
            "Converted {} shapefiles, skipped {}",
            summary.converted, summary.skipped
        ));
        if !summary.failed.is_empty() {
            output.warning(format!("{} shapefiles could not be converted:", summary.failed.len()));
            for name in &summary.failed {
                output.warning(format!("  {}", name));
            }
        }
    }

    Ok(())
}

fn convert_file(
    registry: &FormatRegistry,
    writer: &GeoJsonWriter,
    source: &Path,
    target: &Path,
) -> Result<usize> {
    let layer = registry
        .read(source)
        .with_context(|| format!("Failed to read {}", source.display()))?;
    if layer.crs().is_none() {
        tracing::warn!("{} has no CRS; writing GeoJSON without one", source.display());
    }

    let collection = layer_to_feature_collection(&layer);
    writer
        .write(&collection, layer.crs(), target)
        .with_context(|| format!("Failed to write {}", target.display()))?;
    Ok(layer.len())
}

/// Every feature with its attributes; null geometries stay null
pub fn layer_to_feature_collection(layer: &Layer) -> FeatureCollection {
    let features = layer
        .iter()
        .map(|feature| {
            let properties: JsonObject = feature
                .attributes
                .iter()
                .map(|(key, value)| (key.clone(), json_safe(value)))
                .collect();
            let geometry = match &feature.geometry {
                Geometry::GeometryCollection(collection) if collection.0.is_empty() => None,
                geometry => Some(geojson::Geometry::new(geojson::Value::from(geometry))),
            };
            Feature {
                bbox: None,
                geometry,
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}
