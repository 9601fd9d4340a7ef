//! Detect command implementation

use crate::cli::DetectArgs;
use crate::output::OutputWriter;
use anyhow::{Context, Result};
use plzmap_core::formats::FormatRegistry;
use plzmap_geo::detect;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct DetectOutput {
    layer: String,
    crs: Option<String>,
    features: usize,
    columns: Vec<String>,
    name_key: String,
    id_key: String,
    name_suggestions: Vec<String>,
    id_suggestions: Vec<String>,
    complete: bool,
}

pub fn execute(args: DetectArgs, output: &OutputWriter) -> Result<()> {
    let layer = FormatRegistry::with_defaults()
        .read(&args.path)
        .with_context(|| format!("Failed to read {}", args.path.display()))?;
    let keys = detect(layer.schema());

    if output.is_json() {
        return output.result(DetectOutput {
            layer: layer.name().to_string(),
            crs: layer.crs().map(|crs| crs.to_string()),
            features: layer.len(),
            columns: layer.schema().to_vec(),
            complete: keys.is_complete(),
            name_key: keys.name_key,
            id_key: keys.id_key,
            name_suggestions: keys.name_suggestions,
            id_suggestions: keys.id_suggestions,
        });
    }

    output.section(format!("District Layer '{}'", layer.name()));
    output.kv(
        "CRS",
        layer.crs().map(|crs| crs.to_string()).unwrap_or_else(|| "undefined".to_string()),
    );
    output.kv("Features", layer.len());
    output.kv("Columns", layer.schema().join(", "));

    output.section("Detected Keys");
    output.kv("Name", &keys.name_key);
    output.kv("Number", &keys.id_key);
    if !keys.name_suggestions.is_empty() {
        output.kv("Possible name columns", keys.name_suggestions.join(", "));
    }
    if !keys.id_suggestions.is_empty() {
        output.kv("Possible number columns", keys.id_suggestions.join(", "));
    }

    if keys.is_complete() {
        output.success("Layer can be mapped");
    } else {
        output.warning("Layer would be skipped by `plzmap map`");
    }
    Ok(())
}
