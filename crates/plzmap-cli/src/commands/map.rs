//! Map command implementation

use crate::cli::MapArgs;
use crate::discovery::{discover_district_layers, relative_display, DistrictDataset};
use crate::output::OutputWriter;
use crate::progress;
use anyhow::{bail, Context, Result};
use plzmap_core::config::LayeredConfig;
use plzmap_core::formats::geojson::GeoJsonWriter;
use plzmap_core::formats::{FormatRegistry, LayerWriter};
use plzmap_core::models::{Layer, MatchPolicy};
use plzmap_geo::{detect, join_with_progress, serialize, JoinOptions, RepairOptions};
use serde::Serialize;
use tabled::Tabled;

#[derive(Debug, Serialize, Tabled)]
struct DatasetRow {
    #[tabled(rename = "Dataset")]
    dataset: String,
    #[tabled(rename = "Status")]
    status: &'static str,
    #[tabled(rename = "Records")]
    records: usize,
    #[tabled(rename = "Skipped")]
    skipped: usize,
}

enum Outcome {
    Mapped { records: usize, skipped: usize },
    MissingKeys,
}

pub fn execute(args: MapArgs, config: &LayeredConfig, output: &OutputWriter) -> Result<()> {
    let data_root = &config.data_root.value;
    let output_root = &config.output_root.value;
    let plz_path = config.plz_path();

    tracing::info!("Loading postal-code layer from {}", plz_path.display());
    tracing::info!(
        "Mapping mode: {}",
        if args.force { "recompute everything (--force)" } else { "missing files only" }
    );
    if !args.selection.only.is_empty() {
        let kinds: Vec<&str> = args.selection.only.iter().map(|k| k.prefix()).collect();
        tracing::info!("Restricted to election kinds: {}", kinds.join(", "));
    }
    if !args.selection.year.is_empty() {
        tracing::info!("Restricted to years: {}", args.selection.year.join(", "));
    }

    let registry = FormatRegistry::with_defaults();
    let spinner = if output.is_json() {
        progress::hidden()
    } else {
        progress::create_spinner("Loading postal-code layer...")
    };
    let plz = match registry.read(&plz_path) {
        Ok(layer) => layer,
        Err(e) => {
            progress::finish_error(&spinner, "Postal-code layer could not be loaded");
            return Err(e).with_context(|| {
                format!("Failed to load postal-code layer {}", plz_path.display())
            });
        }
    };
    if plz.crs().is_none() {
        progress::finish_error(&spinner, "Postal-code layer has no CRS");
        bail!("Postal-code layer {} has no CRS", plz_path.display());
    }
    progress::finish_success(&spinner, &format!("Loaded {} postal-code areas", plz.len()));

    let options = JoinOptions {
        match_policy: config.match_policy.value,
        repair: RepairOptions { snap_precision: config.snap_precision.value },
        parallel: config.parallel.value,
        ..Default::default()
    };
    if options.match_policy == MatchPolicy::FirstMatch {
        tracing::info!("Keeping only the first intersecting district per postal code");
    }

    let discovery = discover_district_layers(data_root, output_root);
    for path in &discovery.unrecognized {
        tracing::warn!(
            "Ignoring {}: expected <kind>/[<region>/]<year>/ below the data root",
            path.display()
        );
    }

    let mut rows = Vec::new();
    for dataset in &discovery.datasets {
        let name = relative_display(&dataset.source, data_root);

        if !dataset.is_selected(&args.selection.only, &args.selection.year) {
            tracing::debug!("Skipping {}: not selected", name);
            continue;
        }

        if dataset.output.exists() && !args.force {
            tracing::info!("Already mapped: {}", dataset.output.display());
            rows.push(DatasetRow { dataset: name, status: "exists", records: 0, skipped: 0 });
            continue;
        }

        let row = match map_dataset(&registry, &plz, dataset, &options, output) {
            Ok(Outcome::Mapped { records, skipped }) => {
                DatasetRow { dataset: name, status: "mapped", records, skipped }
            }
            Ok(Outcome::MissingKeys) => {
                output.warning(format!("{}: district columns not found", name));
                DatasetRow { dataset: name, status: "missing columns", records: 0, skipped: 0 }
            }
            Err(e) => {
                tracing::error!("Failed to map {}: {:#}", name, e);
                output.error(format!("{}: {:#}", name, e));
                DatasetRow { dataset: name, status: "failed", records: 0, skipped: 0 }
            }
        };
        rows.push(row);
    }

    tracing::info!("Mapping finished");

    if output.is_json() {
        output.result(&rows)?;
    } else {
        output.section("Mapping Summary");
        output.table(rows);
    }
    Ok(())
}

fn map_dataset(
    registry: &FormatRegistry,
    plz: &Layer,
    dataset: &DistrictDataset,
    options: &JoinOptions,
    output: &OutputWriter,
) -> Result<Outcome> {
    let districts = registry
        .read(&dataset.source)
        .with_context(|| format!("Failed to read {}", dataset.source.display()))?;

    let keys = detect(districts.schema());
    tracing::info!(
        "Processing {}: name={}, nr={}",
        districts.name(),
        keys.name_key,
        keys.id_key
    );
    if !keys.is_complete() {
        tracing::warn!("Skipping {}: district columns not found", dataset.source.display());
        return Ok(Outcome::MissingKeys);
    }

    let bar = if output.is_json() {
        progress::hidden()
    } else {
        progress::create_progress_bar(plz.len() as u64, districts.name())
    };
    let report = match join_with_progress(plz, &districts, &keys, options, |_| bar.inc(1)) {
        Ok(report) => report,
        Err(e) => {
            progress::finish_error(&bar, districts.name());
            return Err(e.into());
        }
    };

    let collection = serialize(&report.records);
    GeoJsonWriter::default()
        .write(&collection, plz.crs(), &dataset.output)
        .with_context(|| format!("Failed to write {}", dataset.output.display()))?;

    progress::finish_success(
        &bar,
        &format!("{} ({} records)", districts.name(), report.records.len()),
    );
    tracing::info!(
        "Mapped {} ({} records, {} postal codes skipped)",
        dataset.output.display(),
        report.records.len(),
        report.skipped.len()
    );

    Ok(Outcome::Mapped {
        records: report.records.len(),
        skipped: report.skipped.len(),
    })
}
