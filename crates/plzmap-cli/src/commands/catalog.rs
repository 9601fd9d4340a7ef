//! Catalog command implementation

use crate::catalog::{build_catalog, write_catalog, CATALOG_FILE};
use crate::cli::CatalogArgs;
use crate::output::OutputWriter;
use anyhow::Result;
use plzmap_core::config::LayeredConfig;

pub fn execute(args: CatalogArgs, config: &LayeredConfig, output: &OutputWriter) -> Result<()> {
    let output_root = &config.output_root.value;
    let catalog_path = output_root.join(CATALOG_FILE);

    if catalog_path.exists() && !args.force {
        tracing::info!("Catalogue already exists: {}", catalog_path.display());
        output.info(format!(
            "{} already exists; use --force to overwrite",
            catalog_path.display()
        ));
        return Ok(());
    }

    tracing::info!("Scanning {} for mapped files", output_root.display());
    let catalog = build_catalog(output_root);

    tracing::info!("Writing {} entries to {}", catalog.entries.len(), catalog_path.display());
    write_catalog(&catalog_path, &catalog.entries)?;

    for warning in &catalog.warnings {
        tracing::warn!("{}", warning);
    }

    if output.is_json() {
        output.result(serde_json::json!({
            "path": catalog_path.display().to_string(),
            "entries": catalog.entries.len(),
            "warnings": catalog.warnings,
        }))?;
    } else {
        output.success(format!(
            "Wrote {} entries to {}",
            catalog.entries.len(),
            catalog_path.display()
        ));
        if !catalog.warnings.is_empty() {
            output.warning(format!("{} warnings:", catalog.warnings.len()));
            for warning in &catalog.warnings {
                output.warning(format!("  {}", warning));
            }
        }
    }

    Ok(())
}
