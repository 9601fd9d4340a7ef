use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::discovery::ElectionKind;

/// plzmap - Assign postal-code areas to electoral districts
#[derive(Parser, Debug)]
#[command(name = "plzmap")]
#[command(about = "Polygon-accurate postal-code to electoral-district mapping", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Echo the pipeline log to the console
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Output summaries in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to ./plzmap.toml when present)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Root of the raw election data tree
    #[arg(long, global = true, value_name = "DIR")]
    pub data_root: Option<PathBuf>,

    /// Root the mapped files and the catalogue are written to
    #[arg(long, global = true, value_name = "DIR")]
    pub output_root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert district shapefiles to GeoJSON
    Convert(ConvertArgs),

    /// Join the postal-code layer against every district layer
    Map(MapArgs),

    /// Write the election catalogue CSV
    Catalog(CatalogArgs),

    /// Show which columns of a district layer carry name and number
    Detect(DetectArgs),

    /// Run convert, map and catalog in sequence
    All(AllArgs),
}

#[derive(Args, Debug, Default)]
pub struct ConvertArgs {
    /// Overwrite GeoJSON files that already exist
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug, Default, Clone)]
pub struct SelectionArgs {
    /// Only process these election kinds
    #[arg(long, value_enum, value_delimiter = ',', value_name = "KINDS")]
    pub only: Vec<ElectionKind>,

    /// Only process these election years (e.g., 2021,2025)
    #[arg(long, value_delimiter = ',', value_name = "YEARS")]
    pub year: Vec<String>,
}

#[derive(Args, Debug, Default)]
pub struct MapArgs {
    /// Recompute mappings that already exist
    #[arg(long)]
    pub force: bool,

    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Keep only the first intersecting district per postal code
    #[arg(long)]
    pub first_match: bool,

    /// Spread postal codes across worker threads
    #[arg(long)]
    pub parallel: bool,

    /// Postal-code layer (defaults to <data-root>/plz/plz.geojson)
    #[arg(long, value_name = "FILE")]
    pub plz: Option<PathBuf>,
}

#[derive(Args, Debug, Default)]
pub struct CatalogArgs {
    /// Overwrite an existing catalogue
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct DetectArgs {
    /// District layer (GeoJSON or Shapefile)
    pub path: PathBuf,
}

#[derive(Args, Debug, Default)]
pub struct AllArgs {
    /// Force every step
    #[arg(long)]
    pub force: bool,

    #[command(flatten)]
    pub selection: SelectionArgs,
}
