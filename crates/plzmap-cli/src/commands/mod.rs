//! Command implementations

mod catalog;
mod convert;
mod detect;
mod map;

use crate::cli::{CatalogArgs, Cli, Commands, ConvertArgs, MapArgs};
use crate::output::OutputWriter;
use anyhow::Result;
use plzmap_core::config::LayeredConfig;

/// Execute a CLI command
pub fn execute(cli: Cli, config: &LayeredConfig) -> Result<()> {
    let output = OutputWriter::new(cli.json);

    match cli.command {
        Commands::Convert(args) => convert::execute(args, config, &output),
        Commands::Map(args) => map::execute(args, config, &output),
        Commands::Catalog(args) => catalog::execute(args, config, &output),
        Commands::Detect(args) => detect::execute(args, &output),
        Commands::All(args) => {
            convert::execute(ConvertArgs { force: args.force }, config, &output)?;
            let map_args = MapArgs {
                force: args.force,
                selection: args.selection,
                ..Default::default()
            };
            map::execute(map_args, config, &output)?;
            catalog::execute(CatalogArgs { force: args.force }, config, &output)
        }
    }
}
