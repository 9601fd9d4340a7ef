//! Configuration loading utilities for CLI commands

use anyhow::{Context, Result};
use plzmap_core::config::{CliConfigOverrides, LayeredConfig};
use plzmap_core::models::MatchPolicy;
use std::path::{Path, PathBuf};

use crate::cli::{Cli, Commands};

/// Loaded from the working directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "plzmap.toml";

/// Defaults, then the config file, then `PLZMAP_*` variables, then flags
pub fn load_config(cli: &Cli) -> Result<LayeredConfig> {
    let mut config = LayeredConfig::with_defaults();

    if let Some(path) = config_file(cli.config.as_deref()) {
        config = config
            .load_from_file(&path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    }

    let mut config = config.load_from_env();
    config.update_from_cli(overrides(cli));
    Ok(config)
}

/// An explicit file must exist; the default one is optional
fn config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            default.is_file().then_some(default)
        }
    }
}

/// Flags that override configuration values
pub fn overrides(cli: &Cli) -> CliConfigOverrides {
    let mut overrides = CliConfigOverrides {
        data_root: cli.data_root.clone(),
        output_root: cli.output_root.clone(),
        ..Default::default()
    };

    if let Commands::Map(args) = &cli.command {
        overrides.plz_path = args.plz.clone();
        if args.first_match {
            overrides.match_policy = Some(MatchPolicy::FirstMatch);
        }
        if args.parallel {
            overrides.parallel = Some(true);
        }
    }

    overrides
}
