//! plzmap CLI - Command-line interface
//!
//! Drives the mapping pipeline over the election data tree: shapefile
//! conversion, the postal-code join and the election catalogue.

mod catalog;
mod cli;
mod commands;
mod config_loader;
mod discovery;
mod output;
mod progress;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Cli;
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config_loader::load_config(&cli)?;

    init_tracing(&config.log_file(), cli.verbose)?;
    tracing::debug!("Configuration: {:?}", config.to_inspection_map());

    commands::execute(cli, &config)
}

/// Append to the pipeline log and, with `--verbose`, echo to stderr
fn init_tracing(log_file: &Path, verbose: bool) -> Result<()> {
    if let Some(dir) = log_file.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("Failed to open log file {}", log_file.display()))?;

    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(Mutex::new(file));
    let console_layer = verbose.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Failed to install the tracing subscriber")?;
    Ok(())
}
