//! plzmap Core - Domain models, layer formats, and configuration
//!
//! This crate contains the layer model shared by the join engine and the CLI,
//! plus the loaders and writers that move layers in and out of files.

pub mod config;
pub mod error;
pub mod formats;
pub mod models;

pub use error::{PlzmapError, Result};
