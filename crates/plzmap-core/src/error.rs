//! Error types for plzmap

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlzmapError {
    // Layer errors
    #[error("Layer not found at {path}")]
    LayerNotFound { path: PathBuf },

    #[error("Layer '{layer}' has no defined CRS; refusing to join undefined coordinates")]
    UndefinedCrs { layer: String },

    #[error("Failed to reproject from {from} to {to}: {reason}")]
    Projection {
        from: String,
        to: String,
        reason: String,
    },

    // Format errors
    #[error("{format} error: {message}")]
    FormatError { format: String, message: String },

    #[error("Unsupported format '.{extension}'. Supported: {}", supported.join(", "))]
    UnsupportedFormat {
        extension: String,
        supported: Vec<String>,
    },

    #[error("Invalid path {path}: {reason}")]
    InvalidPath { path: PathBuf, reason: String },

    // Configuration errors
    #[error("Missing required configuration: {key}")]
    ConfigMissing { key: String },

    #[error("Invalid configuration value for {key}: {reason}")]
    ConfigInvalid { key: String, reason: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl PlzmapError {
    /// Configuration errors make any join output geometrically meaningless
    pub fn is_fatal_configuration(&self) -> bool {
        matches!(
            self,
            PlzmapError::UndefinedCrs { .. }
                | PlzmapError::Projection { .. }
                | PlzmapError::LayerNotFound { .. }
                | PlzmapError::ConfigMissing { .. }
                | PlzmapError::ConfigInvalid { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, PlzmapError>;
