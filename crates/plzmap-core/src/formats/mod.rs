//! Layer loaders and writers
//!
//! Each input format implements the `LayerReader` trait, and the
//! `FormatRegistry` picks the reader for a path by its extension. Join
//! results leave the system through a `LayerWriter`.

use std::path::Path;

use crate::error::{PlzmapError, Result};
use crate::models::{Crs, Layer};

pub mod geojson;
pub mod shapefile;
pub mod validation;

use validation::FormatValidator;

/// Layer reader trait that all input formats implement
pub trait LayerReader: Send + Sync {
    /// Read a layer from the given path
    ///
    /// # Arguments
    /// * `path` - Path to the file to read
    ///
    /// # Returns
    /// The loaded `Layer`; its CRS is `None` when the source does not define one
    fn read(&self, path: &Path) -> Result<Layer>;

    /// Get supported file extensions (e.g., ["shp"])
    fn supported_extensions(&self) -> &[&str];

    /// Get human-readable format name (e.g., "Shapefile", "GeoJSON")
    fn format_name(&self) -> &str;

    /// Validate file structure without a full read
    fn validate(&self, path: &Path) -> Result<FormatValidation> {
        Ok(FormatValidator::validate_file_exists(path))
    }
}

/// Layer writer trait for persisting join results
pub trait LayerWriter {
    /// Persist a feature collection at `path`, creating parent directories
    fn write(
        &self,
        collection: &::geojson::FeatureCollection,
        crs: Option<&Crs>,
        path: &Path,
    ) -> Result<()>;
}

/// Result of format validation
#[derive(Debug, Clone, Default)]
pub struct FormatValidation {
    /// Validation errors that prevent reading
    pub errors: Vec<String>,

    /// Warnings that don't prevent reading but indicate potential issues
    pub warnings: Vec<String>,
}

impl FormatValidation {
    /// Check if validation passed (no errors)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Check if there are any warnings
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Central registry for layer readers
pub struct FormatRegistry {
    readers: Vec<Box<dyn LayerReader>>,
}

impl FormatRegistry {
    /// Create a new empty format registry
    pub fn new() -> Self {
        Self { readers: Vec::new() }
    }

    /// Registry with the GeoJSON and Shapefile readers
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(geojson::GeoJsonReader));
        registry.register(Box::new(shapefile::ShapefileReader));
        registry
    }

    /// Register a layer reader
    pub fn register(&mut self, reader: Box<dyn LayerReader>) {
        self.readers.push(reader);
    }

    /// Detect format and return appropriate reader
    pub fn detect_format(&self, path: &Path) -> Result<&dyn LayerReader> {
        let extension = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            PlzmapError::UnsupportedFormat {
                extension: "none".to_string(),
                supported: self.supported_formats(),
            }
        })?;

        self.readers
            .iter()
            .find(|r| {
                r.supported_extensions()
                    .iter()
                    .any(|ext| ext.eq_ignore_ascii_case(extension))
            })
            .map(|r| r.as_ref())
            .ok_or_else(|| PlzmapError::UnsupportedFormat {
                extension: extension.to_string(),
                supported: self.supported_formats(),
            })
    }

    /// Validate and read a layer, logging validation warnings
    pub fn read(&self, path: &Path) -> Result<Layer> {
        if !path.exists() {
            return Err(PlzmapError::LayerNotFound { path: path.to_path_buf() });
        }

        let reader = self.detect_format(path)?;
        let validation = reader.validate(path)?;
        for warning in &validation.warnings {
            tracing::warn!("{}: {}", path.display(), warning);
        }
        FormatValidator::validation_to_result(&validation, reader.format_name())?;

        let layer = reader.read(path)?;
        tracing::debug!(
            "Loaded {} layer '{}' with {} features ({})",
            reader.format_name(),
            layer.name(),
            layer.len(),
            layer.crs().map(|c| c.to_string()).unwrap_or_else(|| "undefined CRS".to_string())
        );
        Ok(layer)
    }

    /// Get list of all supported format extensions
    pub fn supported_formats(&self) -> Vec<String> {
        self.readers
            .iter()
            .flat_map(|r| r.supported_extensions())
            .map(|s| s.to_string())
            .collect()
    }

    /// Get all registered readers
    pub fn readers(&self) -> &[Box<dyn LayerReader>] {
        &self.readers
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Dataset name from a file path
pub(crate) fn layer_name(path: &Path) -> String {
    path.file_stem().and_then(|s| s.to_str()).unwrap_or("unnamed").to_string()
}
