use crate::error::{PlzmapError, Result};
use crate::models::MatchPolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration source for tracking where values come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Default value
    Default,
    /// Loaded from config file
    File,
    /// Loaded from environment variable
    Environment,
    /// Provided via CLI argument
    Cli,
}

impl ConfigSource {
    /// Returns the precedence level (higher = higher priority)
    pub fn precedence(&self) -> u8 {
        match self {
            ConfigSource::Default => 0,
            ConfigSource::File => 1,
            ConfigSource::Environment => 2,
            ConfigSource::Cli => 3,
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }

    /// Update the value if the new source has higher precedence
    pub fn update(&mut self, value: T, source: ConfigSource) {
        if source.precedence() > self.source.precedence() {
            self.value = value;
            self.source = source;
        }
    }
}

/// Layered configuration for the mapping pipeline
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    /// Root of the raw election data tree (`bundestagswahlen/`, ...)
    pub data_root: ConfigValue<PathBuf>,
    /// Root the mapped GeoJSON files and the catalogue are written to
    pub output_root: ConfigValue<PathBuf>,
    /// Postal-code layer; derived from `data_root` when unset
    pub plz_path: ConfigValue<Option<PathBuf>>,
    /// Directory holding `pipeline.log`
    pub log_dir: ConfigValue<PathBuf>,
    pub match_policy: ConfigValue<MatchPolicy>,
    /// Grid size coordinates are snapped to before geometry repair
    pub snap_precision: ConfigValue<Option<f64>>,
    pub parallel: ConfigValue<bool>,
}

impl LayeredConfig {
    /// Create a new configuration with default values
    pub fn with_defaults() -> Self {
        Self {
            data_root: ConfigValue::new(PathBuf::from("script/data"), ConfigSource::Default),
            output_root: ConfigValue::new(PathBuf::from("www/server/data"), ConfigSource::Default),
            plz_path: ConfigValue::new(None, ConfigSource::Default),
            log_dir: ConfigValue::new(PathBuf::from("script/logs"), ConfigSource::Default),
            match_policy: ConfigValue::new(MatchPolicy::All, ConfigSource::Default),
            snap_precision: ConfigValue::new(None, ConfigSource::Default),
            parallel: ConfigValue::new(false, ConfigSource::Default),
        }
    }

    /// Effective postal-code layer path
    pub fn plz_path(&self) -> PathBuf {
        self.plz_path
            .value
            .clone()
            .unwrap_or_else(|| self.data_root.value.join("plz").join("plz.geojson"))
    }

    /// Effective log file path
    pub fn log_file(&self) -> PathBuf {
        self.log_dir.value.join("pipeline.log")
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| PlzmapError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to read config file: {}", e),
            })?;

        let file_config: FileConfig =
            toml::from_str(&content).map_err(|e| PlzmapError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to parse TOML: {}", e),
            })?;

        if let Some(data_root) = file_config.data_root {
            self.data_root.update(data_root, ConfigSource::File);
        }

        if let Some(output_root) = file_config.output_root {
            self.output_root.update(output_root, ConfigSource::File);
        }

        if let Some(plz_path) = file_config.plz_path {
            self.plz_path.update(Some(plz_path), ConfigSource::File);
        }

        if let Some(log_dir) = file_config.log_dir {
            self.log_dir.update(log_dir, ConfigSource::File);
        }

        if let Some(match_policy) = file_config.match_policy {
            self.match_policy.update(match_policy, ConfigSource::File);
        }

        if let Some(precision) = file_config.snap_precision {
            validate_snap_precision(precision)?;
            self.snap_precision.update(Some(precision), ConfigSource::File);
        }

        if let Some(parallel) = file_config.parallel {
            self.parallel.update(parallel, ConfigSource::File);
        }

        Ok(self)
    }

    /// Load configuration from environment variables
    pub fn load_from_env(mut self) -> Self {
        if let Ok(path) = env::var("PLZMAP_DATA_ROOT") {
            self.data_root.update(PathBuf::from(path), ConfigSource::Environment);
        }

        if let Ok(path) = env::var("PLZMAP_OUTPUT_ROOT") {
            self.output_root.update(PathBuf::from(path), ConfigSource::Environment);
        }

        if let Ok(path) = env::var("PLZMAP_PLZ_PATH") {
            self.plz_path.update(Some(PathBuf::from(path)), ConfigSource::Environment);
        }

        if let Ok(path) = env::var("PLZMAP_LOG_DIR") {
            self.log_dir.update(PathBuf::from(path), ConfigSource::Environment);
        }

        if let Ok(policy_str) = env::var("PLZMAP_MATCH_POLICY") {
            match parse_match_policy(&policy_str) {
                Ok(policy) => self.match_policy.update(policy, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid PLZMAP_MATCH_POLICY value '{}': expected all or first",
                    policy_str
                ),
            }
        }

        if let Ok(precision_str) = env::var("PLZMAP_SNAP_PRECISION") {
            match parse_snap_precision(&precision_str) {
                Ok(precision) => {
                    self.snap_precision.update(Some(precision), ConfigSource::Environment)
                }
                Err(_) => tracing::warn!(
                    "Invalid PLZMAP_SNAP_PRECISION value '{}': expected a positive number",
                    precision_str
                ),
            }
        }

        if let Ok(parallel_str) = env::var("PLZMAP_PARALLEL") {
            match parse_bool(&parallel_str) {
                Some(parallel) => self.parallel.update(parallel, ConfigSource::Environment),
                None => tracing::warn!(
                    "Invalid PLZMAP_PARALLEL value '{}': expected true or false",
                    parallel_str
                ),
            }
        }

        self
    }

    /// Update configuration from CLI arguments
    pub fn update_from_cli(&mut self, overrides: CliConfigOverrides) {
        if let Some(data_root) = overrides.data_root {
            self.data_root.update(data_root, ConfigSource::Cli);
        }

        if let Some(output_root) = overrides.output_root {
            self.output_root.update(output_root, ConfigSource::Cli);
        }

        if let Some(plz_path) = overrides.plz_path {
            self.plz_path.update(Some(plz_path), ConfigSource::Cli);
        }

        if let Some(match_policy) = overrides.match_policy {
            self.match_policy.update(match_policy, ConfigSource::Cli);
        }

        if let Some(parallel) = overrides.parallel {
            self.parallel.update(parallel, ConfigSource::Cli);
        }
    }

    /// Get all configuration values as a map for inspection
    pub fn to_inspection_map(&self) -> HashMap<String, (String, ConfigSource)> {
        let mut map = HashMap::new();

        map.insert(
            "data_root".to_string(),
            (self.data_root.value.display().to_string(), self.data_root.source),
        );

        map.insert(
            "output_root".to_string(),
            (self.output_root.value.display().to_string(), self.output_root.source),
        );

        map.insert(
            "plz_path".to_string(),
            (self.plz_path().display().to_string(), self.plz_path.source),
        );

        map.insert(
            "log_dir".to_string(),
            (self.log_dir.value.display().to_string(), self.log_dir.source),
        );

        map.insert(
            "match_policy".to_string(),
            (format!("{:?}", self.match_policy.value), self.match_policy.source),
        );

        map.insert(
            "snap_precision".to_string(),
            (
                self.snap_precision
                    .value
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "none".to_string()),
                self.snap_precision.source,
            ),
        );

        map.insert(
            "parallel".to_string(),
            (self.parallel.value.to_string(), self.parallel.source),
        );

        map
    }
}

/// Configuration loaded from TOML file
#[derive(Debug, Deserialize, Serialize)]
struct FileConfig {
    data_root: Option<PathBuf>,
    output_root: Option<PathBuf>,
    plz_path: Option<PathBuf>,
    log_dir: Option<PathBuf>,
    match_policy: Option<MatchPolicy>,
    snap_precision: Option<f64>,
    parallel: Option<bool>,
}

/// CLI configuration overrides
#[derive(Debug, Default)]
pub struct CliConfigOverrides {
    pub data_root: Option<PathBuf>,
    pub output_root: Option<PathBuf>,
    pub plz_path: Option<PathBuf>,
    pub match_policy: Option<MatchPolicy>,
    pub parallel: Option<bool>,
}

/// Parse match policy from string
pub fn parse_match_policy(s: &str) -> Result<MatchPolicy> {
    match s.to_lowercase().as_str() {
        "all" => Ok(MatchPolicy::All),
        "first" | "first-match" | "first_match" => Ok(MatchPolicy::FirstMatch),
        _ => Err(PlzmapError::ConfigInvalid {
            key: "match_policy".to_string(),
            reason: format!("Invalid match policy: {}. Use all or first", s),
        }),
    }
}

/// Parse snap precision from string
pub fn parse_snap_precision(s: &str) -> Result<f64> {
    let precision = s.trim().parse::<f64>().map_err(|_| PlzmapError::ConfigInvalid {
        key: "snap_precision".to_string(),
        reason: format!("Not a number: {}", s),
    })?;
    validate_snap_precision(precision)?;
    Ok(precision)
}

fn validate_snap_precision(precision: f64) -> Result<()> {
    if precision.is_finite() && precision > 0.0 {
        Ok(())
    } else {
        Err(PlzmapError::ConfigInvalid {
            key: "snap_precision".to_string(),
            reason: format!("Snap precision must be a positive number, got {}", precision),
        })
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = LayeredConfig::with_defaults();
        assert_eq!(config.data_root.value, PathBuf::from("script/data"));
        assert_eq!(config.data_root.source, ConfigSource::Default);
        assert_eq!(config.match_policy.value, MatchPolicy::All);
        assert_eq!(config.plz_path(), PathBuf::from("script/data/plz/plz.geojson"));
        assert_eq!(config.log_file(), PathBuf::from("script/logs/pipeline.log"));
        assert!(!config.parallel.value);
    }

    #[test]
    fn test_config_precedence() {
        let mut value = ConfigValue::new(100, ConfigSource::Default);

        // File should override default
        value.update(200, ConfigSource::File);
        assert_eq!(value.value, 200);
        assert_eq!(value.source, ConfigSource::File);

        // Environment should override file
        value.update(300, ConfigSource::Environment);
        assert_eq!(value.value, 300);
        assert_eq!(value.source, ConfigSource::Environment);

        // CLI should override environment
        value.update(400, ConfigSource::Cli);
        assert_eq!(value.value, 400);
        assert_eq!(value.source, ConfigSource::Cli);

        // Lower precedence should not override
        value.update(500, ConfigSource::File);
        assert_eq!(value.value, 400);
        assert_eq!(value.source, ConfigSource::Cli);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
data_root = "/srv/wahl/data"
output_root = "/srv/wahl/out"
match_policy = "first-match"
snap_precision = 0.001
parallel = true
"#
        )
        .unwrap();

        let config = LayeredConfig::with_defaults().load_from_file(file.path()).unwrap();

        assert_eq!(config.data_root.value, PathBuf::from("/srv/wahl/data"));
        assert_eq!(config.data_root.source, ConfigSource::File);
        assert_eq!(config.plz_path(), PathBuf::from("/srv/wahl/data/plz/plz.geojson"));
        assert_eq!(config.output_root.value, PathBuf::from("/srv/wahl/out"));
        assert_eq!(config.match_policy.value, MatchPolicy::FirstMatch);
        assert_eq!(config.snap_precision.value, Some(0.001));
        assert!(config.parallel.value);
    }

    #[test]
    fn test_load_from_file_rejects_negative_precision() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "snap_precision = -1.0").unwrap();

        let result = LayeredConfig::with_defaults().load_from_file(file.path());
        assert!(matches!(result, Err(PlzmapError::ConfigInvalid { .. })));
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = LayeredConfig::with_defaults();

        let overrides = CliConfigOverrides {
            plz_path: Some(PathBuf::from("plz.geojson")),
            match_policy: Some(MatchPolicy::FirstMatch),
            ..Default::default()
        };

        config.update_from_cli(overrides);

        assert_eq!(config.plz_path(), PathBuf::from("plz.geojson"));
        assert_eq!(config.plz_path.source, ConfigSource::Cli);
        assert_eq!(config.match_policy.value, MatchPolicy::FirstMatch);
        // These should still be defaults
        assert_eq!(config.data_root.source, ConfigSource::Default);
        assert_eq!(config.parallel.source, ConfigSource::Default);
    }

    #[test]
    fn test_parse_match_policy() {
        assert_eq!(parse_match_policy("all").unwrap(), MatchPolicy::All);
        assert_eq!(parse_match_policy("FIRST").unwrap(), MatchPolicy::FirstMatch);
        assert_eq!(parse_match_policy("first-match").unwrap(), MatchPolicy::FirstMatch);
        assert!(parse_match_policy("some").is_err());
    }

    #[test]
    fn test_parse_snap_precision() {
        assert_eq!(parse_snap_precision("0.5").unwrap(), 0.5);
        assert!(parse_snap_precision("0").is_err());
        assert!(parse_snap_precision("NaN").is_err());
        assert!(parse_snap_precision("abc").is_err());
    }

    #[test]
    fn test_inspection_map() {
        let config = LayeredConfig::with_defaults();
        let map = config.to_inspection_map();

        assert!(map.contains_key("data_root"));
        assert!(map.contains_key("match_policy"));
        assert!(map.contains_key("snap_precision"));

        let (precision, source) = &map["snap_precision"];
        assert_eq!(precision, "none");
        assert_eq!(*source, ConfigSource::Default);
    }
}
