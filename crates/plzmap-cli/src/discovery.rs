//! Layout of the election data tree
//!
//! District layers live under `<data_root>/<kind>/` and their mappings are
//! written to the mirrored location under `<output_root>/<kind>/`:
//!
//! - `bundestagswahlen/<year>/` → `btw<year>_mapped.geojson`
//! - `landtagswahlen/<land>/<year>/` → `ltw<year>_mapped.geojson`
//! - `kommunalwahlen/<kommune>/<year>/` → `kw<kommune><year>_mapped.geojson`

use clap::ValueEnum;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Marker in the file name of every join output
pub const MAPPED_MARKER: &str = "_mapped";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum ElectionKind {
    /// Federal elections
    #[value(name = "btw")]
    Bundestag,
    /// State elections
    #[value(name = "ltw")]
    Landtag,
    /// Municipal elections
    #[value(name = "kw")]
    Kommunal,
}

impl ElectionKind {
    pub const ALL: [ElectionKind; 3] =
        [ElectionKind::Bundestag, ElectionKind::Landtag, ElectionKind::Kommunal];

    /// Directory below the data and output roots
    pub fn directory(self) -> &'static str {
        match self {
            ElectionKind::Bundestag => "bundestagswahlen",
            ElectionKind::Landtag => "landtagswahlen",
            ElectionKind::Kommunal => "kommunalwahlen",
        }
    }

    /// Short code used in output file names and `--only`
    pub fn prefix(self) -> &'static str {
        match self {
            ElectionKind::Bundestag => "btw",
            ElectionKind::Landtag => "ltw",
            ElectionKind::Kommunal => "kw",
        }
    }

    /// Catalogue label stem
    pub fn label(self) -> &'static str {
        match self {
            ElectionKind::Bundestag => "Bundestagswahl",
            ElectionKind::Landtag => "Landtagswahl",
            ElectionKind::Kommunal => "Kommunalwahl",
        }
    }

    pub fn from_directory(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.directory() == name)
    }

    /// Federal elections have no region level
    pub fn has_region(self) -> bool {
        !matches!(self, ElectionKind::Bundestag)
    }
}

/// Position of a file in the election tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElectionPath {
    pub kind: ElectionKind,
    /// Region directory as written on disk; `None` for federal elections
    pub region: Option<String>,
    pub year: String,
}

impl ElectionPath {
    /// Parse a path relative to a data or output root
    ///
    /// The year directory must be followed by at least one more component,
    /// so `bundestagswahlen/2025.geojson` is not recognised.
    pub fn parse(relative: &Path) -> Option<Self> {
        let parts = normal_components(relative)?;
        let kind = ElectionKind::from_directory(parts.first()?)?;

        let (region, year) = if kind.has_region() {
            (Some(parts.get(1)?.to_string()), *parts.get(2)?)
        } else {
            (None, *parts.get(1)?)
        };

        let depth = if kind.has_region() { 4 } else { 3 };
        if parts.len() < depth || !is_year(year) {
            return None;
        }

        Some(Self { kind, region, year: year.to_string() })
    }

    /// Normalised region name used in output paths
    pub fn region_slug(&self) -> Option<String> {
        self.region.as_deref().map(normalize_region)
    }

    /// Output file of the mapping for a district layer at this position
    pub fn mapped_output(&self, output_root: &Path) -> PathBuf {
        let kind_dir = output_root.join(self.kind.directory());
        match (self.kind, self.region_slug()) {
            (ElectionKind::Kommunal, Some(kommune)) => kind_dir
                .join(&kommune)
                .join(&self.year)
                .join(format!("kw{}{}{}.geojson", kommune, self.year, MAPPED_MARKER)),
            (kind, Some(region)) => kind_dir
                .join(region)
                .join(&self.year)
                .join(format!("{}{}{}.geojson", kind.prefix(), self.year, MAPPED_MARKER)),
            (kind, None) => kind_dir
                .join(&self.year)
                .join(format!("{}{}{}.geojson", kind.prefix(), self.year, MAPPED_MARKER)),
        }
    }

    /// Human-readable catalogue label, e.g. "Landtagswahl Nordrhein Westfalen 2022"
    pub fn label(&self) -> String {
        match &self.region {
            Some(region) => {
                let region = title_case(&region.replace('_', " "));
                format!("{} {} {}", self.kind.label(), region, self.year)
            }
            None => format!("{} {}", self.kind.label(), self.year),
        }
    }
}

/// A district layer found in the data tree together with its output location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistrictDataset {
    pub source: PathBuf,
    pub position: ElectionPath,
    pub output: PathBuf,
}

impl DistrictDataset {
    /// Empty selections match everything
    pub fn is_selected(&self, kinds: &[ElectionKind], years: &[String]) -> bool {
        (kinds.is_empty() || kinds.contains(&self.position.kind))
            && (years.is_empty() || years.iter().any(|y| *y == self.position.year))
    }
}

/// District layers of the data tree
#[derive(Debug, Default)]
pub struct Discovery {
    pub datasets: Vec<DistrictDataset>,

    /// GeoJSON files below an election directory whose path did not parse
    pub unrecognized: Vec<PathBuf>,
}

/// Find every district GeoJSON below `data_root`, skipping earlier join outputs
pub fn discover_district_layers(data_root: &Path, output_root: &Path) -> Discovery {
    let mut discovery = Discovery::default();

    for source in find_files(data_root, "geojson") {
        if is_mapped_output(&source) {
            continue;
        }

        let position = source.strip_prefix(data_root).ok().and_then(ElectionPath::parse);
        match position {
            Some(position) => {
                let output = position.mapped_output(output_root);
                discovery.datasets.push(DistrictDataset { source, position, output });
            }
            None => discovery.unrecognized.push(source),
        }
    }

    discovery
}

/// Files with `extension` below the election directories of `root`, in path order
pub fn find_files(root: &Path, extension: &str) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for kind in ElectionKind::ALL {
        let dir = root.join(kind.directory());
        if !dir.is_dir() {
            tracing::debug!("No {} directory below {}", kind.directory(), root.display());
            continue;
        }

        for entry in WalkDir::new(&dir).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry below {}: {}", dir.display(), e);
                    continue;
                }
            };
            let matches = entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(extension));
            if entry.file_type().is_file() && matches {
                files.push(entry.into_path());
            }
        }
    }

    files
}

pub fn is_mapped_output(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.contains(MAPPED_MARKER))
}

/// `path` relative to `root` when below it
pub fn relative_display(path: &Path, root: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}

/// Lowercase, spaces to underscores
pub fn normalize_region(name: &str) -> String {
    name.to_lowercase().replace(' ', "_")
}

/// Capitalise the first letter of every alphabetic run and lowercase the rest
pub fn title_case(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut in_word = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if in_word {
                result.extend(c.to_lowercase());
            } else {
                result.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            result.push(c);
            in_word = false;
        }
    }
    result
}

fn is_year(s: &str) -> bool {
    s.len() == 4 && s.bytes().all(|b| b.is_ascii_digit())
}

fn normal_components(path: &Path) -> Option<Vec<&str>> {
    path.components()
        .map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn position(path: &str) -> Option<ElectionPath> {
        ElectionPath::parse(Path::new(path))
    }

    #[test]
    fn test_parse_federal() {
        let parsed = position("bundestagswahlen/2025/btw25_wkr.geojson").unwrap();

        assert_eq!(parsed.kind, ElectionKind::Bundestag);
        assert_eq!(parsed.region, None);
        assert_eq!(parsed.year, "2025");
    }

    #[test]
    fn test_parse_rejects_incomplete_paths() {
        assert!(position("bundestagswahlen/2025.geojson").is_none());
        assert!(position("bundestagswahlen/aktuell/wkr.geojson").is_none());
        assert!(position("landtagswahlen/2022/wkr.geojson").is_none());
        assert!(position("europawahlen/2024/wkr.geojson").is_none());
        assert!(position("../bundestagswahlen/2025/wkr.geojson").is_none());
    }

    #[test]
    fn test_mapped_output_paths() {
        let out = Path::new("/srv/data");

        let federal = position("bundestagswahlen/2021/Geometrie_Wahlkreise_20DBT.geojson").unwrap();
        assert_eq!(
            federal.mapped_output(out),
            PathBuf::from("/srv/data/bundestagswahlen/2021/btw2021_mapped.geojson")
        );

        let state = position("landtagswahlen/Nordrhein Westfalen/2022/lwk.geojson").unwrap();
        assert_eq!(
            state.mapped_output(out),
            PathBuf::from("/srv/data/landtagswahlen/nordrhein_westfalen/2022/ltw2022_mapped.geojson")
        );

        let municipal = position("kommunalwahlen/Köln/2020/stimmbezirke/bezirke.geojson").unwrap();
        assert_eq!(
            municipal.mapped_output(out),
            PathBuf::from("/srv/data/kommunalwahlen/köln/2020/kwköln2020_mapped.geojson")
        );
    }

    #[test]
    fn test_labels() {
        assert_eq!(position("bundestagswahlen/2025/x/y").unwrap().label(), "Bundestagswahl 2025");
        assert_eq!(
            position("landtagswahlen/baden-württemberg/2021/x").unwrap().label(),
            "Landtagswahl Baden-Württemberg 2021"
        );
        assert_eq!(
            position("kommunalwahlen/frankfurt_am_main/2021/x").unwrap().label(),
            "Kommunalwahl Frankfurt Am Main 2021"
        );
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("nordrhein westfalen"), "Nordrhein Westfalen");
        assert_eq!(title_case("MÜNCHEN"), "München");
        assert_eq!(title_case("halle (saale)"), "Halle (Saale)");
    }

    #[test]
    fn test_selection() {
        let dataset = DistrictDataset {
            source: PathBuf::from("a"),
            position: position("landtagswahlen/bayern/2023/x").unwrap(),
            output: PathBuf::from("b"),
        };

        assert!(dataset.is_selected(&[], &[]));
        assert!(dataset.is_selected(&[ElectionKind::Landtag], &["2023".to_string()]));
        assert!(!dataset.is_selected(&[ElectionKind::Bundestag, ElectionKind::Kommunal], &[]));
        assert!(!dataset.is_selected(&[], &["2018".to_string()]));
    }

    #[test]
    fn test_discover_skips_mapped_and_reports_unrecognized() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        for path in [
            "bundestagswahlen/2025/wkr.geojson",
            "bundestagswahlen/2025/btw2025_mapped.geojson",
            "bundestagswahlen/2025/wkr.shp",
            "landtagswahlen/Bayern/2023/stimmkreise.GeoJSON",
            "landtagswahlen/Bayern/alt.geojson",
            "plz/plz.geojson",
        ] {
            let path = data.join(path);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, "{}").unwrap();
        }

        let discovery = discover_district_layers(&data, Path::new("out"));

        let sources: Vec<_> = discovery.datasets.iter().map(|d| d.source.clone()).collect();
        assert_eq!(
            sources,
            vec![
                data.join("bundestagswahlen/2025/wkr.geojson"),
                data.join("landtagswahlen/Bayern/2023/stimmkreise.GeoJSON"),
            ]
        );
        assert_eq!(
            discovery.datasets[1].output,
            PathBuf::from("out/landtagswahlen/bayern/2023/ltw2023_mapped.geojson")
        );
        assert_eq!(discovery.unrecognized, vec![data.join("landtagswahlen/Bayern/alt.geojson")]);
    }

    #[test]
    fn test_find_files_missing_root() {
        assert!(find_files(Path::new("/nonexistent/plzmap"), "shp").is_empty());
    }
}
