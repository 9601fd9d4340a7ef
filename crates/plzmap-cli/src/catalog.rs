//! Election catalogue (`wahldateien.csv`)
//!
//! The web frontend lists every mapped election from this file. Each row is
//! `data/<path relative to output root>,<label>`, sorted by label descending
//! so the most recent elections come first.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::discovery::{find_files, ElectionKind, ElectionPath, MAPPED_MARKER};

pub const CATALOG_FILE: &str = "wahldateien.csv";

/// Prefix the web server serves the output root under
const SERVED_PREFIX: &str = "data";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub path: String,
    pub label: String,
}

#[derive(Debug, Default)]
pub struct Catalog {
    pub entries: Vec<CatalogEntry>,
    pub warnings: Vec<String>,
}

/// Scan `output_root` for mapped files and derive their labels
///
/// Duplicates are kept and reported; unparseable paths are reported and left out.
pub fn build_catalog(output_root: &Path) -> Catalog {
    let mut catalog = Catalog::default();
    let mut labels_seen = HashSet::new();
    let mut paths_seen = HashSet::new();

    for kind in ElectionKind::ALL {
        let dir = output_root.join(kind.directory());
        if !dir.is_dir() {
            catalog.warnings.push(format!("Directory not found: {}", dir.display()));
        }
    }

    let suffix = format!("{}.geojson", MAPPED_MARKER);
    for file in find_files(output_root, "geojson") {
        let is_mapped = file
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(&suffix));
        if !is_mapped {
            continue;
        }

        let Ok(relative) = file.strip_prefix(output_root) else {
            continue;
        };
        let path = served_path(relative);
        tracing::debug!("Found mapped file {}", path);

        let Some(position) = ElectionPath::parse(relative) else {
            catalog.warnings.push(format!("Ignoring path without year or region: {}", path));
            continue;
        };
        let label = position.label();

        if !labels_seen.insert(label.clone()) {
            catalog.warnings.push(format!("Duplicate label: {}", label));
        }
        if !paths_seen.insert(path.clone()) {
            catalog.warnings.push(format!("Duplicate path: {}", path));
        }
        catalog.entries.push(CatalogEntry { path, label });
    }

    catalog.entries.sort_by(|a, b| b.label.cmp(&a.label));
    catalog
}

/// Write the catalogue rows without a header
pub fn write_catalog(path: &Path, entries: &[CatalogEntry]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::CRLF)
        .from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    for entry in entries {
        writer.write_record([entry.path.as_str(), entry.label.as_str()])?;
    }
    writer.flush()?;
    Ok(())
}

/// `data/` plus the relative path with forward slashes
fn served_path(relative: &Path) -> String {
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    format!("{}/{}", SERVED_PREFIX, parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "{}").unwrap();
    }

    #[test]
    fn test_catalog_sorted_by_label_descending() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(root, "bundestagswahlen/2021/btw2021_mapped.geojson");
        touch(root, "bundestagswahlen/2025/btw2025_mapped.geojson");
        touch(root, "landtagswahlen/nordrhein_westfalen/2022/ltw2022_mapped.geojson");
        touch(root, "kommunalwahlen/köln/2020/kwköln2020_mapped.geojson");
        touch(root, "bundestagswahlen/2025/wkr.geojson");

        let catalog = build_catalog(root);

        let labels: Vec<&str> = catalog.entries.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "Landtagswahl Nordrhein Westfalen 2022",
                "Kommunalwahl Köln 2020",
                "Bundestagswahl 2025",
                "Bundestagswahl 2021",
            ]
        );
        assert_eq!(catalog.entries[2].path, "data/bundestagswahlen/2025/btw2025_mapped.geojson");
        assert!(catalog.warnings.is_empty());
    }

    #[test]
    fn test_catalog_warnings() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(root, "bundestagswahlen/2025/btw2025_mapped.geojson");
        touch(root, "bundestagswahlen/2025/alt/btw2025_mapped.geojson");
        touch(root, "bundestagswahlen/btw_mapped.geojson");

        let catalog = build_catalog(root);

        assert_eq!(catalog.entries.len(), 2);
        assert!(catalog.warnings.iter().any(|w| w == "Duplicate label: Bundestagswahl 2025"));
        assert!(catalog.warnings.iter().any(|w| w.starts_with("Ignoring path")));
        assert!(catalog.warnings.iter().any(|w| w.contains("landtagswahlen")));
        assert!(catalog.warnings.iter().any(|w| w.contains("kommunalwahlen")));
    }

    #[test]
    fn test_write_catalog_quotes_when_needed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CATALOG_FILE);
        let entries = vec![
            CatalogEntry {
                path: "data/bundestagswahlen/2025/btw2025_mapped.geojson".to_string(),
                label: "Bundestagswahl 2025".to_string(),
            },
            CatalogEntry { path: "data/x.geojson".to_string(), label: "Wahl, Sonder".to_string() },
        ];

        write_catalog(&path, &entries).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines,
            vec![
                "data/bundestagswahlen/2025/btw2025_mapped.geojson,Bundestagswahl 2025",
                "data/x.geojson,\"Wahl, Sonder\"",
            ]
        );
    }
}
