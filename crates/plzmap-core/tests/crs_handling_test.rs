//! Integration tests for CRS handling across the layer readers
//!
//! This test suite verifies that:
//! - GeoJSON without a crs member is read as EPSG:4326
//! - Legacy crs members are honoured
//! - Shapefiles take their CRS from the .prj file
//! - A shapefile without a usable .prj has an undefined CRS

use plzmap_core::formats::shapefile::ShapefileReader;
use plzmap_core::formats::{FormatRegistry, LayerReader};
use plzmap_core::models::AttributeValue;
use plzmap_core::PlzmapError;
use shapefile::dbase::{FieldName, FieldValue, Record, TableWriterBuilder};
use shapefile::{Point, Polygon, PolygonRing};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const UTM32_PRJ: &str = r#"PROJCS["ETRS_1989_UTM_Zone_32N",GEOGCS["GCS_ETRS_1989",DATUM["D_ETRS_1989",SPHEROID["GRS_1980",6378137.0,298.257222101]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]],PROJECTION["Transverse_Mercator"],PARAMETER["False_Easting",500000.0],PARAMETER["False_Northing",0.0],PARAMETER["Central_Meridian",9.0],PARAMETER["Scale_Factor",0.9996],PARAMETER["Latitude_Of_Origin",0.0],UNIT["Meter",1.0]]"#;

/// Write a two-district shapefile with WKR_NR and WKR_NAME columns
fn write_districts(dir: &Path, prj: Option<&str>) -> PathBuf {
    let path = dir.join("btw25_wkr.shp");
    {
        let table = TableWriterBuilder::new()
            .add_numeric_field(FieldName::try_from("WKR_NR").unwrap(), 10, 0)
            .add_character_field(FieldName::try_from("WKR_NAME").unwrap(), 50);
        let mut writer = shapefile::Writer::from_path(&path, table).unwrap();

        for (nr, name, x0) in [(1.0, "Flensburg - Schleswig", 0.0), (2.0, "Nordfriesland", 10.0)] {
            let polygon = Polygon::new(PolygonRing::Outer(vec![
                Point::new(x0, 0.0),
                Point::new(x0, 10.0),
                Point::new(x0 + 10.0, 10.0),
                Point::new(x0 + 10.0, 0.0),
                Point::new(x0, 0.0),
            ]));
            let mut record = Record::default();
            record.insert("WKR_NR".to_string(), FieldValue::Numeric(Some(nr)));
            record.insert("WKR_NAME".to_string(), FieldValue::Character(Some(name.to_string())));
            writer.write_shape_and_record(&polygon, &record).unwrap();
        }
    }

    if let Some(prj) = prj {
        fs::write(path.with_extension("prj"), prj).unwrap();
    }
    path
}

/// Rewrite the second district's name as cp1252 "München" under the given
/// language driver byte
fn patch_dbf_to_cp1252(path: &Path, language_driver: u8) {
    let dbf = path.with_extension("dbf");
    let mut bytes = fs::read(&dbf).unwrap();
    let pos = bytes.windows(13).position(|w| w == b"Nordfriesland").unwrap();
    let name: &[u8; 13] = b"M\xFCnchen      ";
    bytes[pos..pos + 13].copy_from_slice(name);
    bytes[29] = language_driver;
    fs::write(&dbf, bytes).unwrap();
}

#[test]
fn test_geojson_with_crs() {
    let temp_dir = TempDir::new().unwrap();
    let file_path = temp_dir.path().join("wahlkreise.geojson");

    let geojson_content = r#"{
        "type": "FeatureCollection",
        "crs": {
            "type": "name",
            "properties": {
                "name": "EPSG:3857"
            }
        },
        "features": [
            {
                "type": "Feature",
                "geometry": {
                    "type": "Point",
                    "coordinates": [0.0, 0.0]
                },
                "properties": {}
            }
        ]
    }"#;

    fs::write(&file_path, geojson_content).unwrap();
    let layer = FormatRegistry::with_defaults().read(&file_path).unwrap();

    assert_eq!(layer.crs().map(|c| c.epsg), Some(3857), "Should extract EPSG:3857 from crs member");
}

#[test]
fn test_geojson_without_crs_defaults_to_4326() {
    let temp_dir = TempDir::new().unwrap();
    let file_path = temp_dir.path().join("plz.geojson");

    let geojson_content = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "geometry": {
                    "type": "Point",
                    "coordinates": [13.4, 52.5]
                },
                "properties": {"plz": "10115"}
            }
        ]
    }"#;

    fs::write(&file_path, geojson_content).unwrap();
    let layer = FormatRegistry::with_defaults().read(&file_path).unwrap();

    assert_eq!(
        layer.crs().map(|c| c.epsg),
        Some(4326),
        "Should default to EPSG:4326 when CRS not specified"
    );
}

#[test]
fn test_shapefile_crs_from_esri_prj() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_districts(temp_dir.path(), Some(UTM32_PRJ));

    let layer = FormatRegistry::with_defaults().read(&path).unwrap();

    assert_eq!(layer.crs().map(|c| c.epsg), Some(25832));
    assert_eq!(layer.len(), 2);
    assert_eq!(layer.features()[0].attribute("WKR_NR"), Some(&AttributeValue::Integer(1)));
    assert_eq!(
        layer.features()[1].attribute("WKR_NAME"),
        Some(&AttributeValue::Text("Nordfriesland".to_string()))
    );
    assert!(matches!(layer.features()[0].geometry, geo::Geometry::MultiPolygon(_)));
}

#[test]
fn test_shapefile_crs_from_authority_prj() {
    let temp_dir = TempDir::new().unwrap();
    let prj = r#"PROJCS["ETRS89 / UTM zone 33N",GEOGCS["ETRS89",AUTHORITY["EPSG","4258"]],UNIT["metre",1],AUTHORITY["EPSG","25833"]]"#;
    let path = write_districts(temp_dir.path(), Some(prj));

    let layer = ShapefileReader.read(&path).unwrap();
    assert_eq!(layer.crs().map(|c| c.epsg), Some(25833));
}

#[test]
fn test_shapefile_without_prj_has_undefined_crs() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_districts(temp_dir.path(), None);

    let validation = ShapefileReader.validate(&path).unwrap();
    assert!(validation.is_valid());
    assert!(validation.warnings.iter().any(|w| w.contains(".prj")));

    let layer = FormatRegistry::with_defaults().read(&path).unwrap();
    assert!(layer.crs().is_none());
    assert_eq!(layer.len(), 2);
}

#[test]
fn test_shapefile_with_unknown_prj_has_undefined_crs() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_districts(temp_dir.path(), Some(r#"LOCAL_CS["Bauamt Lokal"]"#));

    let layer = ShapefileReader.read(&path).unwrap();
    assert!(layer.crs().is_none());
}

#[test]
fn test_shapefile_missing_component_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_districts(temp_dir.path(), Some(UTM32_PRJ));
    fs::remove_file(path.with_extension("dbf")).unwrap();

    let result = FormatRegistry::with_defaults().read(&path);
    match result {
        Err(PlzmapError::FormatError { format, message }) => {
            assert_eq!(format, "Shapefile");
            assert!(message.contains(".dbf"));
        }
        other => panic!("expected a format error, got {:?}", other.map(|l| l.len())),
    }
}

#[test]
fn test_shapefile_cp1252_names() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_districts(temp_dir.path(), Some(UTM32_PRJ));
    patch_dbf_to_cp1252(&path, 0x03);

    let layer = ShapefileReader.read(&path).unwrap();
    assert_eq!(
        layer.features()[1].attribute("WKR_NAME"),
        Some(&AttributeValue::Text("München".to_string()))
    );
}

#[test]
fn test_shapefile_without_code_page_reads_cp1252() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_districts(temp_dir.path(), Some(UTM32_PRJ));
    patch_dbf_to_cp1252(&path, 0x00);

    let layer = ShapefileReader.read(&path).unwrap();
    assert_eq!(
        layer.features()[1].attribute("WKR_NAME"),
        Some(&AttributeValue::Text("München".to_string()))
    );
}
