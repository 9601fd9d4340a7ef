//! Shapefile layer reader
//!
//! Shapefiles consist of multiple component files (.shp, .shx, .dbf, .prj)
//! that must all be present for proper reading; only the .prj is optional,
//! and without it the layer's CRS is undefined.

use shapefile::dbase::FieldValue as DbaseFieldValue;
use shapefile::{PolygonRing, Shape};
use std::fs;
use std::path::{Path, PathBuf};

use geo::{Coord, Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};

use crate::error::{PlzmapError, Result};
use crate::formats::validation::FormatValidator;
use crate::formats::{layer_name, FormatValidation, LayerReader};
use crate::models::{AttributeValue, Attributes, Crs, Feature, Layer};

/// ESRI projection names without an AUTHORITY clause, as shipped by the
/// German electoral offices
const ESRI_PROJECTION_NAMES: &[(&str, u32)] = &[
    ("ETRS_1989_UTM_Zone_32N", 25832),
    ("ETRS_1989_UTM_Zone_33N", 25833),
    ("ETRS89_UTM_zone_32N", 25832),
    ("ETRS89_UTM_zone_33N", 25833),
    ("DHDN_3_Degree_Gauss_Zone_2", 31466),
    ("DHDN_3_Degree_Gauss_Zone_3", 31467),
    ("DHDN_3_Degree_Gauss_Zone_4", 31468),
    ("DHDN_3_Degree_Gauss_Zone_5", 31469),
    ("WGS_1984_Web_Mercator_Auxiliary_Sphere", 3857),
    ("GCS_ETRS_1989", 4258),
    ("GCS_WGS_1984", 4326),
];

/// Shapefile layer reader
pub struct ShapefileReader;

impl LayerReader for ShapefileReader {
    fn read(&self, path: &Path) -> Result<Layer> {
        self.verify_components(path)?;

        let mut reader = shapefile::Reader::from_path(path).map_err(|e| PlzmapError::FormatError {
            format: "Shapefile".to_string(),
            message: format!("Failed to open Shapefile: {}", e),
        })?;

        let crs = self.extract_crs(path)?;
        let name = layer_name(path);

        let mut features = Vec::new();
        for result in reader.iter_shapes_and_records() {
            let (shape, record) = result.map_err(|e| PlzmapError::FormatError {
                format: "Shapefile".to_string(),
                message: format!("Failed to read feature {}: {}", features.len(), e),
            })?;

            let attributes: Attributes = record
                .into_iter()
                .map(|(field, value)| (field, convert_dbase_value(value)))
                .collect();

            let feature = match convert_shape(shape) {
                Some(geometry) => Feature::new(geometry, attributes),
                None => Feature::without_geometry(attributes),
            };
            features.push(feature);
        }

        Ok(Layer::new(name, crs, features))
    }

    fn supported_extensions(&self) -> &[&str] {
        &["shp"]
    }

    fn format_name(&self) -> &str {
        "Shapefile"
    }

    fn validate(&self, path: &Path) -> Result<FormatValidation> {
        let mut validation = FormatValidator::validate_file_exists(path);
        if !validation.is_valid() {
            return Ok(validation);
        }

        let base = match self.get_shapefile_base(path) {
            Ok(b) => b,
            Err(e) => {
                validation.errors.push(format!("Invalid Shapefile path: {}", e));
                return Ok(validation);
            }
        };

        let component_validation =
            FormatValidator::validate_component_files(&base, &["shp", "shx", "dbf"], &["prj"]);

        Ok(FormatValidator::merge_validations(vec![validation, component_validation]))
    }
}

impl ShapefileReader {
    /// Get the base path for a Shapefile (without extension)
    fn get_shapefile_base(&self, path: &Path) -> Result<PathBuf> {
        let is_shp = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("shp"))
            .unwrap_or(false);
        if !is_shp {
            return Err(PlzmapError::InvalidPath {
                path: path.to_path_buf(),
                reason: "Not a Shapefile (.shp)".to_string(),
            });
        }

        Ok(path.with_extension(""))
    }

    /// Verify that all required Shapefile component files exist
    fn verify_components(&self, path: &Path) -> Result<()> {
        let base = self.get_shapefile_base(path)?;
        let missing: Vec<String> = ["shp", "shx", "dbf"]
            .iter()
            .filter(|ext| !base.with_extension(ext).exists())
            .map(|ext| format!(".{}", ext))
            .collect();

        if !missing.is_empty() {
            return Err(PlzmapError::FormatError {
                format: "Shapefile".to_string(),
                message: format!("Missing required component files: {}", missing.join(", ")),
            });
        }

        Ok(())
    }

    /// Extract CRS from the Shapefile .prj file
    fn extract_crs(&self, path: &Path) -> Result<Option<Crs>> {
        let prj_path = self.get_shapefile_base(path)?.with_extension("prj");

        if !prj_path.exists() {
            return Ok(None);
        }

        let prj_content = fs::read_to_string(&prj_path).map_err(|e| PlzmapError::FormatError {
            format: "Shapefile".to_string(),
            message: format!("Failed to read .prj file: {}", e),
        })?;

        let epsg = parse_epsg_from_wkt(&prj_content)
            .or_else(|| extract_authority_code(&prj_content))
            .or_else(|| match_esri_projection_name(&prj_content));

        if epsg.is_none() {
            tracing::warn!("Could not identify CRS in {}", prj_path.display());
        }

        Ok(epsg.map(Crs::from_epsg))
    }
}

/// Parse EPSG code from WKT string
///
/// Takes the last AUTHORITY clause, which belongs to the outermost CRS.
fn parse_epsg_from_wkt(wkt: &str) -> Option<u32> {
    const MARKER: &str = "AUTHORITY[\"EPSG\",\"";
    if let Some(start) = wkt.rfind(MARKER) {
        let code_start = start + MARKER.len();
        if let Some(end) = wkt[code_start..].find('"') {
            if let Ok(code) = wkt[code_start..code_start + end].parse::<u32>() {
                return Some(code);
            }
        }
    }

    if let Some(start) = wkt.find("EPSG:") {
        let code_str: String =
            wkt[start + 5..].chars().take_while(|c| c.is_ascii_digit()).collect();
        if let Ok(code) = code_str.parse::<u32>() {
            return Some(code);
        }
    }

    None
}

/// Extract an AUTHORITY code written with unusual spacing or quoting
fn extract_authority_code(wkt: &str) -> Option<u32> {
    for line in wkt.lines() {
        if line.contains("AUTHORITY") && line.contains("EPSG") {
            if let Some(start) = line.rfind("EPSG") {
                let digits: String = line[start + 4..]
                    .chars()
                    .skip_while(|c| !c.is_ascii_digit())
                    .take_while(|c| c.is_ascii_digit())
                    .collect();
                if let Ok(code) = digits.parse::<u32>() {
                    return Some(code);
                }
            }
        }
    }
    None
}

/// Look up the projection name of an ESRI-style WKT
fn match_esri_projection_name(wkt: &str) -> Option<u32> {
    let head = wkt.split(',').next()?;
    let name = head.split('[').nth(1)?.trim_matches(|c: char| c == '"' || c.is_whitespace());
    ESRI_PROJECTION_NAMES
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(name))
        .map(|(_, epsg)| *epsg)
}

fn ring_to_linestring<P>(points: &[P], xy: &impl Fn(&P) -> Coord<f64>) -> LineString<f64> {
    LineString::new(points.iter().map(xy).collect())
}

/// Group outer and inner rings into polygons; an inner ring belongs to the
/// most recent outer ring
fn rings_to_multipolygon<P>(
    rings: &[PolygonRing<P>],
    xy: impl Fn(&P) -> Coord<f64>,
) -> MultiPolygon<f64> {
    let mut polygons: Vec<(LineString<f64>, Vec<LineString<f64>>)> = Vec::new();
    for ring in rings {
        match ring {
            PolygonRing::Outer(points) => {
                polygons.push((ring_to_linestring(points, &xy), Vec::new()))
            }
            PolygonRing::Inner(points) => {
                let hole = ring_to_linestring(points, &xy);
                match polygons.last_mut() {
                    Some((_, holes)) => holes.push(hole),
                    // A hole before any shell is treated as its own shell
                    None => polygons.push((hole, Vec::new())),
                }
            }
        }
    }
    MultiPolygon::new(
        polygons
            .into_iter()
            .map(|(exterior, interiors)| Polygon::new(exterior, interiors))
            .collect(),
    )
}

fn parts_to_multilinestring<P>(
    parts: &[Vec<P>],
    xy: impl Fn(&P) -> Coord<f64>,
) -> MultiLineString<f64> {
    MultiLineString::new(parts.iter().map(|part| ring_to_linestring(part, &xy)).collect())
}

/// Convert a shapefile shape into a geometry; `None` for null shapes
fn convert_shape(shape: Shape) -> Option<Geometry<f64>> {
    let geometry = match shape {
        Shape::Polygon(polygon) => Geometry::MultiPolygon(rings_to_multipolygon(
            polygon.rings(),
            |p| Coord { x: p.x, y: p.y },
        )),
        Shape::PolygonM(polygon) => Geometry::MultiPolygon(rings_to_multipolygon(
            polygon.rings(),
            |p| Coord { x: p.x, y: p.y },
        )),
        Shape::PolygonZ(polygon) => Geometry::MultiPolygon(rings_to_multipolygon(
            polygon.rings(),
            |p| Coord { x: p.x, y: p.y },
        )),
        Shape::Polyline(polyline) => Geometry::MultiLineString(parts_to_multilinestring(
            polyline.parts(),
            |p| Coord { x: p.x, y: p.y },
        )),
        Shape::PolylineM(polyline) => Geometry::MultiLineString(parts_to_multilinestring(
            polyline.parts(),
            |p| Coord { x: p.x, y: p.y },
        )),
        Shape::PolylineZ(polyline) => Geometry::MultiLineString(parts_to_multilinestring(
            polyline.parts(),
            |p| Coord { x: p.x, y: p.y },
        )),
        Shape::Point(p) => Geometry::Point(Point::new(p.x, p.y)),
        Shape::PointM(p) => Geometry::Point(Point::new(p.x, p.y)),
        Shape::PointZ(p) => Geometry::Point(Point::new(p.x, p.y)),
        Shape::Multipoint(mp) => Geometry::MultiPoint(MultiPoint::new(
            mp.points().iter().map(|p| Point::new(p.x, p.y)).collect(),
        )),
        Shape::MultipointM(mp) => Geometry::MultiPoint(MultiPoint::new(
            mp.points().iter().map(|p| Point::new(p.x, p.y)).collect(),
        )),
        Shape::MultipointZ(mp) => Geometry::MultiPoint(MultiPoint::new(
            mp.points().iter().map(|p| Point::new(p.x, p.y)).collect(),
        )),
        Shape::Multipatch(_) => {
            tracing::warn!(
                "Multipatch geometry type is not supported; feature kept without geometry"
            );
            return None;
        }
        Shape::NullShape => return None,
    };
    Some(geometry)
}

/// Convert dBase field value to an attribute value
fn convert_dbase_value(value: DbaseFieldValue) -> AttributeValue {
    match value {
        DbaseFieldValue::Character(Some(s)) => AttributeValue::Text(s.trim_end().to_string()),
        DbaseFieldValue::Character(None) => AttributeValue::Null,
        DbaseFieldValue::Numeric(Some(n)) => numeric_value(n),
        DbaseFieldValue::Numeric(None) => AttributeValue::Null,
        DbaseFieldValue::Logical(Some(b)) => AttributeValue::Bool(b),
        DbaseFieldValue::Logical(None) => AttributeValue::Null,
        DbaseFieldValue::Date(Some(date)) => AttributeValue::Date(format!(
            "{:04}-{:02}-{:02}",
            date.year(),
            date.month(),
            date.day()
        )),
        DbaseFieldValue::Date(None) => AttributeValue::Null,
        DbaseFieldValue::Float(Some(f)) => AttributeValue::Float(f as f64),
        DbaseFieldValue::Float(None) => AttributeValue::Null,
        DbaseFieldValue::Integer(i) => AttributeValue::Integer(i as i64),
        DbaseFieldValue::Currency(c) => AttributeValue::Float(c),
        DbaseFieldValue::DateTime(dt) => AttributeValue::Date(format!(
            "{:04}-{:02}-{:02}",
            dt.date().year(),
            dt.date().month(),
            dt.date().day()
        )),
        DbaseFieldValue::Double(d) => AttributeValue::Float(d),
        DbaseFieldValue::Memo(s) => AttributeValue::Text(s),
    }
}

/// dBase stores district numbers as N fields; keep whole numbers integral
fn numeric_value(n: f64) -> AttributeValue {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        AttributeValue::Integer(n as i64)
    } else {
        AttributeValue::Float(n)
    }
}
