//! CRS reconciliation and reprojection

use std::borrow::Cow;

use geo::{Coord, Geometry, GeometryCollection, MapCoords};
use plzmap_core::error::{PlzmapError, Result};
use plzmap_core::models::{Crs, Layer};
use proj::Proj;

/// Check if two CRS are the same
pub fn crs_match(crs1: &Crs, crs2: &Crs) -> bool {
    crs1.epsg == crs2.epsg
}

/// Bring `target` into the CRS of `base`
///
/// When both layers already share a CRS the target is returned borrowed.
/// Either layer lacking a CRS is a configuration error. A feature that
/// cannot be projected keeps its attributes with an empty geometry.
pub fn reconcile<'a>(base: &Layer, target: &'a Layer) -> Result<Cow<'a, Layer>> {
    let base_crs = defined_crs(base)?;
    let target_crs = defined_crs(target)?;

    if crs_match(base_crs, target_crs) {
        return Ok(Cow::Borrowed(target));
    }

    tracing::info!(
        "Reprojecting '{}' ({} features) from {} to {}",
        target.name(),
        target.len(),
        target_crs,
        base_crs
    );

    let reprojector = Reprojector::new(target_crs, base_crs)?;
    let geometries = target
        .iter()
        .enumerate()
        .map(|(index, feature)| match reprojector.apply(&feature.geometry) {
            Ok(geometry) => geometry,
            Err(e) => {
                tracing::debug!("Feature {} of '{}' dropped: {}", index, target.name(), e);
                Geometry::GeometryCollection(GeometryCollection::default())
            }
        })
        .collect();

    Ok(Cow::Owned(target.with_geometries(base_crs.clone(), geometries)))
}

fn defined_crs(layer: &Layer) -> Result<&Crs> {
    layer.crs().ok_or_else(|| PlzmapError::UndefinedCrs { layer: layer.name().to_string() })
}

/// A PROJ transformation between two EPSG systems
///
/// Axis order is normalized for visualization, so x is always
/// longitude or easting.
pub struct Reprojector {
    proj: Proj,
    from: Crs,
    to: Crs,
}

impl Reprojector {
    pub fn new(from: &Crs, to: &Crs) -> Result<Self> {
        let proj = Proj::new_known_crs(&from.authority(), &to.authority(), None).map_err(|e| {
            PlzmapError::Projection {
                from: from.authority(),
                to: to.authority(),
                reason: format!("Failed to create projection: {}", e),
            }
        })?;

        Ok(Self { proj, from: from.clone(), to: to.clone() })
    }

    /// Transform every coordinate of a geometry
    pub fn apply(&self, geometry: &Geometry<f64>) -> Result<Geometry<f64>> {
        geometry
            .try_map_coords(|coord| self.convert(coord))
            .map_err(|reason| PlzmapError::Projection {
                from: self.from.authority(),
                to: self.to.authority(),
                reason,
            })
    }

    fn convert(&self, coord: Coord<f64>) -> std::result::Result<Coord<f64>, String> {
        match self.proj.convert((coord.x, coord.y)) {
            Ok((x, y)) if x.is_finite() && y.is_finite() => Ok(Coord { x, y }),
            Ok(_) => Err(format!("({}, {}) has no finite image", coord.x, coord.y)),
            Err(e) => Err(format!("({}, {}): {}", coord.x, coord.y, e)),
        }
    }
}
