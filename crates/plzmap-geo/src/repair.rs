//! Geometry repair
//!
//! Polygonal input is normalized by unioning it with itself. Every part is
//! first wound counter-clockwise with clockwise holes, since the union fills
//! by the winding of its first ring. The union then resolves overlaps and
//! repeated vertices while the covered area stays the same. A self-crossing
//! ring keeps only the lobes wound like its start, so a bowtie shrinks to one
//! lobe. The result is always a `MultiPolygon` in the input's coordinate
//! system.

use geo::orient::{Direction, Orient};
use geo::{
    unary_union, Coord, CoordsIter, Geometry, LineString, MapCoords, MultiPolygon, Polygon,
    RemoveRepeatedPoints,
};
use thiserror::Error;

/// Repair configuration, passed explicitly to every call
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RepairOptions {
    /// Grid size coordinates are snapped to before the union
    pub snap_precision: Option<f64>,
}

impl RepairOptions {
    pub fn with_snap_precision(precision: f64) -> Self {
        Self { snap_precision: Some(precision) }
    }
}

/// Reason a geometry could not be repaired
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepairError {
    #[error("geometry is empty")]
    Empty,

    #[error("{kind} geometry is not polygonal")]
    NonPolygonal { kind: &'static str },

    #[error("geometry has non-finite coordinates")]
    NonFiniteCoordinate,

    #[error("geometry collapsed to zero area")]
    Collapsed,
}

/// Repair a geometry, returning an empty multi-polygon when that fails
pub fn repair(geometry: &Geometry<f64>, options: &RepairOptions) -> MultiPolygon<f64> {
    try_repair(geometry, options).unwrap_or_else(|_| MultiPolygon::new(Vec::new()))
}

/// Repair a geometry, reporting why it could not be repaired
pub fn try_repair(
    geometry: &Geometry<f64>,
    options: &RepairOptions,
) -> Result<MultiPolygon<f64>, RepairError> {
    let mut parts = Vec::new();
    collect_polygons(geometry, &mut parts);

    if parts.is_empty() {
        return Err(match geometry {
            Geometry::GeometryCollection(gc) if !gc.0.is_empty() => {
                RepairError::NonPolygonal { kind: geometry_kind(geometry) }
            }
            Geometry::GeometryCollection(_) | Geometry::MultiPolygon(_) => RepairError::Empty,
            other => RepairError::NonPolygonal { kind: geometry_kind(other) },
        });
    }

    if !parts.iter().all(has_finite_coords) {
        return Err(RepairError::NonFiniteCoordinate);
    }

    let cleaned: Vec<Polygon<f64>> = parts
        .into_iter()
        .map(|polygon| match options.snap_precision {
            Some(grid) => snap_to_grid(&polygon, grid),
            None => polygon,
        })
        .filter_map(clean_polygon)
        .map(|polygon| polygon.orient(Direction::Default))
        .collect();

    if cleaned.is_empty() {
        return Err(RepairError::Collapsed);
    }

    let repaired = unary_union(&cleaned);
    if repaired.0.is_empty() {
        Err(RepairError::Collapsed)
    } else {
        Ok(repaired)
    }
}

/// Variant name of a geometry, for diagnostics
pub fn geometry_kind(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

/// Polygonal parts of a geometry; other members of a collection are ignored
fn collect_polygons(geometry: &Geometry<f64>, parts: &mut Vec<Polygon<f64>>) {
    match geometry {
        Geometry::Polygon(polygon) => parts.push(polygon.clone()),
        Geometry::MultiPolygon(mp) => parts.extend(mp.0.iter().cloned()),
        Geometry::Rect(rect) => parts.push(rect.to_polygon()),
        Geometry::Triangle(triangle) => parts.push(triangle.to_polygon()),
        Geometry::GeometryCollection(gc) => {
            for member in gc.iter() {
                collect_polygons(member, parts);
            }
        }
        _ => {}
    }
}

fn has_finite_coords(polygon: &Polygon<f64>) -> bool {
    polygon.coords_iter().all(|c| c.x.is_finite() && c.y.is_finite())
}

fn snap_to_grid(polygon: &Polygon<f64>, grid: f64) -> Polygon<f64> {
    polygon.map_coords(|c| Coord {
        x: (c.x / grid).round() * grid,
        y: (c.y / grid).round() * grid,
    })
}

/// A closed ring needs at least three distinct vertices
fn is_ring(ring: &LineString<f64>) -> bool {
    ring.0.len() >= 4
}

fn clean_polygon(polygon: Polygon<f64>) -> Option<Polygon<f64>> {
    let (exterior, interiors) = polygon.remove_repeated_points().into_inner();
    if !is_ring(&exterior) {
        return None;
    }
    let interiors = interiors.into_iter().filter(is_ring).collect();
    Some(Polygon::new(exterior, interiors))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, Area, BoundingRect, GeometryCollection, Point};

    fn square(x0: f64, y0: f64, size: f64) -> Polygon<f64> {
        polygon![
            (x: x0, y: y0),
            (x: x0 + size, y: y0),
            (x: x0 + size, y: y0 + size),
            (x: x0, y: y0 + size),
        ]
    }

    #[test]
    fn test_valid_polygon_unchanged() {
        let repaired = repair(&Geometry::Polygon(square(0.0, 0.0, 2.0)), &RepairOptions::default());

        assert!((repaired.unsigned_area() - 4.0).abs() < 1e-9);
        let rect = repaired.bounding_rect().unwrap();
        assert_eq!(rect.min(), Coord { x: 0.0, y: 0.0 });
        assert_eq!(rect.max(), Coord { x: 2.0, y: 2.0 });
    }

    #[test]
    fn test_bowtie_keeps_one_lobe() {
        let bowtie =
            polygon![(x: 0.0, y: 0.0), (x: 2.0, y: 2.0), (x: 2.0, y: 0.0), (x: 0.0, y: 2.0)];

        let repaired = try_repair(&Geometry::Polygon(bowtie), &RepairOptions::default()).unwrap();

        assert!((repaired.unsigned_area() - 1.0).abs() < 1e-9);
        assert_eq!(repaired.0.len(), 1);
    }

    #[test]
    fn test_mixed_orientation_parts_are_kept() {
        let counter_clockwise = square(0.0, 0.0, 1.0);
        let mut clockwise = square(3.0, 0.0, 1.0);
        clockwise.exterior_mut(|ring| ring.0.reverse());
        let mp = MultiPolygon::new(vec![counter_clockwise, clockwise]);

        let repaired = repair(&Geometry::MultiPolygon(mp), &RepairOptions::default());

        assert!((repaired.unsigned_area() - 2.0).abs() < 1e-9);
        assert_eq!(repaired.0.len(), 2);
    }

    #[test]
    fn test_overlapping_parts_are_merged() {
        let mp = MultiPolygon::new(vec![square(0.0, 0.0, 2.0), square(1.0, 0.0, 2.0)]);

        let repaired = repair(&Geometry::MultiPolygon(mp), &RepairOptions::default());

        assert!((repaired.unsigned_area() - 6.0).abs() < 1e-9);
        assert_eq!(repaired.0.len(), 1);
    }

    #[test]
    fn test_repeated_vertices_removed() {
        let polygon = polygon![
            (x: 0.0, y: 0.0),
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
        ];

        let repaired = repair(&Geometry::Polygon(polygon), &RepairOptions::default());
        assert!((repaired.unsigned_area() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_hole_is_kept() {
        let outer = square(0.0, 0.0, 4.0);
        let mut hole = square(1.0, 1.0, 1.0);
        hole.exterior_mut(|ring| ring.0.reverse());
        let polygon = Polygon::new(outer.exterior().clone(), vec![hole.exterior().clone()]);

        let repaired = repair(&Geometry::Polygon(polygon), &RepairOptions::default());
        assert!((repaired.unsigned_area() - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_hole_wound_like_shell_is_kept() {
        // Both rings counter-clockwise
        let outer = square(0.0, 0.0, 4.0);
        let hole = square(1.0, 1.0, 1.0);
        let polygon = Polygon::new(outer.exterior().clone(), vec![hole.exterior().clone()]);

        let repaired = repair(&Geometry::Polygon(polygon), &RepairOptions::default());
        assert!((repaired.unsigned_area() - 15.0).abs() < 1e-9);
        assert_eq!(repaired.0[0].interiors().len(), 1);
    }

    #[test]
    fn test_snap_precision() {
        let polygon = polygon![
            (x: 0.0001, y: -0.0001),
            (x: 1.0002, y: 0.0),
            (x: 0.9999, y: 1.0001),
            (x: 0.0, y: 0.9998),
        ];

        let options = RepairOptions::with_snap_precision(0.01);
        let repaired = repair(&Geometry::Polygon(polygon), &options);
        assert!((repaired.unsigned_area() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_failures_yield_empty() {
        let options = RepairOptions::default();

        let point = Geometry::Point(Point::new(1.0, 1.0));
        assert_eq!(try_repair(&point, &options), Err(RepairError::NonPolygonal { kind: "Point" }));
        assert!(repair(&point, &options).0.is_empty());

        let empty = Geometry::GeometryCollection(GeometryCollection::default());
        assert_eq!(try_repair(&empty, &options), Err(RepairError::Empty));

        let nan = polygon![(x: 0.0, y: 0.0), (x: f64::NAN, y: 0.0), (x: 1.0, y: 1.0)];
        assert_eq!(
            try_repair(&Geometry::Polygon(nan), &options),
            Err(RepairError::NonFiniteCoordinate)
        );

        let line = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 0.0)];
        assert_eq!(try_repair(&Geometry::Polygon(line), &options), Err(RepairError::Collapsed));
    }

    #[test]
    fn test_collection_keeps_polygonal_members() {
        let gc = GeometryCollection::new_from(vec![
            Geometry::Point(Point::new(5.0, 5.0)),
            Geometry::Polygon(square(0.0, 0.0, 1.0)),
        ]);

        let repaired = repair(&Geometry::GeometryCollection(gc), &RepairOptions::default());
        assert!((repaired.unsigned_area() - 1.0).abs() < 1e-9);

        let points = GeometryCollection::new_from(vec![Geometry::Point(Point::new(5.0, 5.0))]);
        assert_eq!(
            try_repair(&Geometry::GeometryCollection(points), &RepairOptions::default()),
            Err(RepairError::NonPolygonal { kind: "GeometryCollection" })
        );
    }
}
