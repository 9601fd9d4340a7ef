//! R-tree over feature bounding boxes
//!
//! Empty and non-finite geometries are left out of the tree, so they never
//! come up as join candidates.

use geo::{BoundingRect, Geometry, Rect};
use plzmap_core::models::Layer;
use rstar::{RTree, RTreeObject, AABB};

/// Bounding box of one layer feature
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedEnvelope {
    /// Position of the feature in its layer
    pub index: usize,

    envelope: AABB<[f64; 2]>,
}

impl IndexedEnvelope {
    /// Envelope for a geometry; `None` for empty or non-finite geometries
    pub fn new(index: usize, geometry: &Geometry<f64>) -> Option<Self> {
        let rect = geometry.bounding_rect()?;
        envelope_of(&rect).map(|envelope| Self { index, envelope })
    }
}

impl RTreeObject for IndexedEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

fn envelope_of(rect: &Rect<f64>) -> Option<AABB<[f64; 2]>> {
    let min = rect.min();
    let max = rect.max();
    if [min.x, min.y, max.x, max.y].iter().all(|v| v.is_finite()) {
        Some(AABB::from_corners([min.x, min.y], [max.x, max.y]))
    } else {
        None
    }
}

/// Read-only R-tree over the bounding boxes of a layer
///
/// Queries are a conservative prefilter; callers re-check true intersection.
pub struct SpatialIndex {
    tree: RTree<IndexedEnvelope>,
}

impl SpatialIndex {
    /// Bulk-load the bounding boxes of every feature in the layer
    pub fn build(layer: &Layer) -> Self {
        Self::from_geometries(layer.iter().map(|feature| &feature.geometry))
    }

    /// Index geometries by their position in the iterator
    pub fn from_geometries<'a>(geometries: impl IntoIterator<Item = &'a Geometry<f64>>) -> Self {
        let indexed: Vec<IndexedEnvelope> = geometries
            .into_iter()
            .enumerate()
            .filter_map(|(index, geometry)| {
                let indexed = IndexedEnvelope::new(index, geometry);
                if indexed.is_none() {
                    tracing::debug!("Feature {} has no bounding box and is not indexed", index);
                }
                indexed
            })
            .collect();

        Self { tree: RTree::bulk_load(indexed) }
    }

    /// Indices of all features whose bounding box intersects `bbox`, in
    /// layer order
    pub fn candidates(&self, bbox: &Rect<f64>) -> Vec<usize> {
        let Some(query) = envelope_of(bbox) else {
            return Vec::new();
        };

        let mut indices: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&query)
            .map(|indexed| indexed.index)
            .collect();
        indices.sort_unstable();
        indices
    }

    /// Number of indexed features
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
