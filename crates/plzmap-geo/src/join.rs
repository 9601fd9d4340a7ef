//! Postal-code to district join
//!
//! Every base feature is repaired, its bounding box is looked up in an R-tree
//! over the district layer, and each candidate that truly intersects yields
//! an [`OverlapRecord`] with the clipped geometry. Features that cannot be
//! processed are reported as [`SkippedFeature`] and do not abort the join.

use std::sync::OnceLock;
use std::time::Instant;

use geo::{Area, BooleanOps, BoundingRect, Intersects, MultiPolygon};
use plzmap_core::error::Result;
use plzmap_core::models::{AttributeValue, Feature, Layer, MatchPolicy};
use rayon::prelude::*;
use thiserror::Error;

use crate::index::SpatialIndex;
use crate::keys::{DistrictKeys, UNKNOWN_KEY};
use crate::repair::{try_repair, RepairError, RepairOptions};
use crate::transform::reconcile;

/// Join configuration
#[derive(Debug, Clone)]
pub struct JoinOptions {
    pub match_policy: MatchPolicy,

    /// Base attributes tried in order for the record identifier
    pub base_id_keys: Vec<String>,

    pub repair: RepairOptions,

    /// Stop between base features once this instant has passed
    pub deadline: Option<Instant>,

    /// Process base features on the rayon thread pool
    pub parallel: bool,
}

impl Default for JoinOptions {
    fn default() -> Self {
        Self {
            match_policy: MatchPolicy::All,
            base_id_keys: vec!["plz".to_string(), "PLZ".to_string()],
            repair: RepairOptions::default(),
            deadline: None,
            parallel: false,
        }
    }
}

/// One overlapping pair of base and district feature
#[derive(Debug, Clone, PartialEq)]
pub struct OverlapRecord {
    /// Intersection of the two repaired geometries, never empty
    pub geometry: MultiPolygon<f64>,
    pub base_id: AttributeValue,
    pub district_name: AttributeValue,
    pub district_id: AttributeValue,
    pub base_index: usize,
    pub target_index: usize,
}

/// Why a base feature was skipped
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeatureError {
    #[error("geometry could not be repaired: {0}")]
    Unrepairable(RepairError),

    #[error("feature has no geometry")]
    EmptyGeometry,
}

impl From<RepairError> for FeatureError {
    fn from(error: RepairError) -> Self {
        match error {
            RepairError::Empty => FeatureError::EmptyGeometry,
            other => FeatureError::Unrepairable(other),
        }
    }
}

/// Diagnostic for a base feature that produced no records because it failed
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedFeature {
    pub index: usize,
    pub identifier: AttributeValue,
    pub reason: FeatureError,
}

/// Outcome of a join
#[derive(Debug, Clone, Default)]
pub struct JoinReport {
    /// Records in base order, then candidate order
    pub records: Vec<OverlapRecord>,
    pub skipped: Vec<SkippedFeature>,

    /// Number of base features examined
    pub base_features: usize,

    /// The deadline stopped the run before every base feature was examined
    pub truncated: bool,
}

/// Join `base` against the districts in `target`
pub fn join(
    base: &Layer,
    target: &Layer,
    keys: &DistrictKeys,
    options: &JoinOptions,
) -> Result<JoinReport> {
    join_with_progress(base, target, keys, options, |_| {})
}

/// Like [`join`], calling `progress` with the index of every processed base feature
pub fn join_with_progress<F>(
    base: &Layer,
    target: &Layer,
    keys: &DistrictKeys,
    options: &JoinOptions,
    progress: F,
) -> Result<JoinReport>
where
    F: Fn(usize) + Sync,
{
    let targets = reconcile(base, target)?;
    let index = SpatialIndex::build(&targets);
    tracing::debug!(
        "Indexed {} of {} district features in '{}'",
        index.len(),
        targets.len(),
        targets.name()
    );

    let context = JoinContext::new(&targets, index, keys, options);
    let features = base.features();

    let outcomes: Vec<ChunkOutcome> = if options.parallel && features.len() > 1 {
        let chunk_size = (features.len() / (rayon::current_num_threads() * 4)).max(1);
        features
            .par_chunks(chunk_size)
            .enumerate()
            .map(|(n, chunk)| context.run_chunk(n * chunk_size, chunk, &progress))
            .collect()
    } else {
        vec![context.run_chunk(0, features, &progress)]
    };

    let report = outcomes.into_iter().fold(JoinReport::default(), |mut report, outcome| {
        report.records.extend(outcome.records);
        report.skipped.extend(outcome.skipped);
        report.base_features += outcome.processed;
        report.truncated |= outcome.truncated;
        report
    });

    if report.truncated {
        tracing::warn!(
            "Deadline reached after {} of {} features of '{}'",
            report.base_features,
            base.len(),
            base.name()
        );
    }
    tracing::info!(
        "Joined '{}' with '{}': {} overlaps, {} features skipped",
        base.name(),
        targets.name(),
        report.records.len(),
        report.skipped.len()
    );

    Ok(report)
}

#[derive(Default)]
struct ChunkOutcome {
    records: Vec<OverlapRecord>,
    skipped: Vec<SkippedFeature>,
    processed: usize,
    truncated: bool,
}

/// Read-only state shared by all workers of one join
struct JoinContext<'a> {
    targets: &'a Layer,
    index: SpatialIndex,
    repaired: Vec<OnceLock<Option<MultiPolygon<f64>>>>,
    keys: &'a DistrictKeys,
    options: &'a JoinOptions,
}

impl<'a> JoinContext<'a> {
    fn new(
        targets: &'a Layer,
        index: SpatialIndex,
        keys: &'a DistrictKeys,
        options: &'a JoinOptions,
    ) -> Self {
        let repaired = (0..targets.len()).map(|_| OnceLock::new()).collect();
        Self { targets, index, repaired, keys, options }
    }

    fn deadline_passed(&self) -> bool {
        self.options.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    fn run_chunk<F>(&self, offset: usize, features: &[Feature], progress: &F) -> ChunkOutcome
    where
        F: Fn(usize) + Sync,
    {
        let mut outcome = ChunkOutcome::default();

        for (i, feature) in features.iter().enumerate() {
            if self.deadline_passed() {
                outcome.truncated = true;
                break;
            }

            let base_index = offset + i;
            match self.process(base_index, feature) {
                Ok(records) => outcome.records.extend(records),
                Err(skipped) => {
                    tracing::warn!(
                        "Skipping feature {} ({}): {}",
                        skipped.index,
                        skipped.identifier,
                        skipped.reason
                    );
                    outcome.skipped.push(skipped);
                }
            }
            outcome.processed += 1;
            progress(base_index);
        }

        outcome
    }

    /// Overlap records of one base feature
    fn process(
        &self,
        base_index: usize,
        feature: &Feature,
    ) -> std::result::Result<Vec<OverlapRecord>, SkippedFeature> {
        let base_id = self.base_identifier(feature);
        let skip = |reason: FeatureError| SkippedFeature {
            index: base_index,
            identifier: base_id.clone(),
            reason,
        };

        let geometry =
            try_repair(&feature.geometry, &self.options.repair).map_err(|e| skip(e.into()))?;
        let bbox = geometry.bounding_rect().ok_or_else(|| skip(FeatureError::EmptyGeometry))?;

        let mut records = Vec::new();
        for target_index in self.index.candidates(&bbox) {
            let Some(district) = self.repaired_target(target_index) else {
                continue;
            };
            if !geometry.intersects(district) {
                continue;
            }

            let overlap = geometry.intersection(district);
            if overlap.unsigned_area() > 0.0 {
                tracing::debug!(
                    "Feature {} ({}) overlaps district {}",
                    base_index,
                    base_id,
                    target_index
                );
                records.push(self.record(overlap, &base_id, base_index, target_index));
            }

            if self.options.match_policy == MatchPolicy::FirstMatch {
                break;
            }
        }

        Ok(records)
    }

    /// Repaired district geometry, computed once per feature
    fn repaired_target(&self, target_index: usize) -> Option<&MultiPolygon<f64>> {
        self.repaired[target_index]
            .get_or_init(|| {
                let feature = &self.targets.features()[target_index];
                match try_repair(&feature.geometry, &self.options.repair) {
                    Ok(geometry) => Some(geometry),
                    Err(e) => {
                        tracing::debug!(
                            "District {} of '{}' cannot overlap anything: {}",
                            target_index,
                            self.targets.name(),
                            e
                        );
                        None
                    }
                }
            })
            .as_ref()
    }

    fn base_identifier(&self, feature: &Feature) -> AttributeValue {
        self.options
            .base_id_keys
            .iter()
            .filter_map(|key| feature.attribute(key))
            .find(|value| !value.is_null())
            .cloned()
            .unwrap_or(AttributeValue::Null)
    }

    fn record(
        &self,
        overlap: MultiPolygon<f64>,
        base_id: &AttributeValue,
        base_index: usize,
        target_index: usize,
    ) -> OverlapRecord {
        let district = &self.targets.features()[target_index];
        let attribute = |key: &str| {
            district
                .attribute(key)
                .cloned()
                .unwrap_or_else(|| AttributeValue::Text(UNKNOWN_KEY.to_string()))
        };

        OverlapRecord {
            geometry: overlap,
            base_id: base_id.clone(),
            district_name: attribute(&self.keys.name_key),
            district_id: attribute(&self.keys.id_key),
            base_index,
            target_index,
        }
    }
}
