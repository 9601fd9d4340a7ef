//! plzmap Geo - the postal-code to district join engine
//!
//! This crate handles geometry repair, CRS reconciliation, the spatial index
//! over district layers, district attribute detection, the join itself and
//! serialization of overlap records to GeoJSON.

pub mod index;
pub mod join;
pub mod keys;
pub mod repair;
pub mod serialize;
pub mod transform;

pub use index::SpatialIndex;
pub use join::{join, join_with_progress, JoinOptions, JoinReport, OverlapRecord};
pub use keys::{detect, DistrictKeys};
pub use repair::{repair, try_repair, RepairError, RepairOptions};
pub use serialize::{json_safe, serialize, to_json_string};
pub use transform::reconcile;
