pub mod geometry;
pub mod layer;

pub use geometry::{Crs, MatchPolicy};
pub use layer::{AttributeValue, Attributes, Feature, Layer};
