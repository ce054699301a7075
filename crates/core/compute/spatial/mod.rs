pub mod rtree;
pub use rtree::{LineSegment, Proximity, SpatialIndex};
