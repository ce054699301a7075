//! # gridline-types
//!
//! Core geographic data types shared by the gridline crates.
//!
//! - **Bounding boxes**: `BoundingBox`, a validated wrapper around `geo::Rect`
//! - **Features**: `Feature`, `Geometry`, `FeatureProperties`, `FeatureCollection`
//!   (GeoJSON-compatible on the wire)
//! - **Power plants**: `PowerPlant`, the aggregated point record served to clients
//!
//! ## Examples
//!
//! ```rust
//! use gridline_types::bbox::BoundingBox;
//!
//! let conus = BoundingBox::try_new(-125.0, 24.0, -66.0, 50.0).unwrap();
//! assert!(conus.contains(-98.5, 39.8));
//! assert!(BoundingBox::try_new(-70.0, 20.0, -70.0, 50.0).is_err());
//! ```

pub mod bbox;
pub mod feature;
pub mod plant;

pub use bbox::{BoundingBox, BoundingBoxError};
pub use feature::{
    Feature, FeatureCollection, FeatureError, FeatureProperties, Geometry, Position,
};
pub use plant::PowerPlant;
