//! Geometry math, spatial indexing, validation, and GeoJSON conversion.

pub mod geojson;
pub mod geometry;
pub mod spatial;
pub mod validation;
