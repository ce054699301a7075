//! Lenient GeoJSON `FeatureCollection` parsing.
//!
//! A collection that is not valid JSON, or has no `features` array, is an
//! error. Each member is then read with `geojson::Feature::from_json_value`;
//! features that fail to parse (unsupported geometry, bad coordinates, no
//! geometry) are skipped so one malformed record cannot discard a tile.

use crate::error::{GridlineError, Result};
use gridline_types::{Feature, FeatureCollection};
use serde::Deserialize;
use serde_json::Value;

#[derive(Deserialize)]
struct RawCollection {
    features: Vec<Value>,
}

fn parse_feature(value: Value) -> std::result::Result<Feature, String> {
    let feature = geojson::Feature::from_json_value(value).map_err(|e| e.to_string())?;
    Feature::try_from(feature).map_err(|e| e.to_string())
}

/// Outcome of a lenient parse.
#[derive(Debug, Default)]
pub struct ParsedFeatures {
    pub features: Vec<Feature>,
    pub skipped: usize,
}

/// Parse a GeoJSON `FeatureCollection`, skipping malformed features.
///
/// ```
/// use gridline::compute::geojson::parse_feature_collection;
///
/// let body = br#"{"type":"FeatureCollection","features":[
///     {"type":"Feature","geometry":{"type":"LineString","coordinates":[[0,0],[1,1]]},"properties":{}},
///     {"type":"Feature","geometry":{"type":"Polygon","coordinates":[]},"properties":{}}
/// ]}"#;
/// let parsed = parse_feature_collection(body).unwrap();
/// assert_eq!(parsed.features.len(), 1);
/// assert_eq!(parsed.skipped, 1);
/// ```
pub fn parse_feature_collection(bytes: &[u8]) -> Result<ParsedFeatures> {
    let raw: RawCollection = serde_json::from_slice(bytes).map_err(|e| {
        GridlineError::Serialization(format!("Failed to parse FeatureCollection: {}", e))
    })?;

    let mut parsed = ParsedFeatures {
        features: Vec::with_capacity(raw.features.len()),
        skipped: 0,
    };

    for value in raw.features {
        match parse_feature(value) {
            Ok(feature) => parsed.features.push(feature),
            Err(e) => {
                log::debug!("Skipping malformed feature: {}", e);
                parsed.skipped += 1;
            }
        }
    }

    Ok(parsed)
}

/// Serialize features as a GeoJSON `FeatureCollection`.
pub fn to_feature_collection_bytes(features: Vec<Feature>) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(&FeatureCollection::new(features))?)
}
