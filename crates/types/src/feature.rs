//! GeoJSON-compatible feature types.
//!
//! Features carry a small typed allow-list of known properties and keep
//! anything else in [`FeatureProperties::extra`] so payloads round-trip
//! without loss. The wire form is read and written through the `geojson`
//! crate; only point and line geometries are kept.

use geojson::feature::Id;
use geojson::{JsonObject, Value as GeoJsonValue};
use serde::de::{self, Deserializer};
use serde::ser::{self, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Why a GeoJSON feature could not be converted.
#[derive(Debug)]
pub enum FeatureError {
    /// The feature has a null or absent geometry
    MissingGeometry,
    /// Polygons and geometry collections are not indexed
    UnsupportedGeometry(&'static str),
    /// A position with fewer than two coordinates
    ShortPosition(usize),
    /// Properties did not match the known property types
    Properties(serde_json::Error),
}

impl std::fmt::Display for FeatureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingGeometry => write!(f, "feature has no geometry"),
            Self::UnsupportedGeometry(kind) => write!(f, "unsupported geometry type {}", kind),
            Self::ShortPosition(len) => {
                write!(f, "position needs at least 2 coordinates, got {}", len)
            }
            Self::Properties(e) => write!(f, "invalid properties: {}", e),
        }
    }
}

impl std::error::Error for FeatureError {}

/// A `[lon, lat]` position. Altitude and further members are dropped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position(pub [f64; 2]);

impl Position {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self([lon, lat])
    }

    pub fn lon(&self) -> f64 {
        self.0[0]
    }

    pub fn lat(&self) -> f64 {
        self.0[1]
    }

    pub fn as_array(&self) -> [f64; 2] {
        self.0
    }

    pub fn is_finite(&self) -> bool {
        self.0[0].is_finite() && self.0[1].is_finite()
    }
}

impl From<[f64; 2]> for Position {
    fn from(value: [f64; 2]) -> Self {
        Self(value)
    }
}

impl TryFrom<&[f64]> for Position {
    type Error = FeatureError;

    fn try_from(coords: &[f64]) -> Result<Self, Self::Error> {
        match coords {
            [lon, lat, ..] => Ok(Self([*lon, *lat])),
            _ => Err(FeatureError::ShortPosition(coords.len())),
        }
    }
}

fn positions(coords: &[Vec<f64>]) -> Result<Vec<Position>, FeatureError> {
    coords.iter().map(|c| Position::try_from(c.as_slice())).collect()
}

fn coords(positions: &[Position]) -> Vec<Vec<f64>> {
    positions.iter().map(|p| p.0.to_vec()).collect()
}

/// Supported geometry types.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Position),
    MultiPoint(Vec<Position>),
    LineString(Vec<Position>),
    MultiLineString(Vec<Vec<Position>>),
}

impl Geometry {
    /// Line parts of the geometry; empty for point geometries.
    pub fn line_parts(&self) -> Vec<&[Position]> {
        match self {
            Geometry::LineString(line) => vec![line.as_slice()],
            Geometry::MultiLineString(lines) => lines.iter().map(Vec::as_slice).collect(),
            Geometry::Point(_) | Geometry::MultiPoint(_) => Vec::new(),
        }
    }

    pub fn is_line(&self) -> bool {
        matches!(self, Geometry::LineString(_) | Geometry::MultiLineString(_))
    }
}

impl TryFrom<GeoJsonValue> for Geometry {
    type Error = FeatureError;

    fn try_from(value: GeoJsonValue) -> Result<Self, Self::Error> {
        Ok(match value {
            GeoJsonValue::Point(p) => Geometry::Point(Position::try_from(p.as_slice())?),
            GeoJsonValue::MultiPoint(ps) => Geometry::MultiPoint(positions(&ps)?),
            GeoJsonValue::LineString(ps) => Geometry::LineString(positions(&ps)?),
            GeoJsonValue::MultiLineString(lines) => Geometry::MultiLineString(
                lines
                    .iter()
                    .map(|line| positions(line))
                    .collect::<Result<_, _>>()?,
            ),
            GeoJsonValue::Polygon(_) => return Err(FeatureError::UnsupportedGeometry("Polygon")),
            GeoJsonValue::MultiPolygon(_) => {
                return Err(FeatureError::UnsupportedGeometry("MultiPolygon"));
            }
            GeoJsonValue::GeometryCollection(_) => {
                return Err(FeatureError::UnsupportedGeometry("GeometryCollection"));
            }
        })
    }
}

impl From<&Geometry> for GeoJsonValue {
    fn from(geometry: &Geometry) -> Self {
        match geometry {
            Geometry::Point(p) => GeoJsonValue::Point(p.0.to_vec()),
            Geometry::MultiPoint(ps) => GeoJsonValue::MultiPoint(coords(ps)),
            Geometry::LineString(ps) => GeoJsonValue::LineString(coords(ps)),
            Geometry::MultiLineString(lines) => {
                GeoJsonValue::MultiLineString(lines.iter().map(|l| coords(l)).collect())
            }
        }
    }
}

impl Serialize for Geometry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        geojson::Geometry::new(GeoJsonValue::from(self)).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Geometry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let geometry = geojson::Geometry::deserialize(deserializer)?;
        Geometry::try_from(geometry.value).map_err(de::Error::custom)
    }
}

/// Known feature properties plus everything else.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Infrastructure category, e.g. `fiber`, `transmission`, `submarine`
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(
        rename = "voltageKv",
        alias = "voltage_kv",
        default,
        deserialize_with = "lenient_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub voltage_kv: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FeatureProperties {
    /// Split a GeoJSON properties object into known fields and `extra`.
    pub fn from_object(object: JsonObject) -> Result<Self, FeatureError> {
        serde_json::from_value(Value::Object(object)).map_err(FeatureError::Properties)
    }

    pub fn to_object(&self) -> Result<JsonObject, FeatureError> {
        match serde_json::to_value(self).map_err(FeatureError::Properties)? {
            Value::Object(object) => Ok(object),
            _ => Ok(JsonObject::new()),
        }
    }
}

/// Accepts a number, a numeric string, or null.
fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite()))
}

/// A single GeoJSON feature.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub id: Option<Id>,
    pub geometry: Geometry,
    pub properties: FeatureProperties,
}

impl Feature {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            id: None,
            geometry,
            properties: FeatureProperties::default(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(Id::String(id.into()));
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.properties.name = Some(name.into());
        self
    }

    /// Convenience constructor for a `LineString` feature.
    ///
    /// ```
    /// use gridline_types::Feature;
    ///
    /// let f = Feature::line(&[[-100.0, 40.0], [-99.0, 41.0]]);
    /// assert!(f.geometry.is_line());
    /// ```
    pub fn line(coords: &[[f64; 2]]) -> Self {
        Self::new(Geometry::LineString(
            coords.iter().copied().map(Position::from).collect(),
        ))
    }

    pub fn point(lon: f64, lat: f64) -> Self {
        Self::new(Geometry::Point(Position::new(lon, lat)))
    }

    /// Key used to recognise copies of one feature across tiles.
    ///
    /// String and numeric ids never collide: `"7"` and `7` differ.
    pub fn id_key(&self) -> Option<String> {
        match &self.id {
            Some(Id::String(s)) => Some(format!("s:{}", s)),
            Some(Id::Number(n)) => Some(format!("n:{}", n)),
            None => None,
        }
    }

    pub fn to_geojson(&self) -> Result<geojson::Feature, FeatureError> {
        Ok(geojson::Feature {
            bbox: None,
            geometry: Some(geojson::Geometry::new(GeoJsonValue::from(&self.geometry))),
            id: self.id.clone(),
            properties: Some(self.properties.to_object()?),
            foreign_members: None,
        })
    }
}

impl TryFrom<geojson::Feature> for Feature {
    type Error = FeatureError;

    fn try_from(feature: geojson::Feature) -> Result<Self, Self::Error> {
        let geometry = feature.geometry.ok_or(FeatureError::MissingGeometry)?;
        Ok(Self {
            id: feature.id,
            geometry: Geometry::try_from(geometry.value)?,
            properties: match feature.properties {
                Some(object) => FeatureProperties::from_object(object)?,
                None => FeatureProperties::default(),
            },
        })
    }
}

impl Serialize for Feature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_geojson()
            .map_err(ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Feature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let feature = geojson::Feature::deserialize(deserializer)?;
        Feature::try_from(feature).map_err(de::Error::custom)
    }
}

/// A GeoJSON `FeatureCollection`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl Serialize for FeatureCollection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let features = self
            .features
            .iter()
            .map(Feature::to_geojson)
            .collect::<Result<Vec<_>, _>>()
            .map_err(ser::Error::custom)?;
        geojson::FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FeatureCollection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let collection = geojson::FeatureCollection::deserialize(deserializer)?;
        let features = collection
            .features
            .into_iter()
            .map(Feature::try_from)
            .collect::<Result<Vec<_>, _>>()
            .map_err(de::Error::custom)?;
        Ok(Self { features })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_feature_from_geojson() {
        let raw = json!({
            "type": "Feature",
            "geometry": {"type": "LineString", "coordinates": [[-100.0, 40.0, 12.0], [-99.5, 40.5]]},
            "properties": {"name": "Route 7", "type": "fiber", "voltageKv": "345", "carrier": "Acme"}
        });
        let feature: Feature = serde_json::from_value(raw).unwrap();

        assert_eq!(feature.properties.name.as_deref(), Some("Route 7"));
        assert_eq!(feature.properties.kind.as_deref(), Some("fiber"));
        assert_eq!(feature.properties.voltage_kv, Some(345.0));
        assert_eq!(feature.properties.extra.get("carrier"), Some(&json!("Acme")));
        assert_eq!(feature.geometry.line_parts()[0][0], Position::new(-100.0, 40.0));
    }

    #[test]
    fn test_null_properties_default() {
        let raw = json!({
            "type": "Feature",
            "geometry": {"type": "Point", "coordinates": [1.0, 2.0]},
            "properties": null
        });
        let feature: Feature = serde_json::from_value(raw).unwrap();
        assert_eq!(feature.properties, FeatureProperties::default());
        assert!(!feature.geometry.is_line());
    }

    #[test]
    fn test_collection_serializes_type_tags() {
        let fc = FeatureCollection::new(vec![Feature::point(1.0, 2.0).with_name("a")]);
        let value = serde_json::to_value(&fc).unwrap();

        assert_eq!(value["type"], "FeatureCollection");
        assert_eq!(value["features"][0]["type"], "Feature");
        assert_eq!(value["features"][0]["geometry"]["type"], "Point");
        assert_eq!(value["features"][0]["geometry"]["coordinates"], json!([1.0, 2.0]));
        assert_eq!(value["features"][0]["properties"]["name"], "a");
    }

    #[test]
    fn test_multilinestring_parts() {
        let geometry = Geometry::MultiLineString(vec![
            vec![Position::new(0.0, 0.0), Position::new(1.0, 1.0)],
            vec![Position::new(2.0, 2.0), Position::new(3.0, 3.0)],
        ]);
        assert_eq!(geometry.line_parts().len(), 2);
    }

    #[test]
    fn test_short_position_rejected() {
        let raw = json!({"type": "Point", "coordinates": [1.0]});
        assert!(serde_json::from_value::<Geometry>(raw).is_err());
        assert!(matches!(
            Geometry::try_from(GeoJsonValue::LineString(vec![vec![0.0, 0.0], vec![1.0]])),
            Err(FeatureError::ShortPosition(1))
        ));
    }

    #[test]
    fn test_polygon_unsupported() {
        let polygon = GeoJsonValue::Polygon(vec![vec![
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![1.0, 1.0],
            vec![0.0, 0.0],
        ]]);
        assert!(matches!(
            Geometry::try_from(polygon),
            Err(FeatureError::UnsupportedGeometry("Polygon"))
        ));
    }

    #[test]
    fn test_missing_geometry_rejected() {
        let raw = json!({"type": "Feature", "geometry": null, "properties": {}});
        assert!(serde_json::from_value::<Feature>(raw).is_err());
    }

    #[test]
    fn test_ids_keep_their_json_type() {
        let raw = json!({
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "id": 7, "geometry": {"type": "Point", "coordinates": [0, 0]}, "properties": {}},
                {"type": "Feature", "id": "7", "geometry": {"type": "Point", "coordinates": [0, 0]}, "properties": {}}
            ]
        });
        let fc: FeatureCollection = serde_json::from_value(raw.clone()).unwrap();
        assert_ne!(fc.features[0].id_key(), fc.features[1].id_key());
        assert_eq!(serde_json::to_value(&fc).unwrap()["features"][0]["id"], json!(7));
        assert_eq!(serde_json::to_value(&fc).unwrap()["features"][1]["id"], json!("7"));
    }
}
