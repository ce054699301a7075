use geo::Rect;
use serde::{Deserialize, Serialize};

/// Error returned when a bounding box cannot be constructed.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundingBoxError {
    /// A coordinate was NaN or infinite
    NonFinite(&'static str, f64),
    /// `min >= max` on one axis
    Inverted {
        axis: &'static str,
        min: f64,
        max: f64,
    },
    /// A coordinate fell outside the valid geographic range
    OutOfRange(&'static str, f64),
    /// Textual form could not be parsed
    Malformed(String),
}

impl std::fmt::Display for BoundingBoxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonFinite(name, v) => write!(f, "{} must be a finite number, got {}", name, v),
            Self::Inverted { axis, min, max } => write!(
                f,
                "min{} ({}) must be less than max{} ({})",
                axis, min, axis, max
            ),
            Self::OutOfRange(name, v) => write!(f, "{} out of range: {}", name, v),
            Self::Malformed(msg) => write!(f, "malformed bounding box: {}", msg),
        }
    }
}

impl std::error::Error for BoundingBoxError {}

/// A 2D axis-aligned geographic bounding box in degrees.
///
/// Wraps `geo::Rect`. Construct through [`BoundingBox::try_new`] when the
/// coordinates come from outside the process: `geo::Rect::new` silently
/// reorders inverted corners, which would hide a malformed request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// The underlying geometric rectangle
    pub rect: Rect,
}

impl BoundingBox {
    /// Create a bounding box without validation.
    ///
    /// # Examples
    ///
    /// ```
    /// use gridline_types::bbox::BoundingBox;
    ///
    /// let bbox = BoundingBox::new(-74.0, 40.7, -73.9, 40.8);
    /// assert_eq!(bbox.min_lon(), -74.0);
    /// ```
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            rect: Rect::new(
                geo::coord! { x: min_lon, y: min_lat },
                geo::coord! { x: max_lon, y: max_lat },
            ),
        }
    }

    /// Create a bounding box, requiring finite coordinates and a strictly
    /// positive extent on both axes.
    pub fn try_new(
        min_lon: f64,
        min_lat: f64,
        max_lon: f64,
        max_lat: f64,
    ) -> Result<Self, BoundingBoxError> {
        for (name, v) in [
            ("minLon", min_lon),
            ("minLat", min_lat),
            ("maxLon", max_lon),
            ("maxLat", max_lat),
        ] {
            if !v.is_finite() {
                return Err(BoundingBoxError::NonFinite(name, v));
            }
        }
        if min_lon >= max_lon {
            return Err(BoundingBoxError::Inverted {
                axis: "Lon",
                min: min_lon,
                max: max_lon,
            });
        }
        if min_lat >= max_lat {
            return Err(BoundingBoxError::Inverted {
                axis: "Lat",
                min: min_lat,
                max: max_lat,
            });
        }
        Ok(Self::new(min_lon, min_lat, max_lon, max_lat))
    }

    /// Like [`BoundingBox::try_new`], additionally requiring longitudes in
    /// `[-180, 180]` and latitudes in `[-90, 90]`.
    pub fn try_new_geographic(
        min_lon: f64,
        min_lat: f64,
        max_lon: f64,
        max_lat: f64,
    ) -> Result<Self, BoundingBoxError> {
        let bbox = Self::try_new(min_lon, min_lat, max_lon, max_lat)?;
        for (name, v) in [("minLon", min_lon), ("maxLon", max_lon)] {
            if !(-180.0..=180.0).contains(&v) {
                return Err(BoundingBoxError::OutOfRange(name, v));
            }
        }
        for (name, v) in [("minLat", min_lat), ("maxLat", max_lat)] {
            if !(-90.0..=90.0).contains(&v) {
                return Err(BoundingBoxError::OutOfRange(name, v));
            }
        }
        Ok(bbox)
    }

    /// Parse `"minLon,minLat,maxLon,maxLat"` with geographic range checks.
    ///
    /// ```
    /// use gridline_types::bbox::BoundingBox;
    ///
    /// let bbox = BoundingBox::parse_geographic("-10,35,30,60").unwrap();
    /// assert_eq!(bbox.max_lat(), 60.0);
    /// assert!(BoundingBox::parse_geographic("-10,35,30").is_err());
    /// ```
    pub fn parse_geographic(s: &str) -> Result<Self, BoundingBoxError> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(BoundingBoxError::Malformed(format!(
                "expected 4 comma-separated numbers, got {}",
                parts.len()
            )));
        }
        let mut values = [0.0f64; 4];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part
                .parse::<f64>()
                .map_err(|_| BoundingBoxError::Malformed(format!("'{}' is not a number", part)))?;
        }
        Self::try_new_geographic(values[0], values[1], values[2], values[3])
    }

    pub fn min_lon(&self) -> f64 {
        self.rect.min().x
    }

    pub fn min_lat(&self) -> f64 {
        self.rect.min().y
    }

    pub fn max_lon(&self) -> f64 {
        self.rect.max().x
    }

    pub fn max_lat(&self) -> f64 {
        self.rect.max().y
    }

    /// Center as `[lon, lat]`.
    pub fn center(&self) -> [f64; 2] {
        [
            (self.min_lon() + self.max_lon()) / 2.0,
            (self.min_lat() + self.max_lat()) / 2.0,
        ]
    }

    pub fn width(&self) -> f64 {
        self.max_lon() - self.min_lon()
    }

    pub fn height(&self) -> f64 {
        self.max_lat() - self.min_lat()
    }

    /// Inclusive containment test.
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.min_lon() && lon <= self.max_lon() && lat >= self.min_lat() && lat <= self.max_lat()
    }

    /// True when the boxes share any area or edge.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        !(self.max_lon() < other.min_lon()
            || self.min_lon() > other.max_lon()
            || self.max_lat() < other.min_lat()
            || self.min_lat() > other.max_lat())
    }

    /// Intersection with `other`, or `None` when it has no area.
    pub fn intersection(&self, other: &BoundingBox) -> Option<BoundingBox> {
        let min_lon = self.min_lon().max(other.min_lon());
        let min_lat = self.min_lat().max(other.min_lat());
        let max_lon = self.max_lon().min(other.max_lon());
        let max_lat = self.max_lat().min(other.max_lat());
        (min_lon < max_lon && min_lat < max_lat)
            .then(|| BoundingBox::new(min_lon, min_lat, max_lon, max_lat))
    }

    /// The whole lon/lat plane.
    pub fn world() -> Self {
        Self::new(-180.0, -90.0, 180.0, 90.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_creation() {
        let bbox = BoundingBox::new(-74.0, 40.7, -73.9, 40.8);
        assert_eq!(bbox.min_lon(), -74.0);
        assert_eq!(bbox.min_lat(), 40.7);
        assert_eq!(bbox.max_lon(), -73.9);
        assert_eq!(bbox.max_lat(), 40.8);
    }

    #[test]
    fn test_bbox_dimensions_and_center() {
        let bbox = BoundingBox::new(0.0, 0.0, 10.0, 5.0);
        assert_eq!(bbox.width(), 10.0);
        assert_eq!(bbox.height(), 5.0);
        assert_eq!(bbox.center(), [5.0, 2.5]);
    }

    #[test]
    fn test_try_new_rejects_degenerate() {
        assert!(matches!(
            BoundingBox::try_new(-70.0, 20.0, -70.0, 50.0),
            Err(BoundingBoxError::Inverted { axis: "Lon", .. })
        ));
        assert!(matches!(
            BoundingBox::try_new(-120.0, 50.0, -70.0, 20.0),
            Err(BoundingBoxError::Inverted { axis: "Lat", .. })
        ));
        assert!(matches!(
            BoundingBox::try_new(f64::NAN, 20.0, -70.0, 50.0),
            Err(BoundingBoxError::NonFinite("minLon", _))
        ));
    }

    #[test]
    fn test_parse_geographic() {
        let bbox = BoundingBox::parse_geographic(" -120, 20 ,-70,50").unwrap();
        assert_eq!(bbox.min_lon(), -120.0);
        assert_eq!(bbox.max_lat(), 50.0);

        assert!(matches!(
            BoundingBox::parse_geographic("1,2,3"),
            Err(BoundingBoxError::Malformed(_))
        ));
        assert!(matches!(
            BoundingBox::parse_geographic("a,2,3,4"),
            Err(BoundingBoxError::Malformed(_))
        ));
        assert!(matches!(
            BoundingBox::parse_geographic("-190,0,10,10"),
            Err(BoundingBoxError::OutOfRange("minLon", _))
        ));
        assert!(matches!(
            BoundingBox::parse_geographic("0,0,10,95"),
            Err(BoundingBoxError::OutOfRange("maxLat", _))
        ));
        assert!(BoundingBox::parse_geographic("inf,0,10,10").is_err());
    }

    #[test]
    fn test_bbox_contains() {
        let bbox = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        assert!(bbox.contains(5.0, 5.0));
        assert!(bbox.contains(0.0, 10.0));
        assert!(!bbox.contains(-0.1, 5.0));
    }

    #[test]
    fn test_bbox_intersection() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, 5.0, 15.0, 15.0);
        let c = BoundingBox::new(10.0, 0.0, 20.0, 10.0);

        assert!(a.intersects(&b));
        assert_eq!(a.intersection(&b), Some(BoundingBox::new(5.0, 5.0, 10.0, 10.0)));
        // Touching edges intersect but share no area
        assert!(a.intersects(&c));
        assert_eq!(a.intersection(&c), None);
    }
}
