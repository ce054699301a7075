//! Validation for request parameters.

use crate::error::{GridlineError, Result};
use gridline_types::BoundingBox;

/// Half of Earth's circumference in miles; no two points are farther apart.
const MAX_RADIUS_MILES: f64 = 12_450.0;

/// Validates a query bounding box given as raw numbers.
///
/// Requires finite values and `min < max` on both axes. Longitudes and
/// latitudes beyond the world bounds are accepted (map clients send them when
/// panned across the antimeridian) and clamped later by the tile grid.
///
/// # Examples
///
/// ```
/// use gridline::compute::validation::validate_bbox;
///
/// assert!(validate_bbox(-120.0, 20.0, -70.0, 50.0).is_ok());
/// assert!(validate_bbox(-70.0, 20.0, -70.0, 50.0).is_err());
/// assert!(validate_bbox(f64::NAN, 20.0, -70.0, 50.0).is_err());
/// ```
pub fn validate_bbox(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Result<BoundingBox> {
    Ok(BoundingBox::try_new(min_lon, min_lat, max_lon, max_lat)?)
}

/// Validates a proximity radius in miles. Zero is allowed and matches only
/// exact coincidence.
///
/// ```
/// use gridline::compute::validation::validate_radius;
///
/// assert!(validate_radius(10.0).is_ok());
/// assert!(validate_radius(0.0).is_ok());
/// assert!(validate_radius(-1.0).is_err());
/// assert!(validate_radius(f64::INFINITY).is_err());
/// ```
pub fn validate_radius(radius_miles: f64) -> Result<()> {
    if !radius_miles.is_finite() {
        return Err(GridlineError::InvalidInput(format!(
            "Radius must be finite, got: {}",
            radius_miles
        )));
    }
    if radius_miles < 0.0 {
        return Err(GridlineError::InvalidInput(format!(
            "Radius must not be negative, got: {}",
            radius_miles
        )));
    }
    if radius_miles > MAX_RADIUS_MILES {
        return Err(GridlineError::InvalidInput(format!(
            "Radius {} exceeds half of Earth's circumference ({} miles)",
            radius_miles, MAX_RADIUS_MILES
        )));
    }
    Ok(())
}

/// Validates a geographic position.
pub fn validate_position(lon: f64, lat: f64) -> Result<()> {
    if !lon.is_finite() || !lat.is_finite() {
        return Err(GridlineError::InvalidInput(format!(
            "Coordinates must be finite, got: ({}, {})",
            lon, lat
        )));
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err(GridlineError::InvalidInput(format!(
            "Longitude out of range [-180.0, 180.0]: {}",
            lon
        )));
    }
    if !(-90.0..=90.0).contains(&lat) {
        return Err(GridlineError::InvalidInput(format!(
            "Latitude out of range [-90.0, 90.0]: {}",
            lat
        )));
    }
    Ok(())
}

/// Parses a required finite number from a query parameter.
pub fn parse_finite(name: &str, value: Option<&str>) -> Result<f64> {
    let raw = value.ok_or_else(|| {
        GridlineError::InvalidBoundingBox(format!("missing required parameter '{}'", name))
    })?;
    let parsed = raw.trim().parse::<f64>().map_err(|_| {
        GridlineError::InvalidBoundingBox(format!("'{}' is not a number: {}", name, raw))
    })?;
    if !parsed.is_finite() {
        return Err(GridlineError::InvalidBoundingBox(format!(
            "'{}' must be finite, got {}",
            name, raw
        )));
    }
    Ok(parsed)
}

/// Parses an optional number, rejecting values that are present but invalid.
pub fn parse_optional_f64(name: &str, value: Option<&str>) -> Result<Option<f64>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) => {
            let parsed = raw.parse::<f64>().map_err(|_| {
                GridlineError::InvalidInput(format!("'{}' is not a number: {}", name, raw))
            })?;
            if !parsed.is_finite() {
                return Err(GridlineError::InvalidInput(format!(
                    "'{}' must be finite, got {}",
                    name, raw
                )));
            }
            Ok(Some(parsed))
        }
    }
}

/// Splits a comma-separated list, dropping empty items.
pub fn parse_list(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_position() {
        assert!(validate_position(-74.0, 40.7).is_ok());
        assert!(validate_position(200.0, 40.7).is_err());
        assert!(validate_position(-74.0, -95.0).is_err());
        assert!(validate_position(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_validate_bbox_error_kind() {
        let err = validate_bbox(10.0, 0.0, 5.0, 1.0).unwrap_err();
        assert!(matches!(err, GridlineError::InvalidBoundingBox(_)));
        assert!(err.is_client_error());
    }

    #[test]
    fn test_parse_finite() {
        assert_eq!(parse_finite("minLon", Some(" -120.5 ")).unwrap(), -120.5);
        assert!(matches!(
            parse_finite("minLon", None),
            Err(GridlineError::InvalidBoundingBox(_))
        ));
        assert!(parse_finite("minLon", Some("abc")).is_err());
        assert!(parse_finite("minLon", Some("NaN")).is_err());
        assert!(parse_finite("minLon", Some("inf")).is_err());
    }

    #[test]
    fn test_parse_optional_f64() {
        assert_eq!(parse_optional_f64("x", None).unwrap(), None);
        assert_eq!(parse_optional_f64("x", Some("")).unwrap(), None);
        assert_eq!(parse_optional_f64("x", Some("2.5")).unwrap(), Some(2.5));
        assert!(parse_optional_f64("x", Some("two")).is_err());
    }

    #[test]
    fn test_parse_list() {
        assert_eq!(parse_list(Some("gppd, eia,,")), vec!["gppd", "eia"]);
        assert!(parse_list(None).is_empty());
    }
}
