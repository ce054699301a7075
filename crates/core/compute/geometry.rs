//! Great-circle math in miles.
//!
//! Coordinates are `[lon, lat]` in degrees throughout.

use geo::{Destination, Distance, HaversineMeasure, Point};

/// Mean Earth radius used for every distance in the crate.
pub const EARTH_RADIUS_MILES: f64 = 3958.8;

/// Miles per degree of latitude used for envelope expansion. Slightly below
/// the true value (~69.09) so expanded envelopes err on the large side.
pub const MILES_PER_DEGREE_LAT: f64 = 69.0;

/// Floor for `|cos(lat)|` when converting miles to degrees of longitude.
pub const MIN_COS_LAT: f64 = 0.01;

#[inline]
fn earth() -> HaversineMeasure {
    HaversineMeasure::new(EARTH_RADIUS_MILES)
}

/// Haversine distance between two positions, in miles.
///
/// ```
/// use gridline::compute::geometry::haversine_miles;
///
/// let nyc = [-74.0060, 40.7128];
/// let la = [-118.2437, 34.0522];
/// let d = haversine_miles(nyc, la);
/// assert!(d > 2_440.0 && d < 2_460.0);
/// ```
#[inline]
pub fn haversine_miles(a: [f64; 2], b: [f64; 2]) -> f64 {
    earth().distance(Point::new(a[0], a[1]), Point::new(b[0], b[1]))
}

/// Shift `lon` by whole turns so it lies within 180 degrees of `reference`.
///
/// ```
/// use gridline::compute::geometry::unwrap_lon;
///
/// assert_eq!(unwrap_lon(-179.0, 179.0), 181.0);
/// assert_eq!(unwrap_lon(170.0, -175.0), -190.0);
/// assert_eq!(unwrap_lon(10.0, 20.0), 10.0);
/// ```
#[inline]
pub fn unwrap_lon(lon: f64, reference: f64) -> f64 {
    let delta = lon - reference;
    if delta.abs() <= 180.0 {
        return lon;
    }
    lon - 360.0 * (delta / 360.0).round()
}

/// Distance in miles from `p` to the segment `a`-`b`.
///
/// `a` is unwrapped to lie within 180 degrees of `p` and `b` within 180
/// degrees of `a`, so segments and points on opposite sides of the
/// antimeridian are measured the short way round. The point is then projected
/// onto the line through the segment in degree space, the projection
/// parameter is clamped to `[0, 1]`, and the great-circle distance to the
/// clamped point is returned. Zero-length segments degrade to point-to-point
/// distance.
pub fn point_to_segment_miles(p: [f64; 2], a: [f64; 2], b: [f64; 2]) -> f64 {
    let a = [unwrap_lon(a[0], p[0]), a[1]];
    let b = [unwrap_lon(b[0], a[0]), b[1]];
    let dx = b[0] - a[0];
    let dy = b[1] - a[1];
    let len_sq = dx * dx + dy * dy;

    if len_sq == 0.0 {
        return haversine_miles(p, a);
    }

    let t = (((p[0] - a[0]) * dx + (p[1] - a[1]) * dy) / len_sq).clamp(0.0, 1.0);
    let closest = [a[0] + t * dx, a[1] + t * dy];
    haversine_miles(p, closest)
}

/// Convert a radius in miles to `(dlon, dlat)` degree offsets around `lat`.
///
/// Latitude uses `radius / 69`. Longitude uses `radius / (69 * cos(lat))`,
/// evaluated at the most poleward latitude the expanded box reaches, with
/// `|cos|` floored at [`MIN_COS_LAT`]. For large radii at high latitudes the
/// exact spherical bound `2 * asin(sin(r / 2R) / cos(lat))` can exceed the
/// linear estimate, so the larger of the two is used. `dlon` is capped at 180.
///
/// When the latitude band reaches a pole every meridian passes within the
/// radius, so `dlon` is 180.
pub fn radius_to_degrees(lat: f64, radius_miles: f64) -> (f64, f64) {
    let dlat = radius_miles / MILES_PER_DEGREE_LAT;
    if lat.abs() + dlat >= 90.0 {
        return (180.0, dlat);
    }
    let cos_lat = (lat.abs() + dlat).to_radians().cos().abs().max(MIN_COS_LAT);

    let linear = radius_miles / (MILES_PER_DEGREE_LAT * cos_lat);
    let ratio = (radius_miles / (2.0 * EARTH_RADIUS_MILES)).sin() / cos_lat;
    let spherical = if ratio >= 1.0 {
        180.0
    } else {
        (2.0 * ratio.asin()).to_degrees()
    };

    (linear.max(spherical).min(180.0), dlat)
}

/// Position reached by travelling `distance_miles` from `origin` along
/// `bearing_deg` (clockwise from north).
pub fn destination_point(origin: [f64; 2], bearing_deg: f64, distance_miles: f64) -> [f64; 2] {
    let p = earth().destination(Point::new(origin[0], origin[1]), bearing_deg, distance_miles);
    [p.x(), p.y()]
}

/// Closed ring approximating a circle of `radius_miles` around `center`.
///
/// Returns `steps + 1` positions; the last repeats the first. `steps` below 3
/// is raised to 3.
///
/// ```
/// use gridline::compute::geometry::circle_polygon;
///
/// let ring = circle_polygon([-98.0, 39.0], 25.0, 32);
/// assert_eq!(ring.len(), 33);
/// assert_eq!(ring.first(), ring.last());
/// ```
pub fn circle_polygon(center: [f64; 2], radius_miles: f64, steps: usize) -> Vec<[f64; 2]> {
    let steps = steps.max(3);
    let mut ring = Vec::with_capacity(steps + 1);
    for i in 0..steps {
        let bearing = 360.0 * i as f64 / steps as f64;
        ring.push(destination_point(center, bearing, radius_miles));
    }
    ring.push(ring[0]);
    ring
}
