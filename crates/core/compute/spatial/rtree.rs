//! R*-tree index over line segments for proximity queries.
//!
//! Every segment of every line feature is bulk-loaded by its bounding box.
//! A query first expands the search point by the radius into a degree
//! envelope and collects segments whose boxes intersect it, then filters the
//! candidates with the exact point-to-segment great-circle distance.
//!
//! Longitudes wrap. A segment's end is stored unwrapped relative to its start,
//! so a segment crossing the antimeridian keeps a narrow box that may extend
//! past 180. Query envelopes are repeated one turn east and west whenever the
//! shifted copy overlaps the indexed longitudes, and an envelope that reaches
//! a pole covers every longitude.
//!
//! The index is immutable once built; a new dataset means a new index.
//!
//! # Example
//!
//! ```rust
//! use gridline::compute::spatial::SpatialIndex;
//! use gridline_types::Feature;
//!
//! let index = SpatialIndex::build(vec![Feature::line(&[[-100.0, 40.0], [-99.0, 40.0]])]);
//! assert!(index.is_near([-99.5, 40.1], 10.0));
//! assert!(!index.is_near([-90.0, 40.0], 10.0));
//! ```

use crate::compute::geometry::{point_to_segment_miles, radius_to_degrees, unwrap_lon};
use gridline_types::Feature;
use rstar::{AABB, Envelope, RTree, RTreeObject};

/// One segment of a line feature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSegment {
    pub start: [f64; 2],
    pub end: [f64; 2],
    /// Index of the parent feature in the index's feature list
    pub feature: usize,
    /// Index of the line part within a `MultiLineString`
    pub part: usize,
}

impl LineSegment {
    /// Exact distance in miles from `point` to this segment.
    #[inline]
    pub fn distance_miles(&self, point: [f64; 2]) -> f64 {
        point_to_segment_miles(point, self.start, self.end)
    }
}

impl RTreeObject for LineSegment {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.start, self.end)
    }
}

/// A line feature within `radius` of a query point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Proximity {
    pub feature: usize,
    pub distance_miles: f64,
}

/// Bulk-loaded segment index plus the features it was built from.
pub struct SpatialIndex {
    tree: RTree<LineSegment>,
    features: Vec<Feature>,
    /// Smallest and largest longitude over all segment boxes
    lon_extent: Option<(f64, f64)>,
}

impl SpatialIndex {
    /// Build an index from a feature set.
    ///
    /// Point geometries contribute no segments. Segments with non-finite
    /// coordinates are skipped.
    pub fn build(features: Vec<Feature>) -> Self {
        let mut segments = Vec::new();
        let mut lon_extent: Option<(f64, f64)> = None;

        for (feature_idx, feature) in features.iter().enumerate() {
            for (part_idx, part) in feature.geometry.line_parts().into_iter().enumerate() {
                for pair in part.windows(2) {
                    let (start, end) = (pair[0], pair[1]);
                    if !start.is_finite() || !end.is_finite() {
                        continue;
                    }
                    let start = start.as_array();
                    let end = [unwrap_lon(end.lon(), start[0]), end.lat()];
                    let (lo, hi) = (start[0].min(end[0]), start[0].max(end[0]));
                    lon_extent = Some(match lon_extent {
                        Some((min, max)) => (min.min(lo), max.max(hi)),
                        None => (lo, hi),
                    });
                    segments.push(LineSegment {
                        start,
                        end,
                        feature: feature_idx,
                        part: part_idx,
                    });
                }
            }
        }

        Self {
            tree: RTree::bulk_load(segments),
            features,
            lon_extent,
        }
    }

    /// An index with no segments.
    pub fn empty() -> Self {
        Self {
            tree: RTree::new(),
            features: Vec::new(),
            lon_extent: None,
        }
    }

    /// Coarse phase: segments whose bounding box intersects the expanded
    /// envelope around `point`, or one of its copies a turn east or west.
    /// May include segments farther than `radius`. Each segment is yielded
    /// once.
    pub fn candidates(
        &self,
        point: [f64; 2],
        radius_miles: f64,
    ) -> impl Iterator<Item = &LineSegment> + '_ {
        let envelopes = self.query_envelopes(point, radius_miles);
        let mut found = Vec::new();
        for (i, envelope) in envelopes.iter().enumerate() {
            let earlier = &envelopes[..i];
            found.extend(
                self.tree
                    .locate_in_envelope_intersecting(envelope)
                    .filter(|segment| {
                        let own = segment.envelope();
                        !earlier.iter().any(|prev| prev.intersects(&own))
                    }),
            );
        }
        found.into_iter()
    }

    /// The expanded envelope plus its whole-turn shifts that can still touch
    /// an indexed segment.
    fn query_envelopes(&self, point: [f64; 2], radius_miles: f64) -> Vec<AABB<[f64; 2]>> {
        let Some((lon_lo, lon_hi)) = self.lon_extent else {
            return Vec::new();
        };
        let (dlon, dlat) = radius_to_degrees(point[1], radius_miles);
        let lat_lo = (point[1] - dlat).max(-90.0);
        let lat_hi = (point[1] + dlat).min(90.0);

        if dlon >= 180.0 {
            return vec![AABB::from_corners([lon_lo, lat_lo], [lon_hi, lat_hi])];
        }

        let mut envelopes = vec![compute_envelope(point, dlon, lat_lo, lat_hi)];
        for turn in [-360.0, 360.0] {
            let lo = point[0] - dlon + turn;
            let hi = point[0] + dlon + turn;
            if hi >= lon_lo && lo <= lon_hi {
                envelopes.push(compute_envelope([point[0] + turn, point[1]], dlon, lat_lo, lat_hi));
            }
        }
        envelopes
    }

    /// The closest line feature within `radius_miles`, if any.
    pub fn nearest_within(&self, point: [f64; 2], radius_miles: f64) -> Option<Proximity> {
        let mut best: Option<Proximity> = None;
        for segment in self.candidates(point, radius_miles) {
            let distance = segment.distance_miles(point);
            if distance <= radius_miles
                && best.is_none_or(|b| distance < b.distance_miles)
            {
                best = Some(Proximity {
                    feature: segment.feature,
                    distance_miles: distance,
                });
            }
        }
        best
    }

    /// True when any segment lies within `radius_miles` of `point`.
    pub fn is_near(&self, point: [f64; 2], radius_miles: f64) -> bool {
        self.candidates(point, radius_miles)
            .any(|segment| segment.distance_miles(point) <= radius_miles)
    }

    /// Distinct indices of features within `radius_miles`, ascending.
    pub fn features_near(&self, point: [f64; 2], radius_miles: f64) -> Vec<usize> {
        let mut hits: Vec<usize> = self
            .candidates(point, radius_miles)
            .filter(|segment| segment.distance_miles(point) <= radius_miles)
            .map(|segment| segment.feature)
            .collect();
        hits.sort_unstable();
        hits.dedup();
        hits
    }

    pub fn feature(&self, idx: usize) -> Option<&Feature> {
        self.features.get(idx)
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn segment_count(&self) -> usize {
        self.tree.size()
    }

    pub fn feature_count(&self) -> usize {
        self.features.len()
    }
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::empty()
    }
}

/// Degree envelope `dlon` either side of `point` over an already clamped
/// latitude band.
#[inline]
fn compute_envelope(point: [f64; 2], dlon: f64, lat_lo: f64, lat_hi: f64) -> AABB<[f64; 2]> {
    AABB::from_corners([point[0] - dlon, lat_lo], [point[0] + dlon, lat_hi])
}
