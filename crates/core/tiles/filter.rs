//! Merging tile results and approximate bbox membership.

use gridline_types::{BoundingBox, Feature, Geometry, Position};
use rustc_hash::FxHashSet;

/// Tracks feature ids already emitted.
///
/// Features that carry an `id` appear in every tile their geometry crosses;
/// only the first copy of each id is admitted. Features without an id are
/// always admitted.
#[derive(Debug, Default)]
pub struct FeatureDeduper {
    seen: FxHashSet<String>,
}

impl FeatureDeduper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn admit(&mut self, feature: &Feature) -> bool {
        match feature.id_key() {
            Some(key) => self.seen.insert(key),
            None => true,
        }
    }
}

/// Concatenate per-tile feature sets in order, dropping repeated ids.
pub fn merge_features<'a, I>(parts: I) -> Vec<Feature>
where
    I: IntoIterator<Item = &'a [Feature]>,
    I::IntoIter: Clone,
{
    let parts = parts.into_iter();
    let total: usize = parts.clone().map(<[Feature]>::len).sum();

    let mut merged = Vec::with_capacity(total);
    let mut dedupe = FeatureDeduper::new();
    for part in parts {
        for feature in part {
            if dedupe.admit(feature) {
                merged.push(feature.clone());
            }
        }
    }
    merged
}

/// Approximate bbox membership.
///
/// Points are tested directly. For each line part the first and last
/// vertices are tested, plus the middle vertex when the part has more than
/// two. A line crossing the box with no sampled vertex inside is missed, and
/// a line with a sampled vertex inside is kept even if most of it lies
/// outside.
pub fn feature_in_bbox(feature: &Feature, bbox: &BoundingBox) -> bool {
    let inside = |p: &Position| bbox.contains(p.lon(), p.lat());
    match &feature.geometry {
        Geometry::Point(p) => inside(p),
        Geometry::MultiPoint(points) => points.iter().any(inside),
        geometry => geometry.line_parts().into_iter().any(|part| {
            let (Some(first), Some(last)) = (part.first(), part.last()) else {
                return false;
            };
            if inside(first) || inside(last) {
                return true;
            }
            part.len() > 2 && inside(&part[part.len() / 2])
        }),
    }
}

/// Keep the features passing [`feature_in_bbox`], preserving order.
pub fn filter_to_bbox(mut features: Vec<Feature>, bbox: &BoundingBox) -> Vec<Feature> {
    features.retain(|f| feature_in_bbox(f, bbox));
    features
}
