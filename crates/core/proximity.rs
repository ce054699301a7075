//! Versioned, swappable line index for proximity filtering.
//!
//! Readers take a snapshot `Arc` and query it without holding the lock.
//! A rebuild constructs the new index first and only then swaps it in, so a
//! reader sees either the old index or the new one, never a partial build.

use crate::compute::geojson::{parse_feature_collection, to_feature_collection_bytes};
use crate::compute::spatial::{Proximity, SpatialIndex};
use crate::compute::validation::{validate_position, validate_radius};
use crate::error::Result;
use crate::storage::{CacheManager, Durability};
use bytes::Bytes;
use gridline_types::Feature;
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

pub const LINES_CACHE_KEY: &str = "proximity:lines";

pub struct ProximityIndex {
    index: RwLock<Arc<SpatialIndex>>,
    version: AtomicU64,
    cache: Arc<CacheManager>,
    ttl: Duration,
}

impl ProximityIndex {
    pub fn new(cache: Arc<CacheManager>, ttl: Duration) -> Self {
        Self {
            index: RwLock::new(Arc::new(SpatialIndex::empty())),
            version: AtomicU64::new(0),
            cache,
            ttl,
        }
    }

    pub fn snapshot(&self) -> Arc<SpatialIndex> {
        Arc::clone(&self.index.read())
    }

    /// Incremented on every swap; 0 until the first dataset is loaded.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Build an index over `features` and swap it in. Returns the new version.
    pub fn replace(&self, features: Vec<Feature>) -> u64 {
        let index = Arc::new(SpatialIndex::build(features));
        let (segments, lines) = (index.segment_count(), index.feature_count());

        let version = {
            let mut guard = self.index.write();
            *guard = index;
            self.version.fetch_add(1, Ordering::AcqRel) + 1
        };

        log::info!(
            "Rebuilt spatial index v{}: {} features, {} segments",
            version,
            lines,
            segments
        );
        version
    }

    /// Replace the index from a GeoJSON `FeatureCollection` and persist the
    /// dataset to the large cache tier.
    pub fn load_geojson(&self, bytes: &[u8]) -> Result<u64> {
        let parsed = parse_feature_collection(bytes)?;
        if parsed.skipped > 0 {
            log::warn!("Skipped {} malformed line features", parsed.skipped);
        }

        let body = to_feature_collection_bytes(parsed.features.clone())?;
        if !self
            .cache
            .set(LINES_CACHE_KEY, Bytes::from(body), self.ttl, Durability::Large)
        {
            log::warn!("Line dataset was not cached");
        }

        Ok(self.replace(parsed.features))
    }

    /// Rebuild from the cached dataset. Returns the new version, or `None`
    /// when nothing usable was cached.
    pub fn restore_from_cache(&self) -> Option<u64> {
        let hit = self.cache.get(LINES_CACHE_KEY)?;
        match parse_feature_collection(&hit.value) {
            Ok(parsed) => Some(self.replace(parsed.features)),
            Err(e) => {
                log::warn!("Clearing unreadable cached line dataset: {}", e);
                self.cache.invalidate(LINES_CACHE_KEY);
                None
            }
        }
    }

    pub fn is_near(&self, point: [f64; 2], radius_miles: f64) -> Result<bool> {
        check(point, radius_miles)?;
        Ok(self.snapshot().is_near(point, radius_miles))
    }

    pub fn nearest_within(&self, point: [f64; 2], radius_miles: f64) -> Result<Option<Proximity>> {
        check(point, radius_miles)?;
        Ok(self.snapshot().nearest_within(point, radius_miles))
    }

    /// Indices (into the current snapshot) of the line features within the
    /// radius, ascending.
    pub fn features_near(&self, point: [f64; 2], radius_miles: f64) -> Result<Vec<usize>> {
        check(point, radius_miles)?;
        Ok(self.snapshot().features_near(point, radius_miles))
    }
}

fn check(point: [f64; 2], radius_miles: f64) -> Result<()> {
    validate_position(point[0], point[1])?;
    validate_radius(radius_miles)
}
