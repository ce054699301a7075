//! The bounding-box query pipeline behind `/fiber-bbox`.
//!
//! grid → tile selection → concurrent fetch → merge → bbox filter → sample →
//! serialize → query cache.

use crate::compute::geojson::to_feature_collection_bytes;
use crate::compute::validation::{parse_finite, parse_optional_f64, validate_bbox};
use crate::config::{Config, SamplingConfig, TileConfig};
use crate::error::{GridlineError, Result};
use crate::sampling::{max_features, sample_features};
use crate::storage::{CacheManager, CacheTier, Durability};
use crate::tiles::{
    FeatureDeduper, QueryMode, Tile, TileFetchOrchestrator, TileGrid, TileOutcome, TileSource,
    feature_in_bbox, filter_to_bbox, merge_features, select_tiles,
};
use bytes::Bytes;
use gridline_types::{BoundingBox, Feature};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub const DEFAULT_ZOOM: u8 = 5;
pub const MAX_ZOOM: u8 = 22;

/// Raw `/fiber-bbox` query parameters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FiberParams {
    pub min_lon: Option<String>,
    pub min_lat: Option<String>,
    pub max_lon: Option<String>,
    pub max_lat: Option<String>,
    pub overview: Option<String>,
    pub zoom: Option<String>,
}

/// A validated bounding-box query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FiberQuery {
    pub bbox: BoundingBox,
    pub mode: QueryMode,
    pub zoom: u8,
}

impl FiberQuery {
    pub fn new(bbox: BoundingBox, mode: QueryMode, zoom: u8) -> Self {
        Self { bbox, mode, zoom }
    }

    /// Validate raw parameters. Nothing is fetched for an invalid query.
    pub fn from_params(params: &FiberParams) -> Result<Self> {
        let bbox = validate_bbox(
            parse_finite("minLon", params.min_lon.as_deref())?,
            parse_finite("minLat", params.min_lat.as_deref())?,
            parse_finite("maxLon", params.max_lon.as_deref())?,
            parse_finite("maxLat", params.max_lat.as_deref())?,
        )?;

        let mode = match params.overview.as_deref().map(str::trim) {
            None | Some("") | Some("0") | Some("false") => QueryMode::Full,
            Some("1") | Some("true") => QueryMode::Overview,
            Some(other) => {
                return Err(GridlineError::InvalidInput(format!(
                    "'overview' must be 0 or 1, got {}",
                    other
                )));
            }
        };

        let zoom = match parse_optional_f64("zoom", params.zoom.as_deref())? {
            None => DEFAULT_ZOOM,
            Some(z) => {
                let z = z.floor();
                if !(0.0..=MAX_ZOOM as f64).contains(&z) {
                    return Err(GridlineError::InvalidInput(format!(
                        "'zoom' must be between 0 and {}, got {}",
                        MAX_ZOOM, z
                    )));
                }
                z as u8
            }
        };

        Ok(Self { bbox, mode, zoom })
    }

    /// Cache key for the full query.
    ///
    /// ```
    /// use gridline::service::FiberQuery;
    /// use gridline::tiles::QueryMode;
    /// use gridline_types::BoundingBox;
    ///
    /// let query = FiberQuery::new(BoundingBox::new(-120.0, 20.0, -70.0, 50.0), QueryMode::Full, 5);
    /// assert_eq!(
    ///     query.cache_key(),
    ///     "fiber:-120.000000,20.000000,-70.000000,50.000000:full:z5"
    /// );
    /// ```
    pub fn cache_key(&self) -> String {
        format!(
            "fiber:{:.6},{:.6},{:.6},{:.6}:{}:z{}",
            self.bbox.min_lon(),
            self.bbox.min_lat(),
            self.bbox.max_lon(),
            self.bbox.max_lat(),
            self.mode,
            self.zoom
        )
    }
}

/// What happened while answering a query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryStats {
    /// Set when the whole payload came from the query cache
    pub cache: Option<CacheTier>,
    pub tiles_candidate: usize,
    pub tiles_selected: usize,
    pub tiles_cached: usize,
    pub tiles_fetched: usize,
    pub tiles_missing: usize,
    pub tiles_failed: usize,
    pub features_merged: usize,
    pub features_in_bbox: usize,
    pub features_returned: usize,
    /// False when a tile failed and the payload is partial
    pub complete: bool,
}

/// A serialized `FeatureCollection` ready to send.
#[derive(Debug, Clone)]
pub struct FiberPayload {
    pub body: Bytes,
    pub stats: QueryStats,
}

/// Features of one settled tile, published progressively.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureBatch {
    pub tile: String,
    pub status: &'static str,
    pub features: Vec<Feature>,
    /// Zero-based publication order
    pub sequence: usize,
    pub total_tiles: usize,
}

/// Tiles chosen for a query.
#[derive(Debug, Clone)]
pub struct TilePlan {
    /// Tiles covering the box before the budget was applied
    pub candidates: usize,
    pub selected: Vec<Tile>,
}

pub struct FiberService<S> {
    grid: TileGrid,
    tiles: TileConfig,
    sampling: SamplingConfig,
    orchestrator: TileFetchOrchestrator<S>,
    cache: Arc<CacheManager>,
    query_ttl: Duration,
    channel_capacity: usize,
}

impl<S: TileSource> FiberService<S> {
    pub fn new(config: &Config, source: Arc<S>, cache: Arc<CacheManager>) -> Result<Self> {
        let orchestrator = TileFetchOrchestrator::new(
            source,
            Arc::clone(&cache),
            config.fetch.tile_timeout(),
            config.fetch.stream_channel_capacity,
        );
        Ok(Self {
            grid: TileGrid::new(config.tiles.tile_size_deg)?,
            tiles: config.tiles.clone(),
            sampling: config.sampling.clone(),
            orchestrator,
            cache,
            query_ttl: config.cache.query_ttl(),
            channel_capacity: config.fetch.stream_channel_capacity.max(1),
        })
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    pub fn orchestrator(&self) -> &TileFetchOrchestrator<S> {
        &self.orchestrator
    }

    /// Cover the query box with tiles and apply the mode's tile budget.
    pub fn plan(&self, query: &FiberQuery) -> Result<TilePlan> {
        let tiles = self.grid.tiles_for(&query.bbox)?;
        let candidates = tiles.len();
        let budget = query.mode.tile_budget(&self.tiles);
        Ok(TilePlan {
            candidates,
            selected: select_tiles(tiles, query.mode, budget, &query.bbox),
        })
    }

    /// Answer a query, from the query cache when possible.
    ///
    /// Fails with [`GridlineError::AllTilesFailed`] only when every selected
    /// tile failed. A result with some failed tiles is returned but not
    /// cached, so the next request retries them.
    pub async fn query(&self, query: &FiberQuery) -> Result<FiberPayload> {
        let key = query.cache_key();
        if let Some(hit) = self.cache.get(&key) {
            log::debug!("Query cache hit for {} ({:?} tier)", key, hit.tier);
            return Ok(FiberPayload {
                body: hit.value,
                stats: QueryStats {
                    cache: Some(hit.tier),
                    complete: true,
                    ..Default::default()
                },
            });
        }

        let plan = self.plan(query)?;
        let batch = self.orchestrator.fetch_batch(&plan.selected).await;
        if batch.all_failed() {
            return Err(GridlineError::AllTilesFailed(batch.results.len()));
        }

        let merged = merge_features(batch.results.iter().map(|r| r.features.as_slice()));
        let features_merged = merged.len();
        let in_bbox = filter_to_bbox(merged, &query.bbox);
        let features_in_bbox = in_bbox.len();
        let sampled = sample_features(in_bbox, max_features(query.mode, query.zoom, &self.sampling));
        let features_returned = sampled.len();

        let body = Bytes::from(to_feature_collection_bytes(sampled)?);
        let complete = !batch.any_failed();
        if complete {
            self.cache
                .set(&key, body.clone(), self.query_ttl, Durability::Standard);
        } else {
            log::info!("Partial result for {} is not cached", key);
        }

        Ok(FiberPayload {
            body,
            stats: QueryStats {
                cache: None,
                tiles_candidate: plan.candidates,
                tiles_selected: plan.selected.len(),
                tiles_cached: batch.count(|o| *o == TileOutcome::Cached),
                tiles_fetched: batch.count(|o| *o == TileOutcome::Fetched),
                tiles_missing: batch.count(|o| *o == TileOutcome::Missing),
                tiles_failed: batch.count(TileOutcome::is_failure),
                features_merged,
                features_in_bbox,
                features_returned,
                complete,
            },
        })
    }

    /// Deliver a query tile by tile as fetches settle.
    ///
    /// Each tile's features are bbox-filtered, deduplicated against earlier
    /// batches and capped at `ceil(M / selected)` where `M` is the query's
    /// feature cap. The channel closes after the last tile. Dropping the
    /// receiver stops publication but not the underlying fetches.
    pub fn query_stream(&self, query: &FiberQuery) -> Result<mpsc::Receiver<FeatureBatch>> {
        let plan = self.plan(query)?;
        let total_tiles = plan.selected.len();
        let per_tile = max_features(query.mode, query.zoom, &self.sampling)
            .div_ceil(total_tiles.max(1));

        let mut results = self.orchestrator.fetch_stream(plan.selected);
        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let bbox = query.bbox;

        tokio::spawn(async move {
            let mut dedupe = FeatureDeduper::new();
            let mut sequence = 0;
            while let Some(result) = results.recv().await {
                let features: Vec<Feature> = result
                    .features
                    .iter()
                    .filter(|f| feature_in_bbox(f, &bbox) && dedupe.admit(f))
                    .cloned()
                    .collect();
                let batch = FeatureBatch {
                    tile: result.tile.name(),
                    status: result.outcome.as_str(),
                    features: sample_features(features, per_tile),
                    sequence,
                    total_tiles,
                };
                sequence += 1;
                if tx.send(batch).await.is_err() {
                    log::debug!("Stream receiver dropped after {} tiles", sequence);
                    break;
                }
            }
        });

        Ok(rx)
    }
}
