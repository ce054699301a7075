//! Concurrent tile resolution with per-tile timeouts.
//!
//! Every tile is resolved through the tile cache first. Uncached tiles are
//! fetched on their own spawned task, so a dropped request does not cancel
//! them and a successful fetch still warms the cache for the next caller.
//! A failing or slow tile degrades to an empty feature set; it never aborts
//! the rest of the batch.

use super::grid::Tile;
use super::source::TileSource;
use crate::error::GridlineError;
use crate::storage::CacheManager;
use futures::future::join_all;
use gridline_types::Feature;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// How a tile was resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TileOutcome {
    Cached,
    Fetched,
    /// The source has no such tile
    Missing,
    Failed(String),
    TimedOut,
}

impl TileOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TileOutcome::Cached => "cached",
            TileOutcome::Fetched => "fetched",
            TileOutcome::Missing => "missing",
            TileOutcome::Failed(_) => "failed",
            TileOutcome::TimedOut => "timeout",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, TileOutcome::Failed(_) | TileOutcome::TimedOut)
    }
}

/// One settled tile. Failed tiles carry an empty feature set.
#[derive(Debug, Clone)]
pub struct TileResult {
    pub tile: Tile,
    pub features: Arc<Vec<Feature>>,
    pub outcome: TileOutcome,
}

/// All tiles of one batch, in request order.
#[derive(Debug, Clone, Default)]
pub struct TileBatch {
    pub results: Vec<TileResult>,
}

impl TileBatch {
    /// True when the batch is non-empty and no tile produced data.
    pub fn all_failed(&self) -> bool {
        !self.results.is_empty() && self.results.iter().all(|r| r.outcome.is_failure())
    }

    pub fn any_failed(&self) -> bool {
        self.results.iter().any(|r| r.outcome.is_failure())
    }

    pub fn count(&self, pred: impl Fn(&TileOutcome) -> bool) -> usize {
        self.results.iter().filter(|r| pred(&r.outcome)).count()
    }

    pub fn feature_count(&self) -> usize {
        self.results.iter().map(|r| r.features.len()).sum()
    }
}

/// Fetches tiles from a [`TileSource`] through the shared cache.
pub struct TileFetchOrchestrator<S> {
    source: Arc<S>,
    cache: Arc<CacheManager>,
    tile_timeout: Duration,
    channel_capacity: usize,
}

impl<S> Clone for TileFetchOrchestrator<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            cache: Arc::clone(&self.cache),
            tile_timeout: self.tile_timeout,
            channel_capacity: self.channel_capacity,
        }
    }
}

impl<S: TileSource> TileFetchOrchestrator<S> {
    pub fn new(
        source: Arc<S>,
        cache: Arc<CacheManager>,
        tile_timeout: Duration,
        channel_capacity: usize,
    ) -> Self {
        Self {
            source,
            cache,
            tile_timeout,
            channel_capacity: channel_capacity.max(1),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Resolve every tile concurrently and wait for all of them to settle.
    pub async fn fetch_batch(&self, tiles: &[Tile]) -> TileBatch {
        let handles: Vec<_> = tiles
            .iter()
            .map(|tile| {
                let tile = *tile;
                let this = self.clone();
                tokio::spawn(async move { this.resolve(tile).await })
            })
            .collect();

        let results = join_all(handles)
            .await
            .into_iter()
            .zip(tiles)
            .map(|(joined, tile)| match joined {
                Ok(result) => result,
                Err(e) => {
                    log::warn!("Tile {} task failed: {}", tile, e);
                    TileResult {
                        tile: *tile,
                        features: Arc::new(Vec::new()),
                        outcome: TileOutcome::Failed(e.to_string()),
                    }
                }
            })
            .collect();

        TileBatch { results }
    }

    /// Resolve tiles concurrently, publishing each result as it settles.
    ///
    /// The channel closes once every tile has been published. Fetches keep
    /// running (and populating the cache) if the receiver is dropped.
    pub fn fetch_stream(&self, tiles: Vec<Tile>) -> mpsc::Receiver<TileResult> {
        let (tx, rx) = mpsc::channel(self.channel_capacity);

        for tile in tiles {
            let tx = tx.clone();
            let this = self.clone();
            tokio::spawn(async move {
                let result = this.resolve(tile).await;
                // A closed receiver only means nobody is listening any more
                let _ = tx.send(result).await;
            });
        }

        rx
    }

    async fn resolve(&self, tile: Tile) -> TileResult {
        let key = tile.cache_key();
        if let Some(features) = self.cache.get_tile(&key) {
            return TileResult {
                tile,
                features,
                outcome: TileOutcome::Cached,
            };
        }

        let (features, outcome) =
            match tokio::time::timeout(self.tile_timeout, self.source.fetch(&tile)).await {
                Ok(Ok(Some(features))) => {
                    let features = Arc::new(features);
                    self.cache.put_tile(&key, Arc::clone(&features));
                    (features, TileOutcome::Fetched)
                }
                Ok(Ok(None)) => {
                    let features = Arc::new(Vec::new());
                    self.cache.put_tile(&key, Arc::clone(&features));
                    (features, TileOutcome::Missing)
                }
                Ok(Err(e)) => {
                    log::warn!(
                        "Tile {} from {} failed: {}",
                        tile,
                        self.source.describe(),
                        e
                    );
                    (Arc::new(Vec::new()), TileOutcome::Failed(e.to_string()))
                }
                Err(_) => {
                    let e = GridlineError::Timeout(self.tile_timeout);
                    log::warn!("Tile {} from {}: {}", tile, self.source.describe(), e);
                    (Arc::new(Vec::new()), TileOutcome::TimedOut)
                }
            };

        TileResult {
            tile,
            features,
            outcome,
        }
    }
}
