//! Service builder
//!
//! Wires the cache tiers, tile source and datasets into a [`Gridline`]
//! context that is constructed once at startup and shared by handlers.

use crate::config::{CacheConfig, Config};
use crate::error::{GridlineError, Result};
use crate::plants::PlantStore;
use crate::proximity::ProximityIndex;
use crate::service::FiberService;
use crate::storage::{
    CacheManager, DurableStore, FileStore, LargeDurableTier, MemoryStore, SmallDurableTier,
};
use crate::tiles::{TileOrigin, TileSource};
use std::path::PathBuf;
use std::sync::Arc;

/// Builder for a [`Gridline`] context.
#[derive(Debug, Default)]
pub struct GridlineBuilder {
    config: Config,
    cache_dir: Option<PathBuf>,
    origin_url: Option<String>,
    tiles_dir: Option<PathBuf>,
}

impl GridlineBuilder {
    /// Create a builder with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Keep the durable cache tiers under `dir` instead of in memory.
    pub fn cache_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Fetch tiles from a remote origin.
    pub fn origin_url(mut self, url: impl Into<String>) -> Self {
        self.origin_url = Some(url.into());
        self
    }

    /// Read tiles from a local directory when no origin URL is set.
    pub fn tiles_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.tiles_dir = Some(dir.into());
        self
    }

    /// The configuration with builder overrides applied.
    fn resolved_config(&self) -> Result<Config> {
        let mut config = self.config.clone();
        if let Some(url) = &self.origin_url {
            config.fetch.origin_url = Some(url.clone());
        }
        if let Some(dir) = &self.tiles_dir {
            config.fetch.local_dir = Some(dir.clone());
        }
        if let Some(dir) = &self.cache_dir {
            config.cache.dir = Some(dir.clone());
        }
        config.validate().map_err(GridlineError::Config)?;
        Ok(config)
    }

    /// Build with the configured tile origin.
    pub fn build(self) -> Result<Gridline<TileOrigin>> {
        let config = self.resolved_config()?;
        let origin = TileOrigin::from_config(&config.fetch)?;
        Gridline::assemble(config, origin)
    }

    /// Build around a caller-supplied tile source.
    pub fn build_with_source<S: TileSource>(self, source: S) -> Result<Gridline<S>> {
        let config = self.resolved_config()?;
        Gridline::assemble(config, source)
    }
}

fn open_cache(config: &CacheConfig) -> Result<CacheManager> {
    let (small, large): (Arc<dyn DurableStore>, Arc<dyn DurableStore>) = match &config.dir {
        Some(dir) => (
            Arc::new(FileStore::open_with_capacity(
                dir.join("small"),
                config.small_tier_capacity_bytes,
            )?),
            Arc::new(FileStore::open(dir.join("large"))?),
        ),
        None => (
            Arc::new(MemoryStore::with_capacity(config.small_tier_capacity_bytes)),
            Arc::new(MemoryStore::new()),
        ),
    };

    Ok(CacheManager::new(
        SmallDurableTier::new(
            small,
            config.chunk_threshold_bytes,
            config.compression_level,
            config.small_tier_ttl(),
        ),
        LargeDurableTier::new(large, config.large_tier_ttl()),
        config,
    ))
}

/// Everything a request handler needs.
pub struct Gridline<S = TileOrigin> {
    config: Config,
    cache: Arc<CacheManager>,
    fibers: FiberService<S>,
    plants: PlantStore,
    proximity: ProximityIndex,
}

impl<S: TileSource> Gridline<S> {
    fn assemble(config: Config, source: S) -> Result<Self> {
        let cache = Arc::new(open_cache(&config.cache)?);
        let fibers = FiberService::new(&config, Arc::new(source), Arc::clone(&cache))?;
        let plants = PlantStore::new(Arc::clone(&cache), config.cache.large_tier_ttl());
        let proximity = ProximityIndex::new(Arc::clone(&cache), config.cache.large_tier_ttl());

        // Datasets persisted by an earlier run
        plants.restore_from_cache();
        proximity.restore_from_cache();

        log::info!(
            "Gridline ready: tiles from {}, cache in {}",
            fibers.orchestrator().source().describe(),
            config
                .cache
                .dir
                .as_ref()
                .map(|d| d.display().to_string())
                .unwrap_or_else(|| "memory".to_string())
        );

        Ok(Self {
            config,
            cache,
            fibers,
            plants,
            proximity,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    pub fn fibers(&self) -> &FiberService<S> {
        &self.fibers
    }

    pub fn plants(&self) -> &PlantStore {
        &self.plants
    }

    pub fn proximity(&self) -> &ProximityIndex {
        &self.proximity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{EiaPlantAdapter, RawRecord, SourceInput};
    use gridline_types::Feature;

    #[test]
    fn test_builder_requires_tile_source() {
        let err = GridlineBuilder::new().build().err().unwrap();
        assert!(matches!(err, GridlineError::Config(_)));
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let mut config = Config::default();
        config.tiles.full_tile_budget = 0;
        let err = GridlineBuilder::new()
            .config(config)
            .tiles_dir("tiles")
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, GridlineError::Config(_)));
    }

    #[test]
    fn test_builder_prefers_origin_url() {
        let gridline = GridlineBuilder::new()
            .tiles_dir("tiles")
            .origin_url("http://127.0.0.1:9/tiles")
            .build()
            .unwrap();
        assert!(matches!(
            gridline.fibers().orchestrator().source(),
            TileOrigin::Remote(_)
        ));
    }

    #[test]
    fn test_datasets_survive_restart_with_cache_dir() {
        let dir = tempfile::tempdir().unwrap();
        let record: RawRecord = [
            ("plant_code", "3"),
            ("plant_name", "Barry"),
            ("nameplate_capacity_mw", "2000"),
            ("latitude", "31.0"),
            ("longitude", "-88.0"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        {
            let gridline = GridlineBuilder::new()
                .tiles_dir(dir.path().join("tiles"))
                .cache_dir(dir.path().join("cache"))
                .build()
                .unwrap();
            gridline
                .plants()
                .refresh(&[SourceInput::new(Arc::new(EiaPlantAdapter), vec![record])]);
            let lines = serde_json::to_vec(&gridline_types::FeatureCollection::new(vec![
                Feature::line(&[[-88.5, 31.0], [-87.5, 31.0]]),
            ]))
            .unwrap();
            gridline.proximity().load_geojson(&lines).unwrap();
        }

        let gridline = GridlineBuilder::new()
            .tiles_dir(dir.path().join("tiles"))
            .cache_dir(dir.path().join("cache"))
            .build()
            .unwrap();
        assert_eq!(gridline.plants().len(), 1);
        assert_eq!(gridline.proximity().version(), 1);
        assert!(gridline.proximity().is_near([-88.0, 31.0], 1.0).unwrap());
    }
}
