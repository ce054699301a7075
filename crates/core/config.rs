//! Configuration for the gridline service.
//!
//! Every section deserializes with defaults, so an empty document (`{}`) is a
//! valid configuration apart from the tile origin, which the builder checks.
use crate::tiles::grid::MIN_TILE_SIZE_DEG;
use serde::de::Error;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub tiles: TileConfig,

    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub sampling: SamplingConfig,

    #[serde(default)]
    pub cache: CacheConfig,
}

/// Grid geometry and per-mode tile budgets
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TileConfig {
    /// Edge length of a grid cell in degrees
    #[serde(default = "TileConfig::default_tile_size")]
    pub tile_size_deg: f64,

    #[serde(default = "TileConfig::default_overview_budget")]
    pub overview_tile_budget: usize,

    #[serde(default = "TileConfig::default_full_budget")]
    pub full_tile_budget: usize,
}

impl TileConfig {
    const fn default_tile_size() -> f64 {
        5.0
    }

    const fn default_overview_budget() -> usize {
        20
    }

    const fn default_full_budget() -> usize {
        50
    }
}

impl Default for TileConfig {
    fn default() -> Self {
        Self {
            tile_size_deg: Self::default_tile_size(),
            overview_tile_budget: Self::default_overview_budget(),
            full_tile_budget: Self::default_full_budget(),
        }
    }
}

/// Where tiles come from and how long to wait for them
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FetchConfig {
    /// Base URL of the tile origin. Takes precedence over `local_dir`.
    #[serde(default)]
    pub origin_url: Option<String>,

    /// Directory of tile files, used only when no origin URL is set
    #[serde(default)]
    pub local_dir: Option<PathBuf>,

    #[serde(default = "FetchConfig::default_tile_timeout_ms")]
    pub tile_timeout_ms: u64,

    /// Capacity of the channel used for progressive delivery
    #[serde(default = "FetchConfig::default_stream_channel_capacity")]
    pub stream_channel_capacity: usize,
}

impl FetchConfig {
    const fn default_tile_timeout_ms() -> u64 {
        60_000
    }

    const fn default_stream_channel_capacity() -> usize {
        16
    }

    pub fn tile_timeout(&self) -> Duration {
        Duration::from_millis(self.tile_timeout_ms)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            origin_url: None,
            local_dir: None,
            tile_timeout_ms: Self::default_tile_timeout_ms(),
            stream_channel_capacity: Self::default_stream_channel_capacity(),
        }
    }
}

/// Response size caps
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SamplingConfig {
    #[serde(default = "SamplingConfig::default_max_overview")]
    pub max_features_overview: usize,

    #[serde(default = "SamplingConfig::default_max_full")]
    pub max_features_full: usize,

    /// Zoom level from which `max_features_full_high_zoom` applies
    #[serde(default = "SamplingConfig::default_high_zoom_threshold")]
    pub high_zoom_threshold: u8,

    #[serde(default = "SamplingConfig::default_max_full_high_zoom")]
    pub max_features_full_high_zoom: usize,
}

impl SamplingConfig {
    const fn default_max_overview() -> usize {
        5_000
    }

    const fn default_max_full() -> usize {
        20_000
    }

    const fn default_high_zoom_threshold() -> u8 {
        8
    }

    const fn default_max_full_high_zoom() -> usize {
        10_000
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            max_features_overview: Self::default_max_overview(),
            max_features_full: Self::default_max_full(),
            high_zoom_threshold: Self::default_high_zoom_threshold(),
            max_features_full_high_zoom: Self::default_max_full_high_zoom(),
        }
    }
}

/// Cache tier sizing and lifetimes
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// TTL of assembled query responses
    #[serde(default = "CacheConfig::default_query_ttl_secs")]
    pub query_ttl_secs: u64,

    /// TTL of raw per-tile feature sets
    #[serde(default = "CacheConfig::default_tile_ttl_secs")]
    pub tile_ttl_secs: u64,

    #[serde(default = "CacheConfig::default_small_tier_ttl_secs")]
    pub small_tier_ttl_secs: u64,

    #[serde(default = "CacheConfig::default_large_tier_ttl_secs")]
    pub large_tier_ttl_secs: u64,

    #[serde(default = "CacheConfig::default_small_tier_capacity")]
    pub small_tier_capacity_bytes: u64,

    /// Compressed payloads above this size are stored in chunks
    #[serde(default = "CacheConfig::default_chunk_threshold")]
    pub chunk_threshold_bytes: usize,

    #[serde(default = "CacheConfig::default_compression_level")]
    pub compression_level: u32,

    /// Root directory of the durable tiers; in-memory stores when unset
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl CacheConfig {
    const fn default_query_ttl_secs() -> u64 {
        600
    }

    const fn default_tile_ttl_secs() -> u64 {
        3_600
    }

    const fn default_small_tier_ttl_secs() -> u64 {
        86_400
    }

    const fn default_large_tier_ttl_secs() -> u64 {
        14 * 86_400
    }

    const fn default_small_tier_capacity() -> u64 {
        5 * 1024 * 1024
    }

    const fn default_chunk_threshold() -> usize {
        1024 * 1024
    }

    const fn default_compression_level() -> u32 {
        6
    }

    pub fn query_ttl(&self) -> Duration {
        Duration::from_secs(self.query_ttl_secs)
    }

    pub fn tile_ttl(&self) -> Duration {
        Duration::from_secs(self.tile_ttl_secs)
    }

    pub fn small_tier_ttl(&self) -> Duration {
        Duration::from_secs(self.small_tier_ttl_secs)
    }

    pub fn large_tier_ttl(&self) -> Duration {
        Duration::from_secs(self.large_tier_ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            query_ttl_secs: Self::default_query_ttl_secs(),
            tile_ttl_secs: Self::default_tile_ttl_secs(),
            small_tier_ttl_secs: Self::default_small_tier_ttl_secs(),
            large_tier_ttl_secs: Self::default_large_tier_ttl_secs(),
            small_tier_capacity_bytes: Self::default_small_tier_capacity(),
            chunk_threshold_bytes: Self::default_chunk_threshold(),
            compression_level: Self::default_compression_level(),
            dir: None,
        }
    }
}

impl Config {
    pub fn with_origin_url(mut self, url: impl Into<String>) -> Self {
        self.fetch.origin_url = Some(url.into());
        self
    }

    pub fn with_local_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fetch.local_dir = Some(dir.into());
        self
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache.dir = Some(dir.into());
        self
    }

    pub fn with_tile_size(mut self, degrees: f64) -> Self {
        assert!(
            degrees.is_finite() && degrees >= MIN_TILE_SIZE_DEG,
            "Tile size must be at least 1e-6 degrees"
        );
        self.tiles.tile_size_deg = degrees;
        self
    }

    pub fn with_tile_timeout(mut self, timeout: Duration) -> Self {
        self.fetch.tile_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_sampling(mut self, sampling: SamplingConfig) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        let tile_size = self.tiles.tile_size_deg;
        if !tile_size.is_finite() || tile_size < MIN_TILE_SIZE_DEG {
            return Err(format!(
                "Tile size must be at least {} degrees, got {}",
                MIN_TILE_SIZE_DEG, tile_size
            ));
        }

        if self.tiles.overview_tile_budget == 0 || self.tiles.full_tile_budget == 0 {
            return Err("Tile budgets must be greater than zero".to_string());
        }

        if self.fetch.tile_timeout_ms == 0 {
            return Err("Tile timeout must be greater than zero".to_string());
        }

        if self.fetch.stream_channel_capacity == 0 {
            return Err("Stream channel capacity must be greater than zero".to_string());
        }

        if self.cache.chunk_threshold_bytes == 0 {
            return Err("Chunk threshold must be greater than zero".to_string());
        }

        if self.cache.chunk_threshold_bytes as u64 > self.cache.small_tier_capacity_bytes {
            return Err(format!(
                "Chunk threshold ({}) exceeds small tier capacity ({})",
                self.cache.chunk_threshold_bytes, self.cache.small_tier_capacity_bytes
            ));
        }

        if self.cache.compression_level > 9 {
            return Err(format!(
                "Compression level must be 0-9, got {}",
                self.cache.compression_level
            ));
        }

        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let config: Config = serde_json::from_str(json)?;
        if let Err(e) = config.validate() {
            return Err(Error::custom(e));
        }
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    #[cfg(feature = "toml")]
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        let config: Config = toml::from_str(toml_str)?;
        if let Err(e) = config.validate() {
            return Err(toml::de::Error::custom(e));
        }
        Ok(config)
    }

    #[cfg(feature = "toml")]
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
