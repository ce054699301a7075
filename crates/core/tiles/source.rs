//! Where tile payloads come from.

use super::grid::Tile;
use crate::compute::geojson::parse_feature_collection;
use crate::config::FetchConfig;
use crate::error::{GridlineError, Result};
use gridline_types::Feature;
use reqwest::StatusCode;
use std::future::Future;
use std::io::ErrorKind;
use std::path::PathBuf;

/// A provider of per-tile feature sets.
///
/// `Ok(None)` means the tile does not exist at the source, which is an empty
/// tile rather than an error.
pub trait TileSource: Send + Sync + 'static {
    fn fetch(&self, tile: &Tile) -> impl Future<Output = Result<Option<Vec<Feature>>>> + Send;

    /// Human-readable location, for logs
    fn describe(&self) -> String;
}

/// Remote tile origin serving `{base}/{tile}.geojson` over HTTP.
#[derive(Clone)]
pub struct HttpOrigin {
    client: reqwest::Client,
    base_url: String,
}

impl HttpOrigin {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("gridline/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn tile_url(&self, tile: &Tile) -> String {
        format!("{}/{}", self.base_url, tile.file_name())
    }
}

impl TileSource for HttpOrigin {
    async fn fetch(&self, tile: &Tile) -> Result<Option<Vec<Feature>>> {
        let url = self.tile_url(tile);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(GridlineError::Http(format!("{} returned {}", url, status)));
        }

        let body = response.bytes().await?;
        let parsed = parse_feature_collection(&body)?;
        if parsed.skipped > 0 {
            log::debug!("Tile {}: skipped {} malformed features", tile, parsed.skipped);
        }
        Ok(Some(parsed.features))
    }

    fn describe(&self) -> String {
        self.base_url.clone()
    }
}

/// Tile files in a local directory, for development without an origin.
#[derive(Debug, Clone)]
pub struct LocalDirSource {
    dir: PathBuf,
}

impl LocalDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl TileSource for LocalDirSource {
    async fn fetch(&self, tile: &Tile) -> Result<Option<Vec<Feature>>> {
        let path = self.dir.join(tile.file_name());
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let parsed = parse_feature_collection(&bytes)?;
        if parsed.skipped > 0 {
            log::debug!("Tile {}: skipped {} malformed features", tile, parsed.skipped);
        }
        Ok(Some(parsed.features))
    }

    fn describe(&self) -> String {
        self.dir.display().to_string()
    }
}

/// The configured tile source: the remote origin when a URL is set,
/// otherwise the local directory.
#[derive(Clone)]
pub enum TileOrigin {
    Remote(HttpOrigin),
    Local(LocalDirSource),
}

impl TileOrigin {
    pub fn from_config(config: &FetchConfig) -> Result<Self> {
        if let Some(url) = config.origin_url.as_deref() {
            return Ok(TileOrigin::Remote(HttpOrigin::new(url)?));
        }
        if let Some(dir) = config.local_dir.as_ref() {
            return Ok(TileOrigin::Local(LocalDirSource::new(dir)));
        }
        Err(GridlineError::Config(
            "No tile source configured: set fetch.origin_url or fetch.local_dir".to_string(),
        ))
    }
}

impl TileSource for TileOrigin {
    async fn fetch(&self, tile: &Tile) -> Result<Option<Vec<Feature>>> {
        match self {
            TileOrigin::Remote(origin) => origin.fetch(tile).await,
            TileOrigin::Local(local) => local.fetch(tile).await,
        }
    }

    fn describe(&self) -> String {
        match self {
            TileOrigin::Remote(origin) => format!("origin {}", origin.describe()),
            TileOrigin::Local(local) => format!("local directory {}", local.describe()),
        }
    }
}
