//! Loading configuration and datasets named on the command line.

use anyhow::{Context, bail};
use gridline::aggregate::{
    EiaPlantAdapter, FieldMapping, GlobalPlantDatabaseAdapter, MappedAdapter, SourceAdapter,
    SourceInput, raw_records_from_json,
};
use gridline::{CacheManager, Config, ProximityIndex};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Read a JSON or TOML config file, chosen by extension.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => Config::from_toml(&text)?,
        Some("json") => Config::from_json(&text)?,
        _ => bail!(
            "unsupported config format {} (expected .json or .toml)",
            path.display()
        ),
    };
    Ok(config)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterKind {
    Gppd,
    Eia,
    /// A [`FieldMapping`] JSON file
    Mapping(PathBuf),
}

/// A `--plants <source>=<path>` argument.
///
/// `<source>` is `gppd`, `eia`, or the path of a field mapping ending in
/// `.json`. `<path>` holds a JSON array of records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlantSource {
    pub adapter: AdapterKind,
    pub path: PathBuf,
}

impl FromStr for PlantSource {
    type Err = String;

    fn from_str(arg: &str) -> Result<Self, Self::Err> {
        let (source, path) = arg
            .split_once('=')
            .ok_or_else(|| format!("expected <source>=<path>, got '{}'", arg))?;
        if path.is_empty() {
            return Err(format!("missing path for source '{}'", source));
        }
        let adapter = match source {
            "gppd" => AdapterKind::Gppd,
            "eia" => AdapterKind::Eia,
            s if s.ends_with(".json") => AdapterKind::Mapping(PathBuf::from(s)),
            other => {
                return Err(format!(
                    "unknown source '{}' (use gppd, eia or a mapping .json)",
                    other
                ));
            }
        };
        Ok(Self {
            adapter,
            path: PathBuf::from(path),
        })
    }
}

impl PlantSource {
    async fn adapter(&self) -> anyhow::Result<Arc<dyn SourceAdapter>> {
        Ok(match &self.adapter {
            AdapterKind::Gppd => Arc::new(GlobalPlantDatabaseAdapter),
            AdapterKind::Eia => Arc::new(EiaPlantAdapter),
            AdapterKind::Mapping(path) => {
                let text = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("reading field mapping {}", path.display()))?;
                let mapping: FieldMapping = serde_json::from_str(&text)
                    .with_context(|| format!("parsing field mapping {}", path.display()))?;
                Arc::new(MappedAdapter::new(mapping))
            }
        })
    }
}

/// Read every plant source into aggregator input.
pub async fn load_plants(sources: &[PlantSource]) -> anyhow::Result<Vec<SourceInput>> {
    let mut inputs = Vec::with_capacity(sources.len());
    for source in sources {
        let adapter = source.adapter().await?;
        let bytes = tokio::fs::read(&source.path)
            .await
            .with_context(|| format!("reading plant records {}", source.path.display()))?;
        let records = raw_records_from_json(&bytes)
            .with_context(|| format!("parsing plant records {}", source.path.display()))?;
        info!(
            source = adapter.source_id(),
            records = records.len(),
            "Loaded plant records"
        );
        inputs.push(SourceInput::new(adapter, records));
    }
    Ok(inputs)
}

/// Rebuild the proximity index from a GeoJSON file of lines.
pub async fn load_lines(index: &ProximityIndex, path: &Path) -> anyhow::Result<u64> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading lines {}", path.display()))?;
    let version = index
        .load_geojson(&bytes)
        .with_context(|| format!("indexing lines {}", path.display()))?;
    Ok(version)
}

/// Periodically drop expired memory-tier entries.
pub fn spawn_cache_maintenance(
    cache: Arc<CacheManager>,
    period: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = cache.cleanup_expired();
            if removed > 0 {
                debug!(removed, "Dropped expired cache entries");
            }
        }
    })
}
