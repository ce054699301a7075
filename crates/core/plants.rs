//! The aggregated power plant dataset and its filtered, paginated queries.

use crate::aggregate::{AggregationReport, DatasetAggregator, SourceInput, normalize_country};
use crate::compute::spatial::SpatialIndex;
use crate::compute::validation::{parse_list, parse_optional_f64, validate_radius};
use crate::error::{GridlineError, Result};
use crate::storage::{CacheManager, Durability};
use gridline_types::{BoundingBox, PowerPlant};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub const PLANTS_CACHE_KEY: &str = "plants:dataset";

pub const DEFAULT_LIMIT: usize = 1_000;
pub const MAX_LIMIT: usize = 10_000;

/// Raw `/power-plants` query parameters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlantParams {
    pub bbox: Option<String>,
    pub sources: Option<String>,
    pub countries: Option<String>,
    pub statuses: Option<String>,
    pub min_capacity: Option<String>,
    pub max_capacity: Option<String>,
    pub min_capacity_factor: Option<String>,
    pub max_capacity_factor: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
    pub near_lines: Option<String>,
}

/// A validated plant query.
#[derive(Debug, Clone, PartialEq)]
pub struct PlantQuery {
    pub bbox: Option<BoundingBox>,
    /// Lowercased source identifiers
    pub sources: Vec<String>,
    /// Normalized two-letter codes
    pub countries: Vec<String>,
    /// Lowercased statuses
    pub statuses: Vec<String>,
    pub min_capacity: Option<f64>,
    pub max_capacity: Option<f64>,
    pub min_capacity_factor: Option<f64>,
    pub max_capacity_factor: Option<f64>,
    pub limit: usize,
    pub offset: usize,
    /// Keep only plants within this many miles of an indexed line
    pub near_lines: Option<f64>,
}

impl Default for PlantQuery {
    fn default() -> Self {
        Self {
            bbox: None,
            sources: Vec::new(),
            countries: Vec::new(),
            statuses: Vec::new(),
            min_capacity: None,
            max_capacity: None,
            min_capacity_factor: None,
            max_capacity_factor: None,
            limit: DEFAULT_LIMIT,
            offset: 0,
            near_lines: None,
        }
    }
}

/// Parse a pagination number: floored, then clamped to `[min, max]`.
fn parse_page_number(
    name: &str,
    value: Option<&str>,
    default: usize,
    min: f64,
    max: f64,
) -> Result<usize> {
    Ok(match parse_optional_f64(name, value)? {
        Some(v) => v.floor().clamp(min, max) as usize,
        None => default,
    })
}

fn check_range(name: &str, min: Option<f64>, max: Option<f64>) -> Result<()> {
    if let (Some(lo), Some(hi)) = (min, max)
        && lo > hi
    {
        return Err(GridlineError::InvalidInput(format!(
            "min{} ({}) is greater than max{} ({})",
            name, lo, name, hi
        )));
    }
    Ok(())
}

impl PlantQuery {
    /// Validate raw parameters.
    ///
    /// An invalid `bbox` is always reported as
    /// [`GridlineError::InvalidBoundingBox`], whatever the other filters say.
    ///
    /// ```
    /// use gridline::plants::{PlantParams, PlantQuery};
    ///
    /// let params = PlantParams {
    ///     bbox: Some("-10,35,30,60".to_string()),
    ///     limit: Some("50000".to_string()),
    ///     offset: Some("-3.7".to_string()),
    ///     ..Default::default()
    /// };
    /// let query = PlantQuery::from_params(&params).unwrap();
    /// assert_eq!(query.limit, 10_000);
    /// assert_eq!(query.offset, 0);
    /// ```
    pub fn from_params(params: &PlantParams) -> Result<Self> {
        let bbox = match params.bbox.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Some(BoundingBox::parse_geographic(raw)?),
            _ => None,
        };

        let min_capacity = parse_optional_f64("minCapacity", params.min_capacity.as_deref())?;
        let max_capacity = parse_optional_f64("maxCapacity", params.max_capacity.as_deref())?;
        check_range("Capacity", min_capacity, max_capacity)?;

        let min_capacity_factor =
            parse_optional_f64("minCapacityFactor", params.min_capacity_factor.as_deref())?;
        let max_capacity_factor =
            parse_optional_f64("maxCapacityFactor", params.max_capacity_factor.as_deref())?;
        check_range("CapacityFactor", min_capacity_factor, max_capacity_factor)?;

        let near_lines = parse_optional_f64("nearLines", params.near_lines.as_deref())?;
        if let Some(radius) = near_lines {
            validate_radius(radius)?;
        }

        Ok(Self {
            bbox,
            sources: parse_list(params.sources.as_deref())
                .into_iter()
                .map(|s| s.to_lowercase())
                .collect(),
            countries: parse_list(params.countries.as_deref())
                .iter()
                .map(|c| normalize_country(c))
                .collect(),
            statuses: parse_list(params.statuses.as_deref())
                .into_iter()
                .map(|s| s.to_lowercase())
                .collect(),
            min_capacity,
            max_capacity,
            min_capacity_factor,
            max_capacity_factor,
            limit: parse_page_number(
                "limit",
                params.limit.as_deref(),
                DEFAULT_LIMIT,
                1.0,
                MAX_LIMIT as f64,
            )?,
            offset: parse_page_number(
                "offset",
                params.offset.as_deref(),
                0,
                0.0,
                usize::MAX as f64,
            )?,
            near_lines,
        })
    }

    /// Attribute filters; proximity is applied separately.
    pub fn matches(&self, plant: &PowerPlant) -> bool {
        if let Some(bbox) = &self.bbox
            && !bbox.contains(plant.lon, plant.lat)
        {
            return false;
        }
        if !self.sources.is_empty()
            && !plant
                .sources
                .iter()
                .any(|s| self.sources.contains(&s.to_lowercase()))
        {
            return false;
        }
        if !self.countries.is_empty() && !self.countries.contains(&plant.country) {
            return false;
        }
        if !self.statuses.is_empty() {
            let status = plant.status.as_deref().map(str::to_lowercase);
            if !status.is_some_and(|s| self.statuses.contains(&s)) {
                return false;
            }
        }
        if self.min_capacity.is_some_and(|min| plant.capacity_mw < min)
            || self.max_capacity.is_some_and(|max| plant.capacity_mw > max)
        {
            return false;
        }
        // A plant with an unknown capacity factor fails any factor bound
        if self.min_capacity_factor.is_some() || self.max_capacity_factor.is_some() {
            let Some(cf) = plant.capacity_factor else {
                return false;
            };
            if self.min_capacity_factor.is_some_and(|min| cf < min)
                || self.max_capacity_factor.is_some_and(|max| cf > max)
            {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub limit: usize,
    pub offset: usize,
    pub total: usize,
    pub has_more: bool,
}

/// One page of matching plants.
#[derive(Debug, Clone, Serialize)]
pub struct PlantPage {
    pub data: Vec<PowerPlant>,
    pub page: PageInfo,
}

/// The current plant dataset. Refreshes replace it wholesale.
pub struct PlantStore {
    plants: RwLock<Arc<Vec<PowerPlant>>>,
    cache: Arc<CacheManager>,
    ttl: Duration,
}

impl PlantStore {
    pub fn new(cache: Arc<CacheManager>, ttl: Duration) -> Self {
        Self {
            plants: RwLock::new(Arc::new(Vec::new())),
            cache,
            ttl,
        }
    }

    /// Aggregate every source and swap in the result.
    ///
    /// The dataset is also written to the cache; a failed write is logged by
    /// the cache and does not fail the refresh.
    pub fn refresh(&self, inputs: &[SourceInput]) -> AggregationReport {
        let aggregation = DatasetAggregator.aggregate(inputs);
        if !self
            .cache
            .set_json(PLANTS_CACHE_KEY, &aggregation.plants, self.ttl, Durability::Standard)
        {
            log::warn!("Plant dataset was not cached");
        }
        self.replace(aggregation.plants);
        aggregation.report
    }

    /// Load the last cached dataset. Returns the number of plants restored,
    /// or `None` when nothing usable was cached.
    pub fn restore_from_cache(&self) -> Option<usize> {
        let plants: Vec<PowerPlant> = self.cache.get_json(PLANTS_CACHE_KEY)?;
        let count = plants.len();
        self.replace(plants);
        log::info!("Restored {} plants from cache", count);
        Some(count)
    }

    pub fn replace(&self, plants: Vec<PowerPlant>) {
        *self.plants.write() = Arc::new(plants);
    }

    pub fn snapshot(&self) -> Arc<Vec<PowerPlant>> {
        Arc::clone(&self.plants.read())
    }

    pub fn len(&self) -> usize {
        self.plants.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Filter and paginate the dataset.
    ///
    /// With `near_lines` set, a plant is kept only if `lines` has a segment
    /// within the radius; without an index nothing is near.
    pub fn query(&self, query: &PlantQuery, lines: Option<&SpatialIndex>) -> PlantPage {
        let plants = self.snapshot();
        let near = |plant: &PowerPlant| match (query.near_lines, lines) {
            (None, _) => true,
            (Some(radius), Some(index)) => index.is_near(plant.position(), radius),
            (Some(_), None) => false,
        };

        let matching: Vec<&PowerPlant> = plants
            .iter()
            .filter(|p| query.matches(p) && near(p))
            .collect();

        let total = matching.len();
        let data: Vec<PowerPlant> = matching
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .cloned()
            .collect();
        let has_more = query.offset.saturating_add(data.len()) < total;

        PlantPage {
            data,
            page: PageInfo {
                limit: query.limit,
                offset: query.offset,
                total,
                has_more,
            },
        }
    }
}
