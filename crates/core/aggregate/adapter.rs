//! Per-source normalization into a common plant record.

use super::country::normalize_country;
use super::input::RawRecord;
use crate::error::{GridlineError, Result};
use serde::{Deserialize, Serialize};

const HOURS_PER_YEAR: f64 = 8_760.0;

/// A source record in the common schema, before validation and merging.
#[derive(Debug, Clone, PartialEq)]
pub struct PlantRecord {
    pub source: String,
    pub id: String,
    pub name: String,
    pub capacity_mw: f64,
    pub lon: f64,
    pub lat: f64,
    /// Normalized two-letter code where known
    pub country: String,
    /// Percent; `None` when unknown
    pub capacity_factor: Option<f64>,
    pub status: Option<String>,
    pub fuel: Option<String>,
    pub raw: RawRecord,
}

/// Normalizes one source's raw records.
///
/// New sources are supported by adding an adapter, not by branching on
/// which fields a record happens to carry.
pub trait SourceAdapter: Send + Sync {
    fn source_id(&self) -> &str;

    fn normalize(&self, record: &RawRecord) -> Result<PlantRecord>;
}

fn text<'a>(record: &'a RawRecord, field: &str) -> Option<&'a str> {
    record
        .get(field)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

fn required<'a>(record: &'a RawRecord, field: &str) -> Result<&'a str> {
    text(record, field)
        .ok_or_else(|| GridlineError::InvalidInput(format!("missing field '{}'", field)))
}

fn number(record: &RawRecord, field: &str) -> Result<f64> {
    let raw = required(record, field)?;
    raw.replace(',', "")
        .parse::<f64>()
        .map_err(|_| GridlineError::InvalidInput(format!("'{}' is not a number: {}", field, raw)))
}

fn optional_number(record: &RawRecord, field: &str) -> Option<f64> {
    text(record, field).and_then(|raw| raw.replace(',', "").parse::<f64>().ok())
}

/// Percent of nameplate output actually generated over a year.
fn capacity_factor_from_mwh(generation_mwh: f64, capacity_mw: f64) -> Option<f64> {
    (capacity_mw > 0.0).then(|| generation_mwh / (capacity_mw * HOURS_PER_YEAR) * 100.0)
}

/// World Resources Institute Global Power Plant Database rows.
///
/// Capacity factor comes from the most recent `generation_gwh_<year>`
/// column with a value.
#[derive(Debug, Clone, Default)]
pub struct GlobalPlantDatabaseAdapter;

impl GlobalPlantDatabaseAdapter {
    pub const SOURCE_ID: &'static str = "gppd";

    fn latest_generation_gwh(record: &RawRecord) -> Option<f64> {
        record
            .iter()
            .filter_map(|(key, _)| {
                let year = key.strip_prefix("generation_gwh_")?.parse::<u16>().ok()?;
                Some((year, optional_number(record, key)?))
            })
            .max_by_key(|(year, _)| *year)
            .map(|(_, gwh)| gwh)
    }
}

impl SourceAdapter for GlobalPlantDatabaseAdapter {
    fn source_id(&self) -> &str {
        Self::SOURCE_ID
    }

    fn normalize(&self, record: &RawRecord) -> Result<PlantRecord> {
        let capacity_mw = number(record, "capacity_mw")?;
        let capacity_factor = Self::latest_generation_gwh(record)
            .and_then(|gwh| capacity_factor_from_mwh(gwh * 1_000.0, capacity_mw));

        Ok(PlantRecord {
            source: Self::SOURCE_ID.to_string(),
            id: required(record, "gppd_idnr")?.to_string(),
            name: required(record, "name")?.to_string(),
            capacity_mw,
            lon: number(record, "longitude")?,
            lat: number(record, "latitude")?,
            country: normalize_country(required(record, "country")?),
            capacity_factor,
            status: None,
            fuel: text(record, "primary_fuel").map(str::to_string),
            raw: record.clone(),
        })
    }
}

/// US EIA-860/923 style rows. Country is always `US`.
#[derive(Debug, Clone, Default)]
pub struct EiaPlantAdapter;

impl EiaPlantAdapter {
    pub const SOURCE_ID: &'static str = "eia";
}

impl SourceAdapter for EiaPlantAdapter {
    fn source_id(&self) -> &str {
        Self::SOURCE_ID
    }

    fn normalize(&self, record: &RawRecord) -> Result<PlantRecord> {
        let capacity_mw = number(record, "nameplate_capacity_mw")?;
        let capacity_factor = optional_number(record, "net_generation_mwh")
            .and_then(|mwh| capacity_factor_from_mwh(mwh, capacity_mw));

        Ok(PlantRecord {
            source: Self::SOURCE_ID.to_string(),
            id: required(record, "plant_code")?.to_string(),
            name: required(record, "plant_name")?.to_string(),
            capacity_mw,
            lon: number(record, "longitude")?,
            lat: number(record, "latitude")?,
            country: "US".to_string(),
            capacity_factor,
            status: text(record, "status").map(str::to_string),
            fuel: text(record, "energy_source").map(str::to_string),
            raw: record.clone(),
        })
    }
}

/// Column names for a source without a dedicated adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldMapping {
    pub source_id: String,
    pub id: String,
    pub name: String,
    pub capacity_mw: String,
    pub lon: String,
    pub lat: String,
    #[serde(default)]
    pub country: Option<String>,
    /// Used when `country` is unset or empty in a record
    #[serde(default)]
    pub default_country: Option<String>,
    /// Column already expressed in percent
    #[serde(default)]
    pub capacity_factor: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub fuel: Option<String>,
}

/// Adapter driven by a [`FieldMapping`].
#[derive(Debug, Clone)]
pub struct MappedAdapter {
    mapping: FieldMapping,
}

impl MappedAdapter {
    pub fn new(mapping: FieldMapping) -> Self {
        Self { mapping }
    }
}

impl SourceAdapter for MappedAdapter {
    fn source_id(&self) -> &str {
        &self.mapping.source_id
    }

    fn normalize(&self, record: &RawRecord) -> Result<PlantRecord> {
        let m = &self.mapping;
        let column = |field: &Option<String>| field.as_deref().and_then(|f| text(record, f));

        let country = column(&m.country)
            .or(m.default_country.as_deref())
            .map(normalize_country)
            .ok_or_else(|| GridlineError::InvalidInput("missing country".to_string()))?;

        Ok(PlantRecord {
            source: m.source_id.clone(),
            id: required(record, &m.id)?.to_string(),
            name: required(record, &m.name)?.to_string(),
            capacity_mw: number(record, &m.capacity_mw)?,
            lon: number(record, &m.lon)?,
            lat: number(record, &m.lat)?,
            country,
            capacity_factor: m
                .capacity_factor
                .as_deref()
                .and_then(|f| optional_number(record, f)),
            status: column(&m.status).map(str::to_string),
            fuel: column(&m.fuel).map(str::to_string),
            raw: record.clone(),
        })
    }
}
