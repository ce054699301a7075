use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An aggregated power plant, merged from one or more source records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerPlant {
    pub id: String,
    pub name: String,
    /// Summed nameplate capacity in MW
    pub capacity_mw: f64,
    pub lon: f64,
    pub lat: f64,
    /// Two-letter country code
    pub country: String,
    /// Capacity-weighted capacity factor, percent
    #[serde(default)]
    pub capacity_factor: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub fuel: Option<String>,
    /// Identifiers of every contributing source, in first-seen order
    pub sources: Vec<String>,
    /// Unmodified fields of each contributing record, keyed by source
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub raw: BTreeMap<String, BTreeMap<String, String>>,
}

impl PowerPlant {
    /// Position as `[lon, lat]`.
    pub fn position(&self) -> [f64; 2] {
        [self.lon, self.lat]
    }
}
