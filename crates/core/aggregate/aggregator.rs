//! Merging normalized records from every source into one plant list.

use super::adapter::{PlantRecord, SourceAdapter};
use super::input::RawRecord;
use gridline_types::PowerPlant;
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Raw records of one source together with the adapter that reads them.
#[derive(Clone)]
pub struct SourceInput {
    pub adapter: Arc<dyn SourceAdapter>,
    pub records: Vec<RawRecord>,
}

impl SourceInput {
    pub fn new(adapter: Arc<dyn SourceAdapter>, records: Vec<RawRecord>) -> Self {
        Self { adapter, records }
    }
}

/// Counts from one aggregation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationReport {
    /// Records read across all sources
    pub ingested: usize,
    /// Records the adapter could not normalize
    pub malformed: usize,
    /// Normalized records rejected for coordinates or capacity
    pub dropped: usize,
    /// Records folded into a plant seen earlier
    pub merged: usize,
    /// Plants produced
    pub output: usize,
}

#[derive(Debug, Clone)]
pub struct Aggregation {
    pub plants: Vec<PowerPlant>,
    pub report: AggregationReport,
}

struct Accumulator {
    plant: PowerPlant,
    weighted_factor_sum: f64,
    factor_weight: f64,
}

impl Accumulator {
    fn new(record: PlantRecord) -> Self {
        let mut acc = Self {
            plant: PowerPlant {
                id: format!("{}:{}", record.source, record.id),
                name: record.name.clone(),
                capacity_mw: 0.0,
                lon: record.lon,
                lat: record.lat,
                country: record.country.clone(),
                capacity_factor: None,
                status: None,
                fuel: None,
                sources: Vec::new(),
                raw: BTreeMap::new(),
            },
            weighted_factor_sum: 0.0,
            factor_weight: 0.0,
        };
        acc.absorb(record);
        acc
    }

    fn absorb(&mut self, record: PlantRecord) {
        self.plant.capacity_mw += record.capacity_mw;
        if let Some(factor) = record.capacity_factor {
            self.weighted_factor_sum += factor * record.capacity_mw;
            self.factor_weight += record.capacity_mw;
        }
        if self.plant.status.is_none() {
            self.plant.status = record.status;
        }
        if self.plant.fuel.is_none() {
            self.plant.fuel = record.fuel;
        }
        if !self.plant.sources.contains(&record.source) {
            self.plant.sources.push(record.source.clone());
        }

        // Several records from one source keep distinct raw entries
        let mut raw_key = record.source.clone();
        let mut n = 2;
        while self.plant.raw.contains_key(&raw_key) {
            raw_key = format!("{}#{}", record.source, n);
            n += 1;
        }
        self.plant.raw.insert(raw_key, record.raw);
    }

    fn finish(mut self) -> PowerPlant {
        self.plant.capacity_factor =
            (self.factor_weight > 0.0).then(|| self.weighted_factor_sum / self.factor_weight);
        self.plant
    }
}

/// Merges plant records across sources by fuzzy identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct DatasetAggregator;

impl DatasetAggregator {
    /// Identity used for merging:
    /// `lowercase(name)|round4(lon)|round4(lat)|country`.
    pub fn identity_key(record: &PlantRecord) -> String {
        format!(
            "{}|{}|{}|{}",
            record.name.trim().to_lowercase(),
            round4(record.lon),
            round4(record.lat),
            record.country
        )
    }

    /// Validate a normalized record. Returns `None` for records that must be
    /// dropped; out-of-range capacity factors are cleared instead.
    fn validate(mut record: PlantRecord) -> Option<PlantRecord> {
        if !record.lon.is_finite()
            || !record.lat.is_finite()
            || !(-180.0..=180.0).contains(&record.lon)
            || !(-90.0..=90.0).contains(&record.lat)
        {
            return None;
        }
        if !record.capacity_mw.is_finite() || record.capacity_mw <= 0.0 {
            return None;
        }
        record.capacity_factor = record
            .capacity_factor
            .filter(|cf| cf.is_finite() && (0.0..=100.0).contains(cf));
        Some(record)
    }

    /// Normalize, validate and merge every record of every input.
    ///
    /// Output order is the order in which each plant was first seen. A
    /// record that fails to normalize is skipped, never fatal.
    pub fn aggregate(&self, inputs: &[SourceInput]) -> Aggregation {
        let mut report = AggregationReport::default();
        let mut index: FxHashMap<String, usize> = FxHashMap::default();
        let mut accumulators: Vec<Accumulator> = Vec::new();

        for input in inputs {
            let source = input.adapter.source_id();
            for raw in &input.records {
                report.ingested += 1;

                let record = match input.adapter.normalize(raw) {
                    Ok(record) => record,
                    Err(e) => {
                        log::debug!("Skipping {} record: {}", source, e);
                        report.malformed += 1;
                        continue;
                    }
                };
                let Some(record) = Self::validate(record) else {
                    report.dropped += 1;
                    continue;
                };

                let key = Self::identity_key(&record);
                match index.get(&key) {
                    Some(&idx) => {
                        accumulators[idx].absorb(record);
                        report.merged += 1;
                    }
                    None => {
                        index.insert(key, accumulators.len());
                        accumulators.push(Accumulator::new(record));
                    }
                }
            }
        }

        let plants: Vec<PowerPlant> = accumulators.into_iter().map(Accumulator::finish).collect();
        report.output = plants.len();

        log::info!(
            "Aggregated {} records into {} plants ({} merged, {} dropped, {} malformed)",
            report.ingested,
            report.output,
            report.merged,
            report.dropped,
            report.malformed
        );

        Aggregation { plants, report }
    }
}

/// Four-decimal rendering with negative zero folded into zero.
fn round4(value: f64) -> String {
    let rounded = (value * 1e4).round() / 1e4;
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    format!("{:.4}", rounded)
}
