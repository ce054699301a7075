//! Multi-source power plant dataset aggregation.
//!
//! Raw records enter through [`raw_records_from_json`], are normalized by a
//! per-source [`SourceAdapter`], validated, and merged by fuzzy identity in
//! [`DatasetAggregator`].

mod adapter;
mod aggregator;
mod country;
mod input;

pub use adapter::{
    EiaPlantAdapter, FieldMapping, GlobalPlantDatabaseAdapter, MappedAdapter, PlantRecord,
    SourceAdapter,
};
pub use aggregator::{Aggregation, AggregationReport, DatasetAggregator, SourceInput};
pub use country::normalize_country;
pub use input::{RawRecord, raw_records_from_json};
