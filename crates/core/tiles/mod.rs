//! Tiled fetch pipeline: grid, budgeted selection, concurrent resolution,
//! and merge/filter of the fetched features.

pub mod filter;
pub mod grid;
pub mod orchestrator;
pub mod selection;
pub mod source;

pub use filter::{FeatureDeduper, feature_in_bbox, filter_to_bbox, merge_features};
pub use grid::{Tile, TileGrid, TileId};
pub use orchestrator::{TileBatch, TileFetchOrchestrator, TileOutcome, TileResult};
pub use selection::{QueryMode, select_tiles};
pub use source::{HttpOrigin, LocalDirSource, TileOrigin, TileSource};
