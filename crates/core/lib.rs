//! Tiled fetch, multi-tier caching and proximity indexing for infrastructure
//! map features.
//!
//! ## Features
//! - **Tile pipeline**: a fixed world grid, per-mode tile budgets, concurrent
//!   tile fetches with per-tile timeouts and partial-failure tolerance
//! - **Sampling**: deterministic, order-preserving caps on response size
//! - **Caching**: process memory, a compressed and chunked small durable tier,
//!   and a large durable tier behind one read-through [`CacheManager`]
//! - **Proximity**: an R-tree over line segments answering "is this point
//!   within N miles of a line?" with great-circle distances
//! - **Aggregation**: power plant records from several sources merged by fuzzy
//!   identity
//!
//! ## Cache expiry
//! Expiry is **lazy**:
//! - An entry older than its TTL reads as a miss
//! - Durable records stay on disk until overwritten or invalidated
//! - Memory entries can be dropped explicitly with `cleanup_expired()`
//!
//! ```rust
//! use gridline::compute::spatial::SpatialIndex;
//! use gridline::tiles::TileGrid;
//! use gridline_types::{BoundingBox, Feature};
//!
//! let grid = TileGrid::new(5.0)?;
//! let tiles = grid.tiles_for(&BoundingBox::new(-120.0, 20.0, -70.0, 50.0))?;
//! assert_eq!(tiles.len(), 60);
//! assert_eq!(tiles[0].name(), "m120_20");
//!
//! let index = SpatialIndex::build(vec![Feature::line(&[[-100.0, 40.0], [-99.0, 40.0]])]);
//! assert!(index.is_near([-99.5, 40.1], 10.0));
//! # Ok::<(), gridline::GridlineError>(())
//! ```

pub mod aggregate;
pub mod builder;
pub mod compute;
pub mod config;
pub mod error;
pub mod plants;
pub mod proximity;
pub mod sampling;
pub mod service;
pub mod storage;
pub mod tiles;

pub use builder::{Gridline, GridlineBuilder};
pub use config::Config;
pub use error::{GridlineError, Result};

pub use aggregate::{DatasetAggregator, SourceAdapter, SourceInput};
pub use plants::{PlantPage, PlantParams, PlantQuery, PlantStore};
pub use proximity::ProximityIndex;
pub use service::{FeatureBatch, FiberParams, FiberPayload, FiberQuery, FiberService, QueryStats};
pub use storage::{CacheManager, CacheStats, CacheTier, Durability};
pub use tiles::{QueryMode, Tile, TileGrid, TileOrigin, TileSource};

// Re-export validation and GeoJSON utilities
pub use compute::geojson;
pub use compute::validation;

pub use gridline_types::{BoundingBox, Feature, FeatureCollection, Geometry, PowerPlant};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod prelude {
    //! Commonly used types.
    //!
    //! ```rust
    //! use gridline::prelude::*;
    //!
    //! let query = FiberQuery::new(BoundingBox::new(0.0, 0.0, 10.0, 10.0), QueryMode::Overview, 3);
    //! assert!(query.cache_key().ends_with(":overview:z3"));
    //! ```

    pub use crate::{
        BoundingBox, CacheManager, Config, Feature, FiberQuery, FiberService, Gridline,
        GridlineBuilder, GridlineError, PlantQuery, PowerPlant, ProximityIndex, QueryMode,
        Result, TileGrid, TileSource,
    };

    pub use crate::compute::spatial::SpatialIndex;
    pub use std::time::Duration;
}
