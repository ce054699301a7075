//! Gridline Server
//!
//! HTTP front end for the gridline tile pipeline, plant dataset and
//! proximity index.
//!
//! # Endpoints
//!
//! - `GET /fiber-bbox`: sampled GeoJSON for a bounding box
//! - `GET /fiber-bbox/stream`: the same features as NDJSON, one tile per line
//! - `GET /power-plants`: filtered, paginated plants
//! - `GET /health`: dataset and cache counters
//!
//! # Example
//!
//! ```ignore
//! use gridline_server::run_server;
//!
//! run_server(listener, Arc::new(gridline), shutdown).await?;
//! ```

pub mod handler;
pub mod protocol;
pub mod startup;
pub mod transport;

pub use handler::ApiError;
pub use protocol::{ErrorBody, HealthResponse};
pub use startup::{PlantSource, load_config, load_lines, load_plants};
pub use transport::{router, run_server};
