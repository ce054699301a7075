//! Transport layer for the gridline server
//!
//! - `http` - axum router and server loop

pub mod http;

pub use http::{router, run_server};
