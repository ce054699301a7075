//! Response bodies shared by the HTTP handlers.

use gridline::CacheStats;
use serde::{Deserialize, Serialize};

/// Body of every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// Plants in the current dataset
    pub plants: usize,
    /// Line features in the proximity index
    pub line_features: usize,
    /// Bumped on every proximity index rebuild
    pub index_version: u64,
    pub cache: CacheStats,
}
