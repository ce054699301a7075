//! HTTP request handlers

use crate::protocol::{ErrorBody, HealthResponse};
use axum::Json;
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{HeaderName, StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::StreamExt;
use gridline::{
    FiberParams, FiberQuery, Gridline, GridlineError, PlantPage, PlantParams, PlantQuery,
    TileSource,
};
use std::sync::Arc;
use thiserror::Error;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, instrument};

/// Reports whether `/fiber-bbox` was answered from the query cache.
pub const CACHE_HEADER: HeaderName = HeaderName::from_static("x-gridline-cache");

const NDJSON: &str = "application/x-ndjson";

/// A [`GridlineError`] rendered as an HTTP response.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ApiError(#[from] GridlineError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            e if e.is_client_error() => StatusCode::BAD_REQUEST,
            GridlineError::AllTilesFailed(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, status = status.as_u16(), "Request failed");
        } else {
            debug!(error = %self.0, "Rejected request");
        }
        let body = ErrorBody {
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[instrument(skip_all)]
pub async fn fiber_bbox<S: TileSource>(
    State(state): State<Arc<Gridline<S>>>,
    Query(params): Query<FiberParams>,
) -> Result<Response, ApiError> {
    let query = FiberQuery::from_params(&params)?;
    let payload = state.fibers().query(&query).await?;
    let stats = &payload.stats;

    let cache = match stats.cache {
        Some(tier) => {
            debug!(key = %query.cache_key(), ?tier, "Query cache hit");
            "hit"
        }
        None => {
            info!(
                mode = %query.mode,
                zoom = query.zoom,
                selected = stats.tiles_selected,
                candidates = stats.tiles_candidate,
                failed = stats.tiles_failed,
                returned = stats.features_returned,
                complete = stats.complete,
                "Served bbox query"
            );
            "miss"
        }
    };

    Ok((
        [
            (header::CONTENT_TYPE, "application/json"),
            (CACHE_HEADER, cache),
        ],
        payload.body,
    )
        .into_response())
}

#[instrument(skip_all)]
pub async fn fiber_bbox_stream<S: TileSource>(
    State(state): State<Arc<Gridline<S>>>,
    Query(params): Query<FiberParams>,
) -> Result<Response, ApiError> {
    let query = FiberQuery::from_params(&params)?;
    let batches = state.fibers().query_stream(&query)?;

    let lines = ReceiverStream::new(batches).map(|batch| {
        let mut line = serde_json::to_vec(&batch)?;
        line.push(b'\n');
        Ok::<_, serde_json::Error>(Bytes::from(line))
    });

    Ok(([(header::CONTENT_TYPE, NDJSON)], Body::from_stream(lines)).into_response())
}

#[instrument(skip_all)]
pub async fn power_plants<S: TileSource>(
    State(state): State<Arc<Gridline<S>>>,
    Query(params): Query<PlantParams>,
) -> Result<Json<PlantPage>, ApiError> {
    let query = PlantQuery::from_params(&params)?;
    let lines = query.near_lines.map(|_| state.proximity().snapshot());
    let page = state.plants().query(&query, lines.as_deref());
    debug!(
        total = page.page.total,
        returned = page.data.len(),
        "Served plant query"
    );
    Ok(Json(page))
}

pub async fn health<S: TileSource>(State(state): State<Arc<Gridline<S>>>) -> Json<HealthResponse> {
    let index = state.proximity().snapshot();
    Json(HealthResponse {
        status: "ok",
        version: gridline::VERSION,
        plants: state.plants().len(),
        line_features: index.feature_count(),
        index_version: state.proximity().version(),
        cache: state.cache().stats(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let status = |e: GridlineError| ApiError::from(e).status();
        assert_eq!(
            status(GridlineError::InvalidBoundingBox("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(GridlineError::InvalidInput("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(GridlineError::AllTilesFailed(3)),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status(GridlineError::Http("refused".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_error_body() {
        let response = ApiError::from(GridlineError::AllTilesFailed(2)).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.error, "all 2 tiles failed to load");
    }
}
