use axum::Router;
use axum::body::Body;
use axum::extract::Path;
use axum::http::{Request, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use gridline::aggregate::{EiaPlantAdapter, SourceInput, raw_records_from_json};
use gridline::{FeatureCollection, Gridline, GridlineBuilder};
use gridline_server::{ErrorBody, router};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

/// Tile `0_0` has two lines, one inside (0,0)-(4,4); `5_0` always fails;
/// every other tile is absent.
async fn tile(Path(name): Path<String>) -> axum::response::Response {
    match name.as_str() {
        "0_0.geojson" => axum::Json(json!({
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "id": "a",
                 "geometry": {"type": "LineString", "coordinates": [[1.0, 1.0], [2.0, 2.0]]},
                 "properties": {"name": "Metro Loop", "type": "fiber"}},
                {"type": "Feature", "id": "b",
                 "geometry": {"type": "LineString", "coordinates": [[4.5, 4.5], [4.9, 4.9]]},
                 "properties": {"name": "Edge Spur"}}
            ]
        }))
        .into_response(),
        "5_0.geojson" => StatusCode::SERVICE_UNAVAILABLE.into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn spawn_origin() -> String {
    let origin = Router::new().route("/tiles/:name", get(tile));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, origin).await.unwrap();
    });
    format!("http://{}/tiles", addr)
}

async fn app() -> (Router, Arc<Gridline>) {
    let gridline = Arc::new(
        GridlineBuilder::new()
            .origin_url(spawn_origin().await)
            .build()
            .unwrap(),
    );
    (router(Arc::clone(&gridline)), gridline)
}

async fn get_uri(app: &Router, uri: &str) -> (StatusCode, header::HeaderMap, Vec<u8>) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, body.to_vec())
}

#[tokio::test]
async fn test_fiber_bbox_fetches_and_caches() {
    let (app, _) = app().await;
    let uri = "/fiber-bbox?minLon=0&minLat=0&maxLon=4&maxLat=4&zoom=8";

    let (status, headers, body) = get_uri(&app, uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "application/json");
    assert_eq!(headers["x-gridline-cache"], "miss");

    let collection: FeatureCollection = serde_json::from_slice(&body).unwrap();
    assert_eq!(collection.len(), 1);
    assert_eq!(
        collection.features[0].properties.name.as_deref(),
        Some("Metro Loop")
    );

    let (status, headers, cached) = get_uri(&app, uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["x-gridline-cache"], "hit");
    assert_eq!(cached, body);
}

#[tokio::test]
async fn test_fiber_bbox_rejects_bad_input() {
    let (app, _) = app().await;

    for uri in [
        "/fiber-bbox?minLon=0&minLat=0&maxLon=4",
        "/fiber-bbox?minLon=abc&minLat=0&maxLon=4&maxLat=4",
        "/fiber-bbox?minLon=4&minLat=0&maxLon=0&maxLat=4",
        "/fiber-bbox?minLon=0&minLat=0&maxLon=4&maxLat=4&overview=maybe",
    ] {
        let (status, _, body) = get_uri(&app, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        let error: ErrorBody = serde_json::from_slice(&body).unwrap();
        assert!(!error.error.is_empty());
    }
}

#[tokio::test]
async fn test_fiber_bbox_partial_and_total_failure() {
    let (app, gridline) = app().await;

    // 0_0 loads, 5_0 fails: partial data is served but not cached
    let uri = "/fiber-bbox?minLon=0&minLat=0&maxLon=6&maxLat=3";
    let (status, headers, body) = get_uri(&app, uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["x-gridline-cache"], "miss");
    assert_eq!(
        serde_json::from_slice::<FeatureCollection>(&body)
            .unwrap()
            .len(),
        1
    );
    let (_, headers, _) = get_uri(&app, uri).await;
    assert_eq!(headers["x-gridline-cache"], "miss");

    // Only the failing tile
    let (status, _, body) =
        get_uri(&app, "/fiber-bbox?minLon=5.5&minLat=0.5&maxLon=6&maxLat=1").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let error: ErrorBody = serde_json::from_slice(&body).unwrap();
    assert_eq!(error.error, "all 1 tiles failed to load");

    assert!(gridline.cache().stats().misses >= 3);
}

#[tokio::test]
async fn test_fiber_bbox_stream() {
    let (app, _) = app().await;

    let (status, headers, body) =
        get_uri(&app, "/fiber-bbox/stream?minLon=0&minLat=0&maxLon=6&maxLat=3").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "application/x-ndjson");

    let batches: Vec<Value> = String::from_utf8(body)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(batches.len(), 2);
    assert!(batches.iter().all(|b| b["totalTiles"] == 2));

    let ok = batches.iter().find(|b| b["tile"] == "0_0").unwrap();
    assert_eq!(ok["status"], "fetched");
    assert_eq!(ok["features"].as_array().unwrap().len(), 1);

    let failed = batches.iter().find(|b| b["tile"] == "5_0").unwrap();
    assert_eq!(failed["status"], "failed");
    assert!(failed["features"].as_array().unwrap().is_empty());

    let mut sequences: Vec<u64> = batches
        .iter()
        .map(|b| b["sequence"].as_u64().unwrap())
        .collect();
    sequences.sort();
    assert_eq!(sequences, vec![0, 1]);
}

#[tokio::test]
async fn test_power_plants_and_health() {
    let (app, gridline) = app().await;
    let records = raw_records_from_json(
        br#"[
            {"plant_code": "3", "plant_name": "Barry", "nameplate_capacity_mw": 2000,
             "latitude": 31.0069, "longitude": -88.0103, "status": "OP"},
            {"plant_code": "8", "plant_name": "Gorgas", "nameplate_capacity_mw": 1000,
             "latitude": 33.6443, "longitude": -87.2002, "status": "RE"}
        ]"#,
    )
    .unwrap();
    gridline
        .plants()
        .refresh(&[SourceInput::new(Arc::new(EiaPlantAdapter), records)]);
    let lines = serde_json::to_vec(&FeatureCollection::new(vec![gridline::Feature::line(&[
        [-88.5, 31.0],
        [-87.5, 31.0],
    ])]))
    .unwrap();
    gridline.proximity().load_geojson(&lines).unwrap();

    let (status, _, body) = get_uri(&app, "/power-plants?statuses=op,re&limit=1").await;
    assert_eq!(status, StatusCode::OK);
    let page: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(page["page"]["total"], 2);
    assert_eq!(page["page"]["hasMore"], true);
    assert_eq!(page["data"][0]["name"], "Barry");

    let (_, _, body) = get_uri(&app, "/power-plants?nearLines=5").await;
    let page: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(page["page"]["total"], 1);

    let (status, _, body) = get_uri(&app, "/power-plants?bbox=1,2,3&minCapacity=10").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: ErrorBody = serde_json::from_slice(&body).unwrap();
    assert!(error.error.contains("bounding box"), "{}", error.error);

    let (status, _, body) = get_uri(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    let health: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["plants"], 2);
    assert_eq!(health["lineFeatures"], 1);
    assert_eq!(health["indexVersion"], 1);
    assert!(health["cache"]["memoryEntries"].is_number());
}
