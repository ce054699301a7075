use gridline::aggregate::{
    DatasetAggregator, EiaPlantAdapter, FieldMapping, GlobalPlantDatabaseAdapter, MappedAdapter,
    SourceInput, raw_records_from_json,
};
use gridline::plants::{PlantParams, PlantQuery, PlantStore};
use gridline::{Config, GridlineBuilder};
use std::sync::Arc;

const GPPD: &[u8] = br#"[
    {"gppd_idnr": "USA0001", "name": "Hoover Dam", "capacity_mw": 100,
     "latitude": 36.01561, "longitude": -114.73782, "country": "USA",
     "primary_fuel": "Hydro", "generation_gwh_2019": 700.8},
    {"gppd_idnr": "DEU0001", "name": "J\u00e4nschwalde", "capacity_mw": "3000",
     "latitude": 51.8353, "longitude": 14.4575, "country": "DEU", "primary_fuel": "Coal"},
    {"gppd_idnr": "BAD0001", "name": "Nowhere", "capacity_mw": 10,
     "latitude": "north", "longitude": 0, "country": "USA"},
    {"gppd_idnr": "ZERO001", "name": "Mothballed", "capacity_mw": 0,
     "latitude": 10, "longitude": 10, "country": "USA"}
]"#;

const EIA: &[u8] = br#"[
    {"plant_code": "154", "plant_name": "hoover dam", "nameplate_capacity_mw": 50,
     "latitude": 36.01558, "longitude": -114.73779, "net_generation_mwh": 175200,
     "status": "OP", "energy_source": "WAT"},
    {"plant_code": "3", "plant_name": "Barry", "nameplate_capacity_mw": 2000,
     "latitude": 31.0069, "longitude": -88.0103, "status": "OP"}
]"#;

fn inputs() -> Vec<SourceInput> {
    vec![
        SourceInput::new(
            Arc::new(GlobalPlantDatabaseAdapter),
            raw_records_from_json(GPPD).unwrap(),
        ),
        SourceInput::new(Arc::new(EiaPlantAdapter), raw_records_from_json(EIA).unwrap()),
    ]
}

#[test]
fn test_cross_source_merge() {
    let result = DatasetAggregator.aggregate(&inputs());

    assert_eq!(result.report.ingested, 6);
    assert_eq!(result.report.malformed, 1);
    assert_eq!(result.report.dropped, 1);
    assert_eq!(result.report.merged, 1);
    assert_eq!(result.report.output, 3);

    let hoover = &result.plants[0];
    assert_eq!(hoover.id, "gppd:USA0001");
    assert_eq!(hoover.capacity_mw, 150.0);
    assert_eq!(hoover.sources, vec!["gppd", "eia"]);
    assert_eq!(hoover.country, "US");
    // 700.8 GWh on 100 MW is 80%; 175200 MWh on 50 MW is 40%
    let cf = hoover.capacity_factor.unwrap();
    assert!((cf - (100.0 * 80.0 + 50.0 * 40.0) / 150.0).abs() < 1e-9);
    assert_eq!(hoover.status.as_deref(), Some("OP"));
    assert_eq!(hoover.raw.len(), 2);

    assert_eq!(result.plants[1].country, "DE");
    assert_eq!(result.plants[1].capacity_factor, None);
    assert_eq!(result.plants[2].name, "Barry");
}

#[test]
fn test_mapped_source_joins_merge() {
    let mapping: FieldMapping = serde_json::from_str(
        r#"{"source_id": "ercot", "id": "unit", "name": "plant", "capacity_mw": "mw",
            "lon": "x", "lat": "y", "default_country": "US", "capacity_factor": "cf"}"#,
    )
    .unwrap();
    let ercot = raw_records_from_json(
        br#"[{"unit": "B-1", "plant": "BARRY", "mw": 500, "x": -88.0103, "y": 31.0069, "cf": 120}]"#,
    )
    .unwrap();

    let mut all = inputs();
    all.push(SourceInput::new(Arc::new(MappedAdapter::new(mapping)), ercot));
    let result = DatasetAggregator.aggregate(&all);

    let barry = result.plants.iter().find(|p| p.name == "Barry").unwrap();
    assert_eq!(barry.capacity_mw, 2500.0);
    // An out-of-range factor is cleared, not averaged
    assert_eq!(barry.capacity_factor, None);
    assert_eq!(barry.sources, vec!["eia", "ercot"]);
}

#[test]
fn test_aggregated_dataset_queries() {
    let gridline = GridlineBuilder::new()
        .config(Config::default().with_local_dir("unused"))
        .build()
        .unwrap();
    let store: &PlantStore = gridline.plants();
    store.refresh(&inputs());

    let params: PlantParams = serde_json::from_value(serde_json::json!({
        "countries": "USA",
        "minCapacity": "100",
        "limit": "1"
    }))
    .unwrap();
    let page = store.query(&PlantQuery::from_params(&params).unwrap(), None);
    assert_eq!(page.page.total, 2);
    assert_eq!(page.data.len(), 1);
    assert!(page.page.has_more);

    let body = serde_json::to_value(&page).unwrap();
    assert_eq!(body["page"]["hasMore"], true);
    assert_eq!(body["data"][0]["capacityMw"], 150.0);
}
