use chrono::{Duration, Utc};
use health_index::infra::CsvReadingStore;
use health_index::normalizer::Normalizer;
use health_index::parser::{FeedRecord, FeedValue, ValueKind, normalize_record, parse_feed};
use health_index::{
    CalculationMethod, Collaborators, EngineConfig, HealthIndexService, HealthLevel, VariantId,
};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

fn temp_root(name: &str) -> PathBuf {
    let root = env::temp_dir().join(format!("health_index_it_{name}_{}", std::process::id()));
    let _ = fs::remove_dir_all(&root);
    root
}

fn value(value: f64, kind: ValueKind, unit: Option<&str>) -> FeedValue {
    FeedValue {
        value,
        kind,
        unit: unit.map(str::to_string),
    }
}

fn record(station_id: &str, minutes_ago: i64, pollutants: &[(&str, FeedValue)]) -> FeedRecord {
    FeedRecord {
        station_id: station_id.to_string(),
        lat: 13.75,
        lon: 100.5,
        timestamp: Utc::now() - Duration::minutes(minutes_ago),
        pollutants: pollutants
            .iter()
            .map(|(code, v)| (code.to_string(), v.clone()))
            .collect::<BTreeMap<_, _>>(),
    }
}

/// Serializes records into a feed, parses it back, and ingests it.
fn ingest(root: &PathBuf, records: &[FeedRecord]) -> CsvReadingStore {
    let bytes = serde_json::to_vec(records).unwrap();
    let parsed = parse_feed(&bytes).expect("Failed to parse feed");
    let normalizer = Normalizer::new();
    let readings: Vec<_> = parsed.iter().map(|r| normalize_record(&normalizer, r)).collect();

    let store = CsvReadingStore::new(root);
    store.append_all(&readings).unwrap();
    store
}

fn service(store: CsvReadingStore) -> HealthIndexService {
    HealthIndexService::new(EngineConfig::default(), Collaborators::from_store(Arc::new(store)))
        .expect("default configuration is valid")
}

#[tokio::test]
async fn test_full_pipeline_thai_reference() {
    let root = temp_root("thai");
    let records: Vec<_> = (0..18)
        .map(|i| {
            record(
                "bkk-01",
                i * 10 + 1,
                &[
                    ("pm25", value(75.0, ValueKind::Concentration, Some("ug/m3"))),
                    ("o3", value(65.0, ValueKind::Concentration, Some("ppb"))),
                    ("no2", value(45.0, ValueKind::Concentration, None)),
                    ("h", value(70.0, ValueKind::Concentration, None)),
                ],
            )
        })
        .collect();
    let service = service(ingest(&root, &records));

    let result = service.get_or_compute("bkk-01", VariantId::Thai).await;

    assert_eq!(result.value, Some(7.0));
    assert_eq!(result.level, HealthLevel::High);
    assert_eq!(result.calculation_method, CalculationMethod::Aggregate);
    assert_eq!(result.sample_count, 18);
    assert!(result.missing_pollutants.is_empty());

    let canadian = service.get_or_compute("bkk-01", VariantId::Canadian).await;
    assert_eq!(canadian.value, Some(11.0));
    assert_eq!(canadian.level, HealthLevel::VeryHigh);

    fs::remove_dir_all(&root).unwrap();
}

#[tokio::test]
async fn test_canadian_with_only_pm25_reports_floor() {
    let root = temp_root("canadian_floor");
    let records = vec![record(
        "cnx-02",
        5,
        &[("pm25", value(5.0, ValueKind::Concentration, None))],
    )];
    let service = service(ingest(&root, &records));

    let result = service.get_or_compute("cnx-02", VariantId::Canadian).await;

    assert_eq!(result.value, Some(1.0));
    assert_eq!(result.level, HealthLevel::Low);
    assert_eq!(
        result.missing_pollutants.len(),
        2,
        "O3 and NO2 contribute zero terms"
    );

    fs::remove_dir_all(&root).unwrap();
}

#[tokio::test]
async fn test_index_values_are_converted_before_evaluation() {
    let root = temp_root("index");
    let records = vec![record("hdy-03", 2, &[("pm25", value(50.0, ValueKind::Index, None))])];
    let service = service(ingest(&root, &records));

    let result = service.get_or_compute("hdy-03", VariantId::Pm25Only).await;

    assert_eq!(result.value, Some(1.7));
    assert_eq!(result.level, HealthLevel::Low);

    fs::remove_dir_all(&root).unwrap();
}

#[tokio::test]
async fn test_old_readings_fall_back_to_current_path() {
    let root = temp_root("current");
    let records = vec![record(
        "old-04",
        6 * 60,
        &[("pm25", value(75.0, ValueKind::Concentration, None))],
    )];
    let service = service(ingest(&root, &records));

    let result = service.get_or_compute("old-04", VariantId::Pm25Only).await;

    assert_eq!(result.calculation_method, CalculationMethod::Current);
    assert_eq!(result.value, Some(14.7));

    fs::remove_dir_all(&root).unwrap();
}

#[tokio::test]
async fn test_unknown_station_yields_no_data() {
    let root = temp_root("unknown");
    let service = service(CsvReadingStore::new(&root));

    let results = service
        .get_or_compute_batch(&["ghost".to_string()], VariantId::Thai)
        .await;

    assert_eq!(results.len(), 1);
    assert!(results[0].is_no_data());
    assert_eq!(results[0].level, HealthLevel::NoData);
    assert!(results[0].note.is_some());
}
