use std::fs;
use std::sync::Arc;
use std::thread;

use serde_json::json;
use tempfile::tempdir;

use super::*;
use crate::fixtures::{SAMPLE_VERSION, bundle_with_version, sample_bundle, sample_dataset, write_bundle};
use crate::model::{MeasureKind, PropagationType};
use crate::propagation::GroundKey;

fn bundle_from(value: serde_json::Value) -> EngineResult<Dataset> {
    let bundle: DatasetBundle = serde_json::from_value(value).unwrap();
    Dataset::from_bundle(bundle, "test".to_string())
}

fn rejection_reason(result: EngineResult<Dataset>) -> String {
    match result {
        Err(EngineError::BundleInvalid { reason, .. }) => reason,
        other => panic!("expected BundleInvalid, got {other:?}"),
    }
}

#[test]
fn sample_dataset_parses_every_known_table() {
    let dataset = sample_dataset();

    assert_eq!(dataset.version(), SAMPLE_VERSION);
    assert!(dataset.source_hash().starts_with("a1b2c3d4"));
    assert_eq!(dataset.categories().len(), 2);
    assert_eq!(dataset.scenarios().len(), 2);
    assert_eq!(dataset.plants().len(), 3);
    assert_eq!(dataset.measures().len(), 4);
    assert_eq!(dataset.background_levels().len(), 2);
    assert_eq!(dataset.propagation_table().len(), 12);
    assert_eq!(dataset.worked_examples().len(), 2);

    let excavation = dataset.scenario("excavation").unwrap();
    assert_eq!(excavation.propagation_type, PropagationType::Rural);
    assert_eq!(dataset.plant("truck").unwrap().duty_cycle, 1.0);
    assert_eq!(dataset.measures()[2].kind, MeasureKind::Additional);
    assert_eq!(
        dataset.propagation_table().nearest(50.0, GroundKey::Rural),
        Some((50, 64.0))
    );
    assert_eq!(dataset.background_level("U2", TimePeriod::Night), Some(45.0));
    assert_eq!(dataset.background_level("R1", TimePeriod::Night), None);
}

#[test]
fn lookups_report_the_missing_id() {
    let dataset = sample_dataset();

    let err = dataset.category("Z9").unwrap_err();
    assert!(matches!(
        &err,
        EngineError::NotFound { kind: EntityKind::NoiseCategory, id } if id == "Z9"
    ));
    assert!(err.to_string().contains("Z9"));

    assert!(matches!(
        dataset.scenario("piling"),
        Err(EngineError::NotFound { kind: EntityKind::Scenario, .. })
    ));
    assert!(matches!(
        dataset.plant("crane"),
        Err(EngineError::NotFound { kind: EntityKind::Plant, .. })
    ));
    assert!(matches!(
        dataset.get_table("vibration_limits"),
        Err(EngineError::NotFound { kind: EntityKind::Table, .. })
    ));
    assert!(dataset.get_table("plants").unwrap().is_array());
}

#[test]
fn unknown_tables_are_kept_verbatim() {
    let mut bundle = sample_bundle();
    bundle["tables"]["vibration_limits"] = json!([{ "receiver": "heritage", "ppv_mm_s": 3.0 }]);
    bundle["metadata"]["total_tables"] = json!(8);

    let dataset = bundle_from(bundle).unwrap();
    assert_eq!(
        dataset.get_table("vibration_limits").unwrap()[0]["ppv_mm_s"],
        json!(3.0)
    );
    assert!(dataset.validate().is_empty());
}

#[test]
fn load_rejects_duplicate_ids() {
    let mut bundle = sample_bundle();
    bundle["tables"]["plants"][1]["id"] = json!("excavator");

    let reason = rejection_reason(bundle_from(bundle));
    assert!(reason.contains("plants"));
    assert!(reason.contains("excavator"));
}

#[test]
fn load_rejects_empty_scenario_mapping() {
    let mut bundle = sample_bundle();
    bundle["tables"]["scenarios"][1]["sound_power_levels"] = json!({});

    assert!(rejection_reason(bundle_from(bundle)).contains("paving"));
}

#[test]
fn load_rejects_factors_outside_unit_interval() {
    for (field, value) in [("duty_cycle", 0.0), ("duty_cycle", 1.5), ("usage_factor", -0.2)] {
        let mut bundle = sample_bundle();
        bundle["tables"]["plants"][2][field] = json!(value);
        assert!(rejection_reason(bundle_from(bundle)).contains("breaker"));
    }
}

#[test]
fn load_rejects_unparseable_tables() {
    let mut bundle = sample_bundle();
    bundle["tables"]["scenarios"][0]["propagation_type"] = json!("underwater");
    assert!(rejection_reason(bundle_from(bundle)).contains("scenarios"));

    let mut bundle = sample_bundle();
    bundle["tables"]["concawe_attenuation"]["12.5"] = json!({ "rural": 70.0 });
    assert!(rejection_reason(bundle_from(bundle)).contains("concawe_attenuation"));
}

#[test]
fn validate_is_clean_for_complete_dataset() {
    assert_eq!(sample_dataset().validate(), Vec::<String>::new());
}

#[test]
fn validate_reports_completeness_gaps() {
    let mut bundle = sample_bundle();
    let tables = bundle["tables"].as_object_mut().unwrap();
    tables.remove("background_levels");
    tables["noise_categories"][0]["nml_values"]
        .as_object_mut()
        .unwrap()
        .remove("night");
    tables["scenarios"][0]["applicable_measures"] = json!(["standard_9"]);
    tables["concawe_attenuation"]["1000"]["urban"] = json!(44.0);

    let issues = bundle_from(bundle).unwrap().validate();
    let has = |needle: &str| issues.iter().any(|issue| issue.contains(needle));

    assert!(has("missing required table: background_levels"));
    assert!(has("declares 7 tables but bundle holds 6"));
    assert!(has("R1 has no night NML"));
    assert!(has("U2 has no evening background level"));
    assert!(has("unknown measure standard_9"));
    assert!(has("urban attenuation rises"));
}

#[test]
fn info_summarizes_dataset() {
    let info = sample_dataset().info();
    assert_eq!(info.version, SAMPLE_VERSION);
    assert_eq!(info.extraction_timestamp, "2025-03-14T09:30:00+00:00");
    assert_eq!(info.workbook_name.as_deref(), Some("construction-noise-estimator.xlsx"));
    assert_eq!(info.table_names.len(), 7);
    assert_eq!(info.content_hash.len(), 64);
    assert_eq!(info.propagation_rows, 12);
    assert!(info.validation_issues.is_empty());
}

#[test]
fn store_defaults_to_latest_version() {
    let dir = tempdir().unwrap();
    for version in ["2024.1", "2025.2", "2025.10"] {
        write_bundle(dir.path(), version, &bundle_with_version(version));
    }
    fs::create_dir_all(dir.path().join("2099-empty")).unwrap();

    let store = DatasetStore::open(dir.path());
    assert_eq!(store.list_versions().unwrap(), vec!["2024.1", "2025.10", "2025.2"]);
    assert_eq!(store.latest_version().unwrap(), "2025.2");
    assert_eq!(store.load(None).unwrap().version(), "2025.2");
    assert_eq!(store.load(Some("2024.1")).unwrap().version(), "2024.1");
}

#[test]
fn store_without_bundles_reports_missing_latest() {
    let dir = tempdir().unwrap();
    let store = DatasetStore::open(dir.path().join("absent"));

    assert!(store.list_versions().unwrap().is_empty());
    assert!(matches!(
        store.load(None),
        Err(EngineError::NotFound { kind: EntityKind::DatasetVersion, .. })
    ));
}

#[test]
fn store_caches_by_version_until_cleared() {
    let dir = tempdir().unwrap();
    write_bundle(dir.path(), SAMPLE_VERSION, &sample_bundle());
    let store = DatasetStore::open(dir.path());

    let first = store.load(Some(SAMPLE_VERSION)).unwrap();
    let second = store.load(None).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(store.cached_versions(), vec![SAMPLE_VERSION]);

    store.clear();
    assert!(store.cached_versions().is_empty());
    let reloaded = store.load(Some(SAMPLE_VERSION)).unwrap();
    assert!(!Arc::ptr_eq(&first, &reloaded));
    assert_eq!(first.content_hash(), reloaded.content_hash());
}

#[test]
fn store_rejects_unknown_and_malformed_versions() {
    let dir = tempdir().unwrap();
    write_bundle(dir.path(), SAMPLE_VERSION, &sample_bundle());
    let store = DatasetStore::open(dir.path());

    let err = store.load(Some("1999.1")).unwrap_err();
    assert!(matches!(
        &err,
        EngineError::NotFound { kind: EntityKind::DatasetVersion, id } if id == "1999.1"
    ));

    for version in ["../outside", ".hidden", "", "a/b"] {
        assert!(matches!(
            store.load(Some(version)),
            Err(EngineError::Validation { field: "dataset_version", .. })
        ));
    }
}

#[test]
fn store_rejects_bad_bundles_without_caching_them() {
    let dir = tempdir().unwrap();
    let store = DatasetStore::open(dir.path());

    let path = write_bundle(dir.path(), "broken", &sample_bundle());
    fs::write(&path, b"{ \"metadata\": ").unwrap();
    assert!(matches!(
        store.load(Some("broken")),
        Err(EngineError::BundleFormat { .. })
    ));

    write_bundle(dir.path(), "renamed", &bundle_with_version("original"));
    let reason = match store.load(Some("renamed")) {
        Err(EngineError::BundleInvalid { reason, .. }) => reason,
        other => panic!("expected BundleInvalid, got {other:?}"),
    };
    assert!(reason.contains("original"));

    assert!(store.cached_versions().is_empty());
}

#[test]
fn store_verifies_checksum_sidecar() {
    let dir = tempdir().unwrap();
    let path = write_bundle(dir.path(), SAMPLE_VERSION, &sample_bundle());
    let digest = sha256_hex(&fs::read(&path).unwrap());
    let sidecar = path.with_file_name(CHECKSUM_FILE);
    let store = DatasetStore::open(dir.path());

    fs::write(&sidecar, format!("{digest}  {BUNDLE_FILE}\n")).unwrap();
    let dataset = store.load(Some(SAMPLE_VERSION)).unwrap();
    assert_eq!(dataset.content_hash(), digest);

    store.clear();
    fs::write(&sidecar, "0".repeat(64)).unwrap();
    let reason = match store.load(Some(SAMPLE_VERSION)) {
        Err(EngineError::BundleInvalid { reason, .. }) => reason,
        other => panic!("expected BundleInvalid, got {other:?}"),
    };
    assert!(reason.contains("checksum mismatch"));
    assert!(store.cached_versions().is_empty());
}

#[test]
fn concurrent_loads_share_one_instance() {
    let dir = tempdir().unwrap();
    write_bundle(dir.path(), SAMPLE_VERSION, &sample_bundle());
    let store = DatasetStore::open(dir.path());

    let loaded: Vec<Arc<Dataset>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| store.load(Some(SAMPLE_VERSION)).unwrap()))
            .collect();
        handles.into_iter().map(|handle| handle.join().unwrap()).collect()
    });

    let cached = store.load(Some(SAMPLE_VERSION)).unwrap();
    assert!(loaded.iter().all(|dataset| Arc::ptr_eq(dataset, &cached)));
}

#[test]
fn version_labels_are_directory_safe() {
    assert!(is_valid_version(SAMPLE_VERSION));
    assert!(is_valid_version("2025.1-rc_2"));
    assert!(!is_valid_version("-2025"));
    assert!(!is_valid_version("2025 1"));
    assert!(!is_valid_version("..."));
}
