//! Shared in-memory dataset for unit tests.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Value, json};

use crate::dataset::{BUNDLE_FILE, Dataset};

pub(crate) const SAMPLE_VERSION: &str = "20250314_093000_a1b2c3d4";

pub(crate) fn sample_bundle() -> Value {
    bundle_with_version(SAMPLE_VERSION)
}

pub(crate) fn bundle_with_version(version: &str) -> Value {
    json!({
        "metadata": {
            "version": version,
            "workbook_hash": "a1b2c3d4e5f60718293a4b5c6d7e8f90a1b2c3d4e5f60718293a4b5c6d7e8f90",
            "extraction_timestamp": "2025-03-14T09:30:00",
            "total_tables": 7,
            "workbook_name": "construction-noise-estimator.xlsx",
            "sheet_count": 9
        },
        "tables": {
            "noise_categories": [
                {
                    "id": "R1",
                    "name": "Rural residential",
                    "time_periods": { "day": 45.0, "evening": 40.0, "night": 35.0 },
                    "nml_values": { "day": 55.0, "evening": 45.0, "night": 40.0 }
                },
                {
                    "id": "U2",
                    "name": "Urban residential near arterial roads",
                    "description": "Evening and night backgrounds come from the background table",
                    "time_periods": { "day": 55.0 },
                    "nml_values": { "day": 65.0, "evening": 55.0, "night": 50.0 }
                }
            ],
            "scenarios": [
                {
                    "id": "excavation",
                    "name": "Bulk excavation",
                    "sound_power_levels": { "excavator": 105.0, "truck": 102.0 },
                    "propagation_type": "Rural",
                    "applicable_measures": ["standard_1", "additional_1"]
                },
                {
                    "id": "paving",
                    "name": "Road paving",
                    "sound_power_levels": { "paver": 103.0, "roller": 100.0, "truck": 102.0 },
                    "propagation_type": "urban",
                    "applicable_measures": ["standard_1", "standard_2"]
                }
            ],
            "plants": [
                { "id": "excavator", "name": "Excavator (20 t)", "sound_power_level": 105.0, "category": "earthworks" },
                { "id": "truck", "name": "Tipper truck", "sound_power_level": 102.0 },
                {
                    "id": "breaker",
                    "name": "Hydraulic breaker",
                    "sound_power_level": 110.0,
                    "category": "demolition",
                    "duty_cycle": 0.5,
                    "usage_factor": 1.0
                }
            ],
            "mitigation_measures": [
                {
                    "id": "standard_1",
                    "title": "Community notification",
                    "text": "Notify affected residents before works start.",
                    "type": "standard"
                },
                {
                    "id": "standard_2",
                    "title": "Out-of-hours scheduling",
                    "text": "Schedule the noisiest activities outside the evening and night periods.",
                    "type": "standard",
                    "trigger_conditions": { "time_period": ["evening", "night"] }
                },
                {
                    "id": "additional_1",
                    "title": "Respite periods",
                    "text": "Provide respite periods for highly affected receivers.",
                    "type": "additional",
                    "trigger_conditions": { "impact_band": "highly_affected" },
                    "reduction_db": 5.0
                },
                {
                    "id": "additional_2",
                    "title": "Temporary noise barrier",
                    "text": "Erect a temporary barrier between the works and receivers.",
                    "type": "additional",
                    "trigger_conditions": {
                        "impact_band": ["moderately_affected", "highly_affected"],
                        "propagation_type": "urban"
                    },
                    "reduction_db": 10.0
                }
            ],
            "background_levels": [
                { "category": "U2", "time_period": "evening", "level": 50.0 },
                { "category": "U2", "time_period": "night", "level": 45.0 }
            ],
            "concawe_attenuation": {
                "10": { "hard": 84.0, "urban": 82.0, "rural": 80.0 },
                "20": { "hard": 78.0, "urban": 75.5, "rural": 73.0 },
                "30": { "hard": 74.5, "urban": 71.5, "rural": 69.0 },
                "50": { "hard": 70.0, "urban": 66.5, "rural": 64.0 },
                "75": { "hard": 66.5, "urban": 62.5, "rural": 60.0 },
                "100": { "hard": 64.0, "urban": 60.0, "rural": 57.0 },
                "150": { "hard": 60.5, "urban": 56.0, "rural": 52.0 },
                "200": { "hard": 58.0, "urban": 53.0, "rural": 49.0 },
                "300": { "hard": 54.5, "urban": 49.0, "rural": 44.0 },
                "500": { "hard": 50.0, "urban": 43.5, "rural": 38.0 },
                "750": { "hard": 46.5, "urban": 39.0, "rural": 33.0 },
                "1000": { "hard": 44.0, "urban": 36.0, "rural": 29.0 }
            },
            "worked_examples": [
                {
                    "id": "we_excavation_full",
                    "description": "Bulk excavation 50 m from a rural receiver during the day",
                    "inputs": {
                        "assessment_type": "full_estimator",
                        "calculation_mode": "scenario",
                        "environment_approach": "representative_noise_environment",
                        "time_period": "day",
                        "propagation_type": "rural",
                        "noise_category_id": "R1",
                        "scenario_id": "excavation",
                        "receiver_distance": 50.0
                    },
                    "expected_outputs": {
                        "predicted_level_db": 60.8,
                        "background_db": 45.0,
                        "nml_db": 55.0,
                        "exceed_background_db": 15.8,
                        "exceed_nml_db": 5.8,
                        "impact_band": "highly_affected"
                    }
                },
                {
                    "id": "we_excavation_noisiest",
                    "inputs": {
                        "assessment_type": "distance_based",
                        "calculation_mode": "noisiest_plant",
                        "environment_approach": "representative",
                        "time_period": "day",
                        "propagation_type": "rural",
                        "noise_category_id": "R1",
                        "scenario_id": "excavation",
                        "receiver_distance": 50.0
                    },
                    "expected_outputs": {
                        "predicted_level_db": 59.0,
                        "exceed_nml_db": 4.0,
                        "impact_band": "moderately_affected"
                    }
                }
            ]
        }
    })
}

pub(crate) fn sample_dataset() -> Dataset {
    let bytes = serde_json::to_vec(&sample_bundle()).unwrap();
    Dataset::from_slice(&bytes, Path::new("fixture")).unwrap()
}

/// Writes `bundle` as `<root>/<version>/dataset.json`.
pub(crate) fn write_bundle(root: &Path, version: &str, bundle: &Value) -> PathBuf {
    let dir = root.join(version);
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(BUNDLE_FILE);
    fs::write(&path, serde_json::to_vec_pretty(bundle).unwrap()).unwrap();
    path
}
