//! Replay of the reference calculations shipped inside a dataset bundle.

use serde::{Deserialize, Serialize};

use crate::calculator::calculate_with;
use crate::dataset::Dataset;
use crate::model::{EstimationRequest, EstimationResult, ImpactBand};
use crate::policy::EnginePolicy;
use crate::util::now_utc_string;

pub const DEFAULT_TOLERANCE_DB: f64 = 0.2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkedExample {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    pub inputs: EstimationRequest,
    #[serde(default)]
    pub expected_outputs: ExpectedOutputs,
}

/// Values the example asserts. Absent fields are not checked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpectedOutputs {
    #[serde(default)]
    pub source_level_db: Option<f64>,
    #[serde(default)]
    pub predicted_level_db: Option<f64>,
    #[serde(default)]
    pub background_db: Option<f64>,
    #[serde(default)]
    pub nml_db: Option<f64>,
    #[serde(default)]
    pub exceed_background_db: Option<f64>,
    #[serde(default)]
    pub exceed_nml_db: Option<f64>,
    #[serde(default)]
    pub impact_band: Option<ImpactBand>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExampleOutcome {
    pub id: String,
    pub passed: bool,
    pub mismatches: Vec<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub generated_at: String,
    pub dataset_version: String,
    pub tolerance_db: f64,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub outcomes: Vec<ExampleOutcome>,
}

impl ReplayReport {
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// Runs every worked example of `dataset` and compares the reported values
/// against the expected ones within `tolerance_db`.
pub fn replay(dataset: &Dataset, policy: &EnginePolicy, tolerance_db: f64) -> ReplayReport {
    let outcomes: Vec<ExampleOutcome> = dataset
        .worked_examples()
        .iter()
        .map(|example| match calculate_with(dataset, &example.inputs, policy) {
            Ok(result) => {
                let mismatches = compare(&example.expected_outputs, &result, tolerance_db);
                ExampleOutcome {
                    id: example.id.clone(),
                    passed: mismatches.is_empty(),
                    mismatches,
                    error: None,
                }
            }
            Err(err) => ExampleOutcome {
                id: example.id.clone(),
                passed: false,
                mismatches: Vec::new(),
                error: Some(err.to_string()),
            },
        })
        .collect();

    let passed = outcomes.iter().filter(|outcome| outcome.passed).count();
    ReplayReport {
        generated_at: now_utc_string(),
        dataset_version: dataset.version().to_string(),
        tolerance_db,
        total: outcomes.len(),
        passed,
        failed: outcomes.len() - passed,
        outcomes,
    }
}

pub fn compare(
    expected: &ExpectedOutputs,
    result: &EstimationResult,
    tolerance_db: f64,
) -> Vec<String> {
    let mut mismatches = Vec::new();
    let levels = [
        ("source_level_db", expected.source_level_db, result.source_level_db),
        ("predicted_level_db", expected.predicted_level_db, result.predicted_level_db),
        ("background_db", expected.background_db, result.background_db),
        ("nml_db", expected.nml_db, result.nml_db),
        (
            "exceed_background_db",
            expected.exceed_background_db,
            result.exceed_background_db,
        ),
        ("exceed_nml_db", expected.exceed_nml_db, result.exceed_nml_db),
    ];
    for (field, expected, actual) in levels {
        if let Some(expected) = expected {
            // Small slack absorbs the binary representation of one-decimal values.
            if (actual - expected).abs() > tolerance_db + 1e-9 {
                mismatches.push(format!("{field}: expected {expected}, got {actual}"));
            }
        }
    }

    if let Some(band) = expected.impact_band {
        if band != result.impact_band {
            mismatches.push(format!(
                "impact_band: expected {}, got {}",
                band.as_str(),
                result.impact_band.as_str()
            ));
        }
    }
    mismatches
}
