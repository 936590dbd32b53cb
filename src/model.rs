use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::trace::CalculationTrace;
use crate::util::deserialize_utc_timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentType {
    DistanceBased,
    FullEstimator,
}

impl AssessmentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DistanceBased => "distance_based",
            Self::FullEstimator => "full_estimator",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculationMode {
    Scenario,
    IndividualPlant,
    NoisiestPlant,
}

impl CalculationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scenario => "scenario",
            Self::IndividualPlant => "individual_plant",
            Self::NoisiestPlant => "noisiest_plant",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnvironmentApproach {
    #[serde(rename = "representative_noise_environment", alias = "representative")]
    Representative,
    #[serde(rename = "user_supplied_background_level", alias = "user_supplied")]
    UserSupplied,
}

impl EnvironmentApproach {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Representative => "representative_noise_environment",
            Self::UserSupplied => "user_supplied_background_level",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimePeriod {
    Day,
    Evening,
    Night,
    DayEvening,
    EveningNight,
    DayEveningNight,
}

impl TimePeriod {
    pub const BASE_PERIODS: [TimePeriod; 3] = [Self::Day, Self::Evening, Self::Night];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Evening => "evening",
            Self::Night => "night",
            Self::DayEvening => "day_evening",
            Self::EveningNight => "evening_night",
            Self::DayEveningNight => "day_evening_night",
        }
    }
}

/// Terrain or built-environment class between source and receiver.
///
/// The workbook labels are accepted as aliases so bundles extracted straight
/// from the sheet deserialize without a mapping pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropagationType {
    #[serde(alias = "Rural")]
    Rural,
    #[serde(alias = "Developed settlements (urban and suburban areas)")]
    Urban,
    #[serde(alias = "Water")]
    HardGround,
    SoftGround,
    Mixed,
}

impl PropagationType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rural => "rural",
            Self::Urban => "urban",
            Self::HardGround => "hard_ground",
            Self::SoftGround => "soft_ground",
            Self::Mixed => "mixed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactBand {
    NotAffected,
    ModeratelyAffected,
    HighlyAffected,
}

impl ImpactBand {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotAffected => "not_affected",
            Self::ModeratelyAffected => "moderately_affected",
            Self::HighlyAffected => "highly_affected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasureKind {
    Standard,
    Additional,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub version: String,
    #[serde(alias = "workbook_hash")]
    pub source_hash: String,
    #[serde(deserialize_with = "deserialize_utc_timestamp")]
    pub extraction_timestamp: DateTime<Utc>,
    pub total_tables: usize,
    #[serde(default)]
    pub workbook_name: Option<String>,
    #[serde(default)]
    pub sheet_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseCategory {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Representative background level per time period.
    #[serde(default)]
    pub time_periods: BTreeMap<TimePeriod, f64>,
    #[serde(default)]
    pub nml_values: BTreeMap<TimePeriod, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub sound_power_levels: BTreeMap<String, f64>,
    pub propagation_type: PropagationType,
    #[serde(default)]
    pub applicable_measures: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plant {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub sound_power_level: f64,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "unit_factor")]
    pub duty_cycle: f64,
    #[serde(default = "unit_factor")]
    pub usage_factor: f64,
}

fn unit_factor() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MitigationMeasure {
    pub id: String,
    pub title: String,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: MeasureKind,
    #[serde(default, deserialize_with = "deserialize_trigger_conditions")]
    pub trigger_conditions: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub reduction_db: Option<f64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AllowedValues {
    One(String),
    Many(Vec<String>),
}

fn deserialize_trigger_conditions<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<String, Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, AllowedValues>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(key, allowed)| {
            let values = match allowed {
                AllowedValues::One(value) => vec![value],
                AllowedValues::Many(values) => values,
            };
            (key, values)
        })
        .collect())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundLevel {
    pub category: String,
    pub time_period: TimePeriod,
    pub level: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimationRequest {
    pub assessment_type: AssessmentType,
    pub calculation_mode: CalculationMode,
    pub environment_approach: EnvironmentApproach,
    pub time_period: TimePeriod,
    pub propagation_type: PropagationType,
    pub noise_category_id: String,
    #[serde(default)]
    pub scenario_id: Option<String>,
    #[serde(default)]
    pub plant_ids: Option<Vec<String>>,
    /// Receiver distance for the full estimator, calculation distance otherwise.
    #[serde(default)]
    pub receiver_distance: Option<f64>,
    #[serde(default)]
    pub user_background_level: Option<f64>,
    #[serde(default)]
    pub include_trace: bool,
    #[serde(default)]
    pub dataset_version: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ThresholdDistances {
    pub to_background_m: Option<f64>,
    pub to_nml_m: Option<f64>,
    pub to_highly_affected_m: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedMeasure {
    pub id: String,
    pub title: String,
    pub text: String,
    pub reduction_db: Option<f64>,
}

impl From<&MitigationMeasure> for SelectedMeasure {
    fn from(measure: &MitigationMeasure) -> Self {
        Self {
            id: measure.id.clone(),
            title: measure.title.clone(),
            text: measure.text.clone(),
            reduction_db: measure.reduction_db,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimationResult {
    pub dataset_version: String,
    pub source_hash: String,
    pub assessment_type: AssessmentType,
    pub calculation_mode: CalculationMode,
    pub source_level_db: f64,
    pub calculation_distance_m: f64,
    pub predicted_level_db: f64,
    pub background_db: f64,
    pub nml_db: f64,
    pub exceed_background_db: f64,
    pub exceed_nml_db: f64,
    pub impact_band: ImpactBand,
    /// Populated by the full estimator only.
    pub distances: Option<ThresholdDistances>,
    pub standard_measures: Vec<SelectedMeasure>,
    pub additional_measures: Vec<SelectedMeasure>,
    pub warnings: Vec<String>,
    pub trace: Option<CalculationTrace>,
}
