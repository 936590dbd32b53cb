use crate::error::{EngineError, EngineResult};
use crate::model::{AssessmentType, CalculationMode, EnvironmentApproach, EstimationRequest};
use crate::policy::EnginePolicy;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Assessment {
    FullEstimator { receiver_distance_m: f64 },
    DistanceBased { distance_m: f64, defaulted: bool },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum SourceSelection<'r> {
    Scenario { scenario_id: &'r str },
    IndividualPlant { plant_ids: &'r [String] },
    NoisiestPlant { scenario_id: &'r str },
}

impl<'r> SourceSelection<'r> {
    pub(crate) fn scenario_id(&self) -> Option<&'r str> {
        match *self {
            Self::Scenario { scenario_id } | Self::NoisiestPlant { scenario_id } => Some(scenario_id),
            Self::IndividualPlant { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum BackgroundSource {
    Representative,
    UserSupplied(f64),
}

/// A request with every cross-field rule already checked.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Plan<'r> {
    pub assessment: Assessment,
    pub sources: SourceSelection<'r>,
    pub background: BackgroundSource,
}

impl<'r> Plan<'r> {
    pub(crate) fn from_request(
        request: &'r EstimationRequest,
        policy: &EnginePolicy,
    ) -> EngineResult<Self> {
        if request.noise_category_id.trim().is_empty() {
            return Err(EngineError::validation(
                "noise_category_id",
                "a noise category is required",
            ));
        }

        let sources = match request.calculation_mode {
            CalculationMode::Scenario => SourceSelection::Scenario {
                scenario_id: required_scenario(request)?,
            },
            CalculationMode::NoisiestPlant => SourceSelection::NoisiestPlant {
                scenario_id: required_scenario(request)?,
            },
            CalculationMode::IndividualPlant => match request.plant_ids.as_deref() {
                Some(plant_ids) if !plant_ids.is_empty() => {
                    SourceSelection::IndividualPlant { plant_ids }
                }
                _ => {
                    return Err(EngineError::validation(
                        "plant_ids",
                        "individual_plant mode needs at least one plant id",
                    ));
                }
            },
        };

        let assessment = match (request.assessment_type, request.receiver_distance) {
            (AssessmentType::FullEstimator, Some(distance)) => Assessment::FullEstimator {
                receiver_distance_m: positive("receiver_distance", distance)?,
            },
            (AssessmentType::FullEstimator, None) => {
                return Err(EngineError::validation(
                    "receiver_distance",
                    "the full estimator needs a receiver distance",
                ));
            }
            (AssessmentType::DistanceBased, Some(distance)) => Assessment::DistanceBased {
                distance_m: positive("receiver_distance", distance)?,
                defaulted: false,
            },
            (AssessmentType::DistanceBased, None) => Assessment::DistanceBased {
                distance_m: policy.default_calculation_distance_m,
                defaulted: true,
            },
        };

        let background = match request.environment_approach {
            EnvironmentApproach::Representative => BackgroundSource::Representative,
            EnvironmentApproach::UserSupplied => match request.user_background_level {
                Some(level) if level.is_finite() => BackgroundSource::UserSupplied(level),
                Some(level) => {
                    return Err(EngineError::validation(
                        "user_background_level",
                        format!("{level} is not a finite level"),
                    ));
                }
                None => {
                    return Err(EngineError::validation(
                        "user_background_level",
                        "user_supplied_background_level needs a background level",
                    ));
                }
            },
        };

        Ok(Self {
            assessment,
            sources,
            background,
        })
    }

    pub(crate) fn calculation_distance_m(&self) -> f64 {
        match self.assessment {
            Assessment::FullEstimator {
                receiver_distance_m,
            } => receiver_distance_m,
            Assessment::DistanceBased { distance_m, .. } => distance_m,
        }
    }
}

fn required_scenario(request: &EstimationRequest) -> EngineResult<&str> {
    match request.scenario_id.as_deref() {
        Some(id) if !id.trim().is_empty() => Ok(id),
        _ => Err(EngineError::validation(
            "scenario_id",
            format!(
                "{} mode needs a scenario id",
                request.calculation_mode.as_str()
            ),
        )),
    }
}

fn positive(field: &'static str, value: f64) -> EngineResult<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(EngineError::validation(
            field,
            format!("{value} must be finite and greater than zero"),
        ))
    }
}
