use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::model::TimePeriod;

pub const DEFAULT_HIGHLY_AFFECTED_MARGIN_DB: f64 = 10.0;
pub const DEFAULT_CALCULATION_DISTANCE_M: f64 = 100.0;
pub const DEFAULT_NML_DB: f64 = 50.0;

/// Bracket and tolerances of the distance search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub min_distance_m: f64,
    pub max_distance_m: f64,
    pub absolute_tolerance_m: f64,
    pub relative_tolerance: f64,
    pub max_iterations: usize,
}

impl SolverConfig {
    /// The search domain must be a non-empty span of positive distances.
    pub fn validate(&self) -> EngineResult<()> {
        if !(self.min_distance_m.is_finite() && self.min_distance_m > 0.0) {
            return Err(EngineError::validation(
                "solver.min_distance_m",
                format!("{} must be finite and greater than zero", self.min_distance_m),
            ));
        }
        if !(self.max_distance_m.is_finite() && self.max_distance_m > self.min_distance_m) {
            return Err(EngineError::validation(
                "solver.max_distance_m",
                format!(
                    "{} must be finite and greater than min_distance_m ({})",
                    self.max_distance_m, self.min_distance_m
                ),
            ));
        }
        positive("solver.absolute_tolerance_m", self.absolute_tolerance_m)?;
        positive("solver.relative_tolerance", self.relative_tolerance)?;
        if self.max_iterations == 0 {
            return Err(EngineError::validation(
                "solver.max_iterations",
                "at least one iteration is required",
            ));
        }
        Ok(())
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            min_distance_m: 1.0,
            max_distance_m: 1000.0,
            absolute_tolerance_m: 0.1,
            relative_tolerance: 0.01,
            max_iterations: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundDefaults {
    pub day_db: f64,
    pub evening_db: f64,
    pub night_db: f64,
    pub other_db: f64,
}

impl Default for BackgroundDefaults {
    fn default() -> Self {
        Self {
            day_db: 45.0,
            evening_db: 40.0,
            night_db: 35.0,
            other_db: 40.0,
        }
    }
}

impl BackgroundDefaults {
    pub fn for_period(&self, period: TimePeriod) -> f64 {
        match period {
            TimePeriod::Day => self.day_db,
            TimePeriod::Evening => self.evening_db,
            TimePeriod::Night => self.night_db,
            TimePeriod::DayEvening | TimePeriod::EveningNight | TimePeriod::DayEveningNight => {
                self.other_db
            }
        }
    }
}

/// Policy constants the calculation depends on but the dataset does not carry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnginePolicy {
    /// Offset above background that marks the "highly affected" distance.
    pub highly_affected_margin_db: f64,
    pub default_calculation_distance_m: f64,
    pub default_nml_db: f64,
    pub default_background: BackgroundDefaults,
    pub solver: SolverConfig,
}

impl EnginePolicy {
    pub fn validate(&self) -> EngineResult<()> {
        finite("highly_affected_margin_db", self.highly_affected_margin_db)?;
        positive(
            "default_calculation_distance_m",
            self.default_calculation_distance_m,
        )?;
        finite("default_nml_db", self.default_nml_db)?;
        let background = &self.default_background;
        finite("default_background.day_db", background.day_db)?;
        finite("default_background.evening_db", background.evening_db)?;
        finite("default_background.night_db", background.night_db)?;
        finite("default_background.other_db", background.other_db)?;
        self.solver.validate()
    }
}

fn finite(field: &'static str, value: f64) -> EngineResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(EngineError::validation(field, format!("{value} is not finite")))
    }
}

fn positive(field: &'static str, value: f64) -> EngineResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(EngineError::validation(
            field,
            format!("{value} must be finite and greater than zero"),
        ))
    }
}

impl Default for EnginePolicy {
    fn default() -> Self {
        Self {
            highly_affected_margin_db: DEFAULT_HIGHLY_AFFECTED_MARGIN_DB,
            default_calculation_distance_m: DEFAULT_CALCULATION_DISTANCE_M,
            default_nml_db: DEFAULT_NML_DB,
            default_background: BackgroundDefaults::default(),
            solver: SolverConfig::default(),
        }
    }
}
