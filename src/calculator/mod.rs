//! Orchestrates one estimate: resolve inputs, combine sources, propagate,
//! classify, and select mitigation.

use std::collections::BTreeMap;

use serde_json::json;
use tracing::debug;

use crate::dataset::{
    BACKGROUND_LEVELS, Dataset, DatasetStore, MITIGATION_MEASURES, NOISE_CATEGORIES, PLANTS,
    SCENARIOS,
};
use crate::error::EngineResult;
use crate::impact::classify;
use crate::levels::{SILENT_FLOOR_DB, combine, duty_adjusted_level, round_tenth};
use crate::mitigation::select;
use crate::model::{
    EstimationRequest, EstimationResult, MitigationMeasure, NoiseCategory, SelectedMeasure,
    ThresholdDistances, TimePeriod,
};
use crate::policy::EnginePolicy;
use crate::propagation::propagate;
use crate::solver::solve_distance;
use crate::trace::TraceRecorder;

mod plan;

use plan::{Assessment, BackgroundSource, Plan, SourceSelection};

/// Entry point that resolves the dataset version through a store.
#[derive(Debug)]
pub struct NoiseCalculator<'a> {
    store: &'a DatasetStore,
    policy: EnginePolicy,
}

impl<'a> NoiseCalculator<'a> {
    pub fn new(store: &'a DatasetStore) -> Self {
        Self {
            store,
            policy: EnginePolicy::default(),
        }
    }

    pub fn with_policy(store: &'a DatasetStore, policy: EnginePolicy) -> EngineResult<Self> {
        policy.validate()?;
        Ok(Self { store, policy })
    }

    pub fn policy(&self) -> &EnginePolicy {
        &self.policy
    }

    pub fn calculate(&self, request: &EstimationRequest) -> EngineResult<EstimationResult> {
        // Reject malformed requests before touching the disk.
        let plan = Plan::from_request(request, &self.policy)?;
        let dataset = self.store.load(request.dataset_version.as_deref())?;
        execute(&dataset, request, plan, &self.policy)
    }
}

/// Runs `request` against an already loaded dataset. The request's
/// `dataset_version` is not consulted.
pub fn calculate_with(
    dataset: &Dataset,
    request: &EstimationRequest,
    policy: &EnginePolicy,
) -> EngineResult<EstimationResult> {
    policy.validate()?;
    let plan = Plan::from_request(request, policy)?;
    execute(dataset, request, plan, policy)
}

/// Source levels before propagation.
struct Sources {
    components: Vec<f64>,
    level: f64,
}

fn execute(
    dataset: &Dataset,
    request: &EstimationRequest,
    plan: Plan<'_>,
    policy: &EnginePolicy,
) -> EngineResult<EstimationResult> {
    let mut trace = TraceRecorder::new(request.include_trace);
    let period = request.time_period;
    let table = dataset.propagation_table();

    let category = dataset.category(&request.noise_category_id)?;
    trace.table(NOISE_CATEGORIES, category.id.as_str());
    let sources = resolve_sources(dataset, plan.sources, &mut trace)?;
    let background_db =
        resolve_background(dataset, category, period, plan.background, policy, &mut trace);
    let nml_db = resolve_nml(category, period, policy, &mut trace);

    trace.value("source_level_db", sources.level);
    trace.value("background_db", background_db);
    trace.value("nml_db", nml_db);

    let (predicted, distances) = match plan.assessment {
        Assessment::FullEstimator {
            receiver_distance_m,
        } => {
            let predicted = propagate(
                sources.level,
                receiver_distance_m,
                request.propagation_type,
                table,
                &mut trace,
            )?;
            let highly_affected_db = background_db + policy.highly_affected_margin_db;
            let mut solve = |target: f64| {
                solve_distance(
                    sources.level,
                    target,
                    request.propagation_type,
                    table,
                    &policy.solver,
                    &mut trace,
                )
            };
            let distances = ThresholdDistances {
                to_background_m: solve(background_db)?,
                to_nml_m: solve(nml_db)?,
                to_highly_affected_m: solve(highly_affected_db)?,
            };
            trace.value("highly_affected_level_db", highly_affected_db);
            trace.value("distance_to_background_m", distances.to_background_m);
            trace.value("distance_to_nml_m", distances.to_nml_m);
            trace.value("distance_to_highly_affected_m", distances.to_highly_affected_m);
            (predicted, Some(distances))
        }
        Assessment::DistanceBased {
            distance_m,
            defaulted,
        } => {
            if defaulted {
                trace.assume(format!(
                    "no calculation distance supplied; using {distance_m} m"
                ));
            }
            let predicted = match plan.sources {
                SourceSelection::Scenario { .. } => {
                    let mut received = Vec::with_capacity(sources.components.len());
                    for component in &sources.components {
                        received.push(propagate(
                            *component,
                            distance_m,
                            request.propagation_type,
                            table,
                            &mut trace,
                        )?);
                    }
                    combine(&received)
                }
                SourceSelection::IndividualPlant { .. } | SourceSelection::NoisiestPlant { .. } => {
                    propagate(
                        sources.level,
                        distance_m,
                        request.propagation_type,
                        table,
                        &mut trace,
                    )?
                }
            };
            (predicted, None)
        }
    };

    let exceed_background = predicted - background_db;
    let exceed_nml = predicted - nml_db;
    let impact_band = classify(exceed_background, exceed_nml);
    trace.value("predicted_level_db", predicted);
    trace.value("exceed_background_db", exceed_background);
    trace.value("exceed_nml_db", exceed_nml);
    trace.value("impact_band", impact_band.as_str());

    let resolved_inputs = resolved_inputs(request, plan.sources);
    let selection = select(impact_band, &resolved_inputs, dataset.measures());
    if trace.is_enabled() {
        let ids = |measures: &[&MitigationMeasure]| -> Vec<String> {
            measures.iter().map(|measure| measure.id.clone()).collect()
        };
        let standard = ids(selection.standard.as_slice());
        let additional = ids(selection.additional.as_slice());
        trace.table(
            MITIGATION_MEASURES,
            json!({ "standard": standard, "additional": additional }),
        );
    }

    debug!(
        version = %dataset.version(),
        assessment = request.assessment_type.as_str(),
        mode = request.calculation_mode.as_str(),
        predicted_level_db = predicted,
        impact_band = impact_band.as_str(),
        "calculation complete"
    );

    let (warnings, trace) = trace.finish();
    Ok(EstimationResult {
        dataset_version: dataset.version().to_string(),
        source_hash: dataset.source_hash().to_string(),
        assessment_type: request.assessment_type,
        calculation_mode: request.calculation_mode,
        source_level_db: round_tenth(sources.level),
        calculation_distance_m: plan.calculation_distance_m(),
        predicted_level_db: round_tenth(predicted),
        background_db: round_tenth(background_db),
        nml_db: round_tenth(nml_db),
        exceed_background_db: round_tenth(exceed_background),
        exceed_nml_db: round_tenth(exceed_nml),
        impact_band,
        distances,
        standard_measures: selection.standard.into_iter().map(SelectedMeasure::from).collect(),
        additional_measures: selection.additional.into_iter().map(SelectedMeasure::from).collect(),
        warnings,
        trace,
    })
}

fn resolve_sources(
    dataset: &Dataset,
    selection: SourceSelection<'_>,
    trace: &mut TraceRecorder,
) -> EngineResult<Sources> {
    match selection {
        SourceSelection::Scenario { scenario_id } => {
            let scenario = dataset.scenario(scenario_id)?;
            trace.table(SCENARIOS, scenario.id.as_str());
            let components: Vec<f64> = scenario.sound_power_levels.values().copied().collect();
            trace.value("component_levels_db", json!(scenario.sound_power_levels));
            let level = combine(&components);
            Ok(Sources { components, level })
        }
        SourceSelection::NoisiestPlant { scenario_id } => {
            let scenario = dataset.scenario(scenario_id)?;
            trace.table(SCENARIOS, scenario.id.as_str());
            let mut noisiest: Option<(&str, f64)> = None;
            for (component, level) in &scenario.sound_power_levels {
                if noisiest.is_none_or(|(_, loudest)| *level > loudest) {
                    noisiest = Some((component.as_str(), *level));
                }
            }
            let (component, level) = noisiest.unwrap_or(("", SILENT_FLOOR_DB));
            trace.value(
                "noisiest_component",
                json!({ "component": component, "level_db": level }),
            );
            Ok(Sources {
                components: vec![level],
                level,
            })
        }
        SourceSelection::IndividualPlant { plant_ids } => {
            let mut components = Vec::with_capacity(plant_ids.len());
            for plant_id in plant_ids {
                let plant = dataset.plant(plant_id)?;
                let adjusted = duty_adjusted_level(plant);
                trace.table(PLANTS, plant.id.as_str());
                trace.value(
                    "plant_level",
                    json!({
                        "plant_id": plant.id,
                        "sound_power_level_db": plant.sound_power_level,
                        "duty_cycle": plant.duty_cycle,
                        "usage_factor": plant.usage_factor,
                        "adjusted_level_db": adjusted,
                    }),
                );
                components.push(adjusted);
            }
            let level = combine(&components);
            Ok(Sources { components, level })
        }
    }
}

/// User value, then the category's representative level, then the
/// background table, then the policy default.
fn resolve_background(
    dataset: &Dataset,
    category: &NoiseCategory,
    period: TimePeriod,
    source: BackgroundSource,
    policy: &EnginePolicy,
    trace: &mut TraceRecorder,
) -> f64 {
    if let BackgroundSource::UserSupplied(level) = source {
        trace.value("background_source", "user_supplied");
        return level;
    }
    if let Some(level) = category.time_periods.get(&period) {
        trace.value("background_source", NOISE_CATEGORIES);
        return *level;
    }
    if let Some(level) = dataset.background_level(&category.id, period) {
        trace.table(
            BACKGROUND_LEVELS,
            json!({ "category": category.id, "time_period": period.as_str() }),
        );
        trace.value("background_source", BACKGROUND_LEVELS);
        return level;
    }
    let level = policy.default_background.for_period(period);
    trace.assume(format!(
        "no {} background level for category {}; using default {level} dB",
        period.as_str(),
        category.id
    ));
    level
}

fn resolve_nml(
    category: &NoiseCategory,
    period: TimePeriod,
    policy: &EnginePolicy,
    trace: &mut TraceRecorder,
) -> f64 {
    match category.nml_values.get(&period) {
        Some(level) => *level,
        None => {
            trace.assume(format!(
                "no {} NML for category {}; using default {} dB",
                period.as_str(),
                category.id,
                policy.default_nml_db
            ));
            policy.default_nml_db
        }
    }
}

/// Request values keyed the way mitigation trigger conditions name them.
fn resolved_inputs(
    request: &EstimationRequest,
    sources: SourceSelection<'_>,
) -> BTreeMap<String, String> {
    let mut inputs = BTreeMap::from([
        ("assessment_type".to_string(), request.assessment_type.as_str().to_string()),
        ("calculation_mode".to_string(), request.calculation_mode.as_str().to_string()),
        (
            "environment_approach".to_string(),
            request.environment_approach.as_str().to_string(),
        ),
        ("time_period".to_string(), request.time_period.as_str().to_string()),
        ("propagation_type".to_string(), request.propagation_type.as_str().to_string()),
        ("noise_category_id".to_string(), request.noise_category_id.clone()),
    ]);
    if let Some(scenario_id) = sources.scenario_id() {
        inputs.insert("scenario_id".to_string(), scenario_id.to_string());
    }
    inputs
}
