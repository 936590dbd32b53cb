//! Versioned reference data the engine calculates against.
//!
//! A [`Dataset`] is parsed and checked in full before anyone can see it, and
//! is never mutated afterwards. [`DatasetStore`] owns the on-disk bundles and
//! the per-version cache.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{EngineError, EngineResult, EntityKind};
use crate::model::{
    BackgroundLevel, DatasetMetadata, MitigationMeasure, NoiseCategory, Plant, Scenario,
    TimePeriod,
};
use crate::propagation::{PROPAGATION_TABLE, PropagationTable};
use crate::util::sha256_hex;
use crate::worked_examples::WorkedExample;

mod store;
#[cfg(test)]
mod tests;

pub use store::{BUNDLE_FILE, CHECKSUM_FILE, DatasetStore, is_valid_version};

pub const NOISE_CATEGORIES: &str = "noise_categories";
pub const SCENARIOS: &str = "scenarios";
pub const PLANTS: &str = "plants";
pub const MITIGATION_MEASURES: &str = "mitigation_measures";
pub const BACKGROUND_LEVELS: &str = "background_levels";
pub const WORKED_EXAMPLES: &str = "worked_examples";

pub const REQUIRED_TABLES: [&str; 6] = [
    NOISE_CATEGORIES,
    SCENARIOS,
    PLANTS,
    MITIGATION_MEASURES,
    BACKGROUND_LEVELS,
    PROPAGATION_TABLE,
];

/// On-disk shape of `dataset.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetBundle {
    pub metadata: DatasetMetadata,
    #[serde(default)]
    pub tables: BTreeMap<String, Value>,
}

#[derive(Debug)]
pub struct Dataset {
    metadata: DatasetMetadata,
    content_hash: String,
    tables: BTreeMap<String, Value>,
    categories: Vec<NoiseCategory>,
    scenarios: Vec<Scenario>,
    plants: Vec<Plant>,
    measures: Vec<MitigationMeasure>,
    background_levels: Vec<BackgroundLevel>,
    propagation: PropagationTable,
    worked_examples: Vec<WorkedExample>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetInfo {
    pub version: String,
    pub source_hash: String,
    pub content_hash: String,
    pub workbook_name: Option<String>,
    pub extraction_timestamp: String,
    pub total_tables: usize,
    pub sheet_count: Option<u32>,
    pub table_names: Vec<String>,
    pub category_count: usize,
    pub scenario_count: usize,
    pub plant_count: usize,
    pub measure_count: usize,
    pub propagation_rows: usize,
    pub worked_example_count: usize,
    pub validation_issues: Vec<String>,
}

impl Dataset {
    /// Parses raw `dataset.json` bytes. `path` is only used for error context.
    pub fn from_slice(bytes: &[u8], path: &Path) -> EngineResult<Self> {
        let bundle: DatasetBundle =
            serde_json::from_slice(bytes).map_err(|source| EngineError::BundleFormat {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_bundle(bundle, sha256_hex(bytes))
    }

    pub fn from_bundle(bundle: DatasetBundle, content_hash: String) -> EngineResult<Self> {
        let DatasetBundle { metadata, tables } = bundle;
        let version = metadata.version.clone();

        let categories: Vec<NoiseCategory> = parse_table(&tables, NOISE_CATEGORIES, &version)?;
        let scenarios: Vec<Scenario> = parse_table(&tables, SCENARIOS, &version)?;
        let plants: Vec<Plant> = parse_table(&tables, PLANTS, &version)?;
        let measures: Vec<MitigationMeasure> = parse_table(&tables, MITIGATION_MEASURES, &version)?;
        let background_levels: Vec<BackgroundLevel> =
            parse_table(&tables, BACKGROUND_LEVELS, &version)?;
        let worked_examples: Vec<WorkedExample> = parse_table(&tables, WORKED_EXAMPLES, &version)?;
        let propagation = match tables.get(PROPAGATION_TABLE) {
            Some(raw) => PropagationTable::deserialize(raw).map_err(|err| {
                EngineError::invalid_bundle(&version, format!("table {PROPAGATION_TABLE}: {err}"))
            })?,
            None => PropagationTable::default(),
        };

        ensure_unique(NOISE_CATEGORIES, &version, categories.iter().map(|c| c.id.as_str()))?;
        ensure_unique(SCENARIOS, &version, scenarios.iter().map(|s| s.id.as_str()))?;
        ensure_unique(PLANTS, &version, plants.iter().map(|p| p.id.as_str()))?;
        ensure_unique(MITIGATION_MEASURES, &version, measures.iter().map(|m| m.id.as_str()))?;
        ensure_unique(WORKED_EXAMPLES, &version, worked_examples.iter().map(|w| w.id.as_str()))?;

        for category in &categories {
            if category
                .time_periods
                .values()
                .chain(category.nml_values.values())
                .any(|level| !level.is_finite())
            {
                return Err(EngineError::invalid_bundle(
                    &version,
                    format!("noise category {} has a non-finite level", category.id),
                ));
            }
        }

        for scenario in &scenarios {
            if scenario.sound_power_levels.is_empty() {
                return Err(EngineError::invalid_bundle(
                    &version,
                    format!("scenario {} has no sound power levels", scenario.id),
                ));
            }
            if let Some((component, level)) = scenario
                .sound_power_levels
                .iter()
                .find(|(_, level)| !level.is_finite())
            {
                return Err(EngineError::invalid_bundle(
                    &version,
                    format!("scenario {} component {component} has level {level}", scenario.id),
                ));
            }
        }

        for plant in &plants {
            let in_unit_interval = |factor: f64| factor > 0.0 && factor <= 1.0;
            if !plant.sound_power_level.is_finite()
                || !in_unit_interval(plant.duty_cycle)
                || !in_unit_interval(plant.usage_factor)
            {
                return Err(EngineError::invalid_bundle(
                    &version,
                    format!(
                        "plant {} has level {}, duty cycle {}, usage factor {}",
                        plant.id, plant.sound_power_level, plant.duty_cycle, plant.usage_factor
                    ),
                ));
            }
        }

        if let Some(row) = background_levels.iter().find(|row| !row.level.is_finite()) {
            return Err(EngineError::invalid_bundle(
                &version,
                format!("background level for {} is not finite", row.category),
            ));
        }

        Ok(Self {
            metadata,
            content_hash,
            tables,
            categories,
            scenarios,
            plants,
            measures,
            background_levels,
            propagation,
            worked_examples,
        })
    }

    pub fn metadata(&self) -> &DatasetMetadata {
        &self.metadata
    }

    pub fn version(&self) -> &str {
        &self.metadata.version
    }

    pub fn source_hash(&self) -> &str {
        &self.metadata.source_hash
    }

    /// SHA-256 of the bundle bytes this dataset was parsed from.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn get_table(&self, name: &str) -> EngineResult<&Value> {
        self.tables
            .get(name)
            .ok_or_else(|| EngineError::not_found(EntityKind::Table, name))
    }

    pub fn categories(&self) -> &[NoiseCategory] {
        &self.categories
    }

    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }

    pub fn plants(&self) -> &[Plant] {
        &self.plants
    }

    pub fn measures(&self) -> &[MitigationMeasure] {
        &self.measures
    }

    pub fn background_levels(&self) -> &[BackgroundLevel] {
        &self.background_levels
    }

    pub fn propagation_table(&self) -> &PropagationTable {
        &self.propagation
    }

    pub fn worked_examples(&self) -> &[WorkedExample] {
        &self.worked_examples
    }

    pub fn category(&self, id: &str) -> EngineResult<&NoiseCategory> {
        self.categories
            .iter()
            .find(|category| category.id == id)
            .ok_or_else(|| EngineError::not_found(EntityKind::NoiseCategory, id))
    }

    pub fn scenario(&self, id: &str) -> EngineResult<&Scenario> {
        self.scenarios
            .iter()
            .find(|scenario| scenario.id == id)
            .ok_or_else(|| EngineError::not_found(EntityKind::Scenario, id))
    }

    pub fn plant(&self, id: &str) -> EngineResult<&Plant> {
        self.plants
            .iter()
            .find(|plant| plant.id == id)
            .ok_or_else(|| EngineError::not_found(EntityKind::Plant, id))
    }

    pub fn background_level(&self, category_id: &str, period: TimePeriod) -> Option<f64> {
        self.background_levels
            .iter()
            .find(|row| row.category == category_id && row.time_period == period)
            .map(|row| row.level)
    }

    /// Completeness problems that do not prevent calculation.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        for table in REQUIRED_TABLES {
            if !self.tables.contains_key(table) {
                issues.push(format!("missing required table: {table}"));
            }
        }

        if self.metadata.total_tables != self.tables.len() {
            issues.push(format!(
                "metadata declares {} tables but bundle holds {}",
                self.metadata.total_tables,
                self.tables.len()
            ));
        }

        for (table, empty) in [
            (NOISE_CATEGORIES, self.categories.is_empty()),
            (SCENARIOS, self.scenarios.is_empty()),
            (PLANTS, self.plants.is_empty()),
        ] {
            if empty && self.tables.contains_key(table) {
                issues.push(format!("table {table} has no rows"));
            }
        }

        for category in &self.categories {
            for period in TimePeriod::BASE_PERIODS {
                let has_background = category.time_periods.contains_key(&period)
                    || self.background_level(&category.id, period).is_some();
                if !has_background {
                    issues.push(format!(
                        "noise category {} has no {} background level",
                        category.id,
                        period.as_str()
                    ));
                }
                if !category.nml_values.contains_key(&period) {
                    issues.push(format!(
                        "noise category {} has no {} NML",
                        category.id,
                        period.as_str()
                    ));
                }
            }
        }

        let category_ids: HashSet<&str> = self.categories.iter().map(|c| c.id.as_str()).collect();
        for row in &self.background_levels {
            if !category_ids.contains(row.category.as_str()) {
                issues.push(format!(
                    "background level row references unknown category {}",
                    row.category
                ));
            }
        }

        let measure_ids: HashSet<&str> = self.measures.iter().map(|m| m.id.as_str()).collect();
        for scenario in &self.scenarios {
            for measure in &scenario.applicable_measures {
                if !measure_ids.contains(measure.as_str()) {
                    issues.push(format!(
                        "scenario {} references unknown measure {measure}",
                        scenario.id
                    ));
                }
            }
        }

        issues.extend(self.propagation.monotonicity_issues());
        issues
    }

    pub fn info(&self) -> DatasetInfo {
        DatasetInfo {
            version: self.metadata.version.clone(),
            source_hash: self.metadata.source_hash.clone(),
            content_hash: self.content_hash.clone(),
            workbook_name: self.metadata.workbook_name.clone(),
            extraction_timestamp: self.metadata.extraction_timestamp.to_rfc3339(),
            total_tables: self.metadata.total_tables,
            sheet_count: self.metadata.sheet_count,
            table_names: self.tables.keys().cloned().collect(),
            category_count: self.categories.len(),
            scenario_count: self.scenarios.len(),
            plant_count: self.plants.len(),
            measure_count: self.measures.len(),
            propagation_rows: self.propagation.len(),
            worked_example_count: self.worked_examples.len(),
            validation_issues: self.validate(),
        }
    }
}

fn parse_table<T: DeserializeOwned>(
    tables: &BTreeMap<String, Value>,
    name: &str,
    version: &str,
) -> EngineResult<Vec<T>> {
    match tables.get(name) {
        Some(raw) => Vec::<T>::deserialize(raw)
            .map_err(|err| EngineError::invalid_bundle(version, format!("table {name}: {err}"))),
        None => Ok(Vec::new()),
    }
}

fn ensure_unique<'a>(
    table: &str,
    version: &str,
    ids: impl Iterator<Item = &'a str>,
) -> EngineResult<()> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(EngineError::invalid_bundle(
                version,
                format!("table {table} repeats id {id}"),
            ));
        }
    }
    Ok(())
}
