//! Table-driven propagation from sound power level to received level.
//!
//! The attenuation table was built against a fixed reference level, so the
//! received level is `SWL - reference_offset + attenuation(distance, ground)`.
//! Distances snap to the nearest sampled row; there is no interpolation.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{EngineError, EngineResult};
use crate::model::PropagationType;
use crate::trace::TraceRecorder;

pub const DEFAULT_REFERENCE_OFFSET_DB: f64 = 110.0;
pub const PROPAGATION_TABLE: &str = "concawe_attenuation";

/// Attenuation columns present in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroundKey {
    Hard,
    Urban,
    Rural,
}

impl GroundKey {
    pub const ALL: [GroundKey; 3] = [Self::Hard, Self::Urban, Self::Rural];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hard => "hard",
            Self::Urban => "urban",
            Self::Rural => "rural",
        }
    }
}

impl fmt::Display for GroundKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column for a propagation class, if the table has one.
pub fn ground_key(propagation: PropagationType) -> Option<GroundKey> {
    match propagation {
        PropagationType::Rural => Some(GroundKey::Rural),
        PropagationType::Urban => Some(GroundKey::Urban),
        PropagationType::HardGround => Some(GroundKey::Hard),
        PropagationType::SoftGround | PropagationType::Mixed => None,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GroundAttenuation {
    #[serde(default)]
    pub hard: Option<f64>,
    #[serde(default)]
    pub urban: Option<f64>,
    #[serde(default)]
    pub rural: Option<f64>,
}

impl GroundAttenuation {
    pub fn get(&self, key: GroundKey) -> Option<f64> {
        match key {
            GroundKey::Hard => self.hard,
            GroundKey::Urban => self.urban,
            GroundKey::Rural => self.rural,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PropagationTableRepr {
    Calibrated {
        reference_offset_db: f64,
        rows: BTreeMap<String, GroundAttenuation>,
    },
    Rows(BTreeMap<String, GroundAttenuation>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PropagationTableRepr")]
pub struct PropagationTable {
    reference_offset_db: f64,
    rows: BTreeMap<u32, GroundAttenuation>,
}

impl TryFrom<PropagationTableRepr> for PropagationTable {
    type Error = String;

    fn try_from(repr: PropagationTableRepr) -> Result<Self, Self::Error> {
        let (reference_offset_db, raw_rows) = match repr {
            PropagationTableRepr::Calibrated {
                reference_offset_db,
                rows,
            } => (reference_offset_db, rows),
            PropagationTableRepr::Rows(rows) => (DEFAULT_REFERENCE_OFFSET_DB, rows),
        };

        if !reference_offset_db.is_finite() {
            return Err(format!("non-finite reference offset {reference_offset_db}"));
        }

        let mut rows = BTreeMap::new();
        for (key, row) in raw_rows {
            let distance = parse_distance_key(&key)?;
            if GroundKey::ALL
                .iter()
                .filter_map(|ground| row.get(*ground))
                .any(|value| !value.is_finite())
            {
                return Err(format!("non-finite attenuation at {distance} m"));
            }
            rows.insert(distance, row);
        }

        Ok(Self {
            reference_offset_db,
            rows,
        })
    }
}

fn parse_distance_key(key: &str) -> Result<u32, String> {
    let value: f64 = key
        .trim()
        .parse()
        .map_err(|_| format!("invalid distance key `{key}`"))?;
    if value < 1.0 || value.fract() != 0.0 || value > f64::from(u32::MAX) {
        return Err(format!("distance key `{key}` is not a positive whole number of metres"));
    }
    Ok(value as u32)
}

impl Default for PropagationTable {
    fn default() -> Self {
        Self {
            reference_offset_db: DEFAULT_REFERENCE_OFFSET_DB,
            rows: BTreeMap::new(),
        }
    }
}

impl PropagationTable {
    pub fn new(rows: impl IntoIterator<Item = (u32, GroundAttenuation)>) -> Self {
        Self {
            reference_offset_db: DEFAULT_REFERENCE_OFFSET_DB,
            rows: rows.into_iter().collect(),
        }
    }

    pub fn with_reference_offset(mut self, reference_offset_db: f64) -> Self {
        self.reference_offset_db = reference_offset_db;
        self
    }

    pub fn reference_offset_db(&self) -> f64 {
        self.reference_offset_db
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> impl Iterator<Item = (u32, &GroundAttenuation)> {
        self.rows.iter().map(|(distance, row)| (*distance, row))
    }

    /// Row closest to `distance` that carries a value for `key`.
    /// Ties go to the smaller distance.
    pub fn nearest(&self, distance: f64, key: GroundKey) -> Option<(u32, f64)> {
        let mut best: Option<(u32, f64, f64)> = None;
        for (row_distance, row) in &self.rows {
            let Some(attenuation) = row.get(key) else {
                continue;
            };
            let gap = (f64::from(*row_distance) - distance).abs();
            if best.is_none_or(|(_, _, best_gap)| gap < best_gap) {
                best = Some((*row_distance, attenuation, gap));
            }
        }
        best.map(|(row_distance, attenuation, _)| (row_distance, attenuation))
    }

    /// Columns whose attenuation rises with distance. Such a table breaks the
    /// monotonicity the distance solver relies on.
    pub fn monotonicity_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();
        for key in GroundKey::ALL {
            let mut previous: Option<(u32, f64)> = None;
            for (distance, row) in &self.rows {
                let Some(value) = row.get(key) else {
                    continue;
                };
                if let Some((previous_distance, previous_value)) = previous {
                    if value > previous_value {
                        issues.push(format!(
                            "{PROPAGATION_TABLE} {key} attenuation rises from {previous_value} dB at {previous_distance} m to {value} dB at {distance} m"
                        ));
                    }
                }
                previous = Some((*distance, value));
            }
        }
        issues
    }
}

pub(crate) fn resolve_ground_key(propagation: PropagationType, trace: &mut TraceRecorder) -> GroundKey {
    match ground_key(propagation) {
        Some(key) => key,
        None => {
            trace.assume(format!(
                "propagation classification {} has no attenuation column; using rural",
                propagation.as_str()
            ));
            GroundKey::Rural
        }
    }
}

/// Received level at `distance` metres from a source of `source_level` dB SWL.
pub fn propagate(
    source_level: f64,
    distance: f64,
    propagation: PropagationType,
    table: &PropagationTable,
    trace: &mut TraceRecorder,
) -> EngineResult<f64> {
    if !(distance.is_finite() && distance > 0.0) {
        return Err(EngineError::InvalidInput {
            parameter: "distance",
            value: distance,
        });
    }

    let key = resolve_ground_key(propagation, trace);
    let rounded = distance.round();

    let Some((row_distance, attenuation)) = table.nearest(rounded, key) else {
        trace.warn(format!(
            "no {key} attenuation data in {PROPAGATION_TABLE}; using geometric spreading"
        ));
        let received = source_level - 20.0 * distance.log10();
        trace.value("geometric_received_level_db", received);
        return Ok(received);
    };

    let received = source_level - table.reference_offset_db + attenuation;

    if trace.is_enabled() {
        trace.table(
            PROPAGATION_TABLE,
            json!({ "distance_m": row_distance, "ground": key.as_str() }),
        );
        trace.value(
            "propagation",
            json!({
                "distance_m": distance,
                "table_distance_m": row_distance,
                "attenuation_db": attenuation,
                "reference_offset_db": table.reference_offset_db,
                "received_level_db": received,
            }),
        );
    }

    Ok(received)
}
