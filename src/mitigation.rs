use std::collections::BTreeMap;

use crate::model::{ImpactBand, MeasureKind, MitigationMeasure};

/// Trigger key that always resolves to the classified impact band.
pub const IMPACT_BAND_KEY: &str = "impact_band";

#[derive(Debug, Default, PartialEq)]
pub struct MeasureSelection<'a> {
    pub standard: Vec<&'a MitigationMeasure>,
    pub additional: Vec<&'a MitigationMeasure>,
}

/// Whether every declared trigger that can be resolved admits the inputs.
/// Keys the inputs do not carry are skipped.
pub fn applies(
    measure: &MitigationMeasure,
    impact_band: ImpactBand,
    resolved_inputs: &BTreeMap<String, String>,
) -> bool {
    measure.trigger_conditions.iter().all(|(key, allowed)| {
        let resolved = if key == IMPACT_BAND_KEY {
            Some(impact_band.as_str())
        } else {
            resolved_inputs.get(key).map(String::as_str)
        };
        match resolved {
            Some(value) => allowed.iter().any(|candidate| candidate == value),
            None => true,
        }
    })
}

/// Applicable measures split by kind, each bucket in catalog order.
pub fn select<'a>(
    impact_band: ImpactBand,
    resolved_inputs: &BTreeMap<String, String>,
    catalog: &'a [MitigationMeasure],
) -> MeasureSelection<'a> {
    let mut selection = MeasureSelection::default();
    for measure in catalog
        .iter()
        .filter(|measure| applies(measure, impact_band, resolved_inputs))
    {
        match measure.kind {
            MeasureKind::Standard => selection.standard.push(measure),
            MeasureKind::Additional => selection.additional.push(measure),
        }
    }
    selection
}
