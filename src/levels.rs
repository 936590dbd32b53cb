//! dB-domain arithmetic.
//!
//! `combine` is the only place that sums levels. Everything that needs an
//! energetic sum goes through it so rounding behaviour stays identical across
//! calculation modes.

use crate::model::Plant;

/// Result of combining no sources at all. A convention, not a physical level.
pub const SILENT_FLOOR_DB: f64 = 0.0;

pub fn combine(levels: &[f64]) -> f64 {
    match levels {
        [] => SILENT_FLOOR_DB,
        [single] => *single,
        _ => {
            let linear_sum: f64 = levels.iter().map(|level| 10_f64.powf(level / 10.0)).sum();
            10.0 * linear_sum.log10()
        }
    }
}

/// Sound power level of a plant after duty-cycle and usage attenuation.
pub fn duty_adjusted_level(plant: &Plant) -> f64 {
    plant.sound_power_level + 10.0 * (plant.duty_cycle * plant.usage_factor).log10()
}

pub fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
