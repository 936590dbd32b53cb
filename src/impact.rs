use crate::model::ImpactBand;

/// Upper bound (inclusive) of the moderately affected band, in dB above NML.
pub const MODERATE_EXCEEDANCE_LIMIT_DB: f64 = 5.0;

/// Impact band from the NML exceedance.
///
/// Background exceedance is reported alongside but does not move the band.
pub fn classify(_exceed_background_db: f64, exceed_nml_db: f64) -> ImpactBand {
    if exceed_nml_db <= 0.0 {
        ImpactBand::NotAffected
    } else if exceed_nml_db <= MODERATE_EXCEEDANCE_LIMIT_DB {
        ImpactBand::ModeratelyAffected
    } else {
        ImpactBand::HighlyAffected
    }
}
