//! Distance-for-target-level inversion of the propagation model.
//!
//! Propagation is table-quantized, so `f(d) = level(d) - target` is a step
//! function. Brent's method only needs a sign change, which makes it a good
//! fit: it never evaluates a derivative and falls back to bisection whenever
//! interpolation misbehaves on a flat step.

use tracing::warn;

use crate::error::EngineResult;
use crate::levels::round_tenth;
use crate::model::PropagationType;
use crate::policy::SolverConfig;
use crate::propagation::{PropagationTable, propagate};
use crate::trace::TraceRecorder;

/// Distance at which `source_level` has fallen to `target_level`.
///
/// Returns the minimum distance when the target is already met there, and
/// `None` when it is still exceeded at the maximum distance.
pub fn solve_distance(
    source_level: f64,
    target_level: f64,
    propagation: PropagationType,
    table: &PropagationTable,
    config: &SolverConfig,
    trace: &mut TraceRecorder,
) -> EngineResult<Option<f64>> {
    // Per-step lookups stay out of the caller's trace.
    let mut quiet = TraceRecorder::disabled();
    let mut excess = |distance: f64| -> EngineResult<f64> {
        Ok(propagate(source_level, distance, propagation, table, &mut quiet)? - target_level)
    };

    let lower = config.min_distance_m;
    let upper = config.max_distance_m;
    let f_lower = excess(lower)?;
    if f_lower <= 0.0 {
        forward_warnings(&quiet, trace);
        return Ok(Some(round_tenth(lower)));
    }

    let f_upper = excess(upper)?;
    if f_upper > 0.0 {
        forward_warnings(&quiet, trace);
        warn!(
            source_level,
            target_level,
            max_distance_m = upper,
            "target level not reached within solver domain"
        );
        trace.assume(format!(
            "target {target_level:.1} dB not reached within {upper} m of a {source_level:.1} dB source"
        ));
        return Ok(None);
    }

    let (distance, converged) = brent(&mut excess, (lower, f_lower), (upper, f_upper), config)?;
    if !converged {
        trace.warn(format!(
            "distance search for {target_level:.1} dB stopped after {} iterations",
            config.max_iterations
        ));
    }

    forward_warnings(&quiet, trace);
    Ok(Some(round_tenth(distance)))
}

fn forward_warnings(quiet: &TraceRecorder, trace: &mut TraceRecorder) {
    for warning in quiet.warnings() {
        trace.warn(warning.clone());
    }
}

fn tolerance(config: &SolverConfig, estimate: f64) -> f64 {
    config
        .absolute_tolerance_m
        .min(config.relative_tolerance * estimate.abs())
}

/// Brent-Dekker root search on a bracket with `f(a) > 0 >= f(b)`.
///
/// Returns the bracket end where the target is met (`f <= 0`) and whether the
/// bracket shrank below tolerance within the iteration budget.
fn brent<F>(
    f: &mut F,
    (mut a, mut fa): (f64, f64),
    (mut b, mut fb): (f64, f64),
    config: &SolverConfig,
) -> EngineResult<(f64, bool)>
where
    F: FnMut(f64) -> EngineResult<f64>,
{
    let mut c = a;
    let mut fc = fa;
    let mut d = b - a;
    let mut e = d;

    for _ in 0..config.max_iterations {
        if (fb > 0.0) == (fc > 0.0) {
            c = a;
            fc = fa;
            d = b - a;
            e = d;
        }
        if fc.abs() < fb.abs() {
            a = b;
            b = c;
            c = a;
            fa = fb;
            fb = fc;
            fc = fa;
        }

        let tol = 2.0 * f64::EPSILON * b.abs() + 0.5 * tolerance(config, b);
        let midpoint = 0.5 * (c - b);
        if midpoint.abs() <= tol {
            return Ok((met_end((b, fb), (c, fc)), true));
        }

        // An exact zero may sit anywhere on a flat step; bisect toward its start.
        if fb != 0.0 && e.abs() >= tol && fa.abs() > fb.abs() {
            let s = fb / fa;
            let (mut p, mut q) = if a == c {
                (2.0 * midpoint * s, 1.0 - s)
            } else {
                let q = fa / fc;
                let r = fb / fc;
                (
                    s * (2.0 * midpoint * q * (q - r) - (b - a) * (r - 1.0)),
                    (q - 1.0) * (r - 1.0) * (s - 1.0),
                )
            };
            if p > 0.0 {
                q = -q;
            } else {
                p = -p;
            }
            if 2.0 * p < (3.0 * midpoint * q - (tol * q).abs()).min((e * q).abs()) {
                e = d;
                d = p / q;
            } else {
                d = midpoint;
                e = d;
            }
        } else {
            d = midpoint;
            e = d;
        }

        a = b;
        fa = fb;
        b += if d.abs() > tol { d } else { tol.copysign(midpoint) };
        fb = f(b)?;
    }

    Ok((met_end((b, fb), (c, fc)), false))
}

fn met_end((b, fb): (f64, f64), (c, fc): (f64, f64)) -> f64 {
    if fb <= 0.0 || fc > 0.0 { b } else { c }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::propagation::GroundAttenuation;

    fn rural_table() -> PropagationTable {
        PropagationTable::new(
            [
                (10, 80.0),
                (20, 73.0),
                (50, 64.0),
                (75, 60.0),
                (100, 57.0),
                (200, 49.0),
                (300, 44.0),
                (500, 38.0),
                (1000, 29.0),
            ]
            .into_iter()
            .map(|(distance, rural)| {
                (
                    distance,
                    GroundAttenuation {
                        rural: Some(rural),
                        ..GroundAttenuation::default()
                    },
                )
            }),
        )
    }

    fn solve(source: f64, target: f64, table: &PropagationTable) -> Option<f64> {
        solve_distance(
            source,
            target,
            PropagationType::Rural,
            table,
            &SolverConfig::default(),
            &mut TraceRecorder::disabled(),
        )
        .unwrap()
    }

    #[test]
    fn target_met_at_minimum_distance_returns_one_metre() {
        assert_eq!(solve(60.0, 70.0, &PropagationTable::default()), Some(1.0));
    }

    #[test]
    fn unreachable_target_returns_none_with_diagnostic() {
        let mut trace = TraceRecorder::new(true);
        let solved = solve_distance(
            150.0,
            -10.0,
            PropagationType::Rural,
            &rural_table(),
            &SolverConfig::default(),
            &mut trace,
        )
        .unwrap();
        assert_eq!(solved, None);

        let (_, trace) = trace.finish();
        assert_eq!(trace.unwrap().assumptions.len(), 1);
    }

    #[test]
    fn geometric_inverse_matches_closed_form() {
        // 100 dB SWL falls to 60 dB at 10^(40/20) = 100 m.
        let solved = solve(100.0, 60.0, &PropagationTable::default()).unwrap();
        assert!((solved - 100.0).abs() <= 0.15, "solved = {solved}");
    }

    #[test]
    fn quantized_table_resolves_to_start_of_step() {
        // 106.76 dB falls to 45 dB once the 300 m row is selected, which happens
        // from 250.5 m because the 250 m tie goes to the 200 m row.
        let source = 105.0 + 10.0 * (1.0 + 10_f64.powf(-0.3)).log10();
        let solved = solve(source, 45.0, &rural_table()).unwrap();
        assert!((250.5..=250.7).contains(&solved), "solved = {solved}");
    }

    #[test]
    fn target_on_a_table_step_resolves_to_start_of_step() {
        // 110 dB SWL gives exactly 60 dB once the 75 m row is selected (62.5 m).
        let solved = solve(110.0, 60.0, &rural_table()).unwrap();
        assert!((62.5..=62.7).contains(&solved), "solved = {solved}");
    }

    #[test]
    fn fallback_warnings_reach_caller_on_every_path() {
        let table = PropagationTable::default();
        for (source, target) in [(60.0, 70.0), (150.0, -10.0), (100.0, 60.0)] {
            let mut trace = TraceRecorder::disabled();
            solve_distance(
                source,
                target,
                PropagationType::Rural,
                &table,
                &SolverConfig::default(),
                &mut trace,
            )
            .unwrap();
            assert_eq!(trace.warnings().len(), 1, "{source} -> {target}");
            assert!(trace.warnings()[0].contains("geometric spreading"));
        }
    }

    #[test]
    fn solved_distance_meets_target() {
        let table = rural_table();
        let solved = solve(100.0, 50.0, &table).unwrap();
        let level = propagate(
            100.0,
            solved + 0.1,
            PropagationType::Rural,
            &table,
            &mut TraceRecorder::disabled(),
        )
        .unwrap();
        assert!(level <= 50.0);
    }

    proptest! {
        #[test]
        fn solve_inverts_propagate(source in 70.0_f64..130.0, distance in 1.5_f64..995.0) {
            let table = PropagationTable::default();
            let target = propagate(
                source,
                distance,
                PropagationType::Urban,
                &table,
                &mut TraceRecorder::disabled(),
            ).unwrap();
            let solved = solve_distance(
                source,
                target,
                PropagationType::Urban,
                &table,
                &SolverConfig::default(),
                &mut TraceRecorder::disabled(),
            ).unwrap();
            let solved = solved.expect("target inside domain");
            prop_assert!((solved - distance).abs() <= 0.5, "solved {} for {}", solved, distance);
        }
    }
}
