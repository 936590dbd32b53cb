use std::io::{self, Write};

use anyhow::{Context, Result};
use tracing::info;

use noise_estimator::calculator::NoiseCalculator;
use noise_estimator::dataset::DatasetStore;
use noise_estimator::model::{EstimationRequest, EstimationResult, SelectedMeasure};
use noise_estimator::util::{read_json, write_json_pretty};

use crate::cli::EstimateArgs;
use crate::commands::{load_policy, write_json_stdout};

pub fn run(args: EstimateArgs) -> Result<()> {
    let mut request: EstimationRequest = read_json(&args.input)?;
    if args.trace {
        request.include_trace = true;
    }
    if let Some(version) = &args.dataset.dataset_version {
        request.dataset_version = Some(version.clone());
    }

    let policy = load_policy(&args.policy)?;
    let store = DatasetStore::open(&args.dataset.dataset_dir);
    let calculator = NoiseCalculator::with_policy(&store, policy)?;
    let result = calculator
        .calculate(&request)
        .with_context(|| format!("estimation failed for {}", args.input.display()))?;

    info!(
        version = %result.dataset_version,
        predicted_level_db = result.predicted_level_db,
        impact_band = result.impact_band.as_str(),
        warnings = result.warnings.len(),
        "estimation completed"
    );

    if let Some(path) = &args.output {
        write_json_pretty(path, &result)?;
        info!(path = %path.display(), "wrote estimation result");
        return Ok(());
    }

    if args.json {
        write_json_stdout(&result)
    } else {
        write_text_result(&result)
    }
}

fn write_text_result(result: &EstimationResult) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());

    writeln!(
        output,
        "Dataset: {} (source {})",
        result.dataset_version, result.source_hash
    )?;
    writeln!(
        output,
        "Assessment: {} / {} at {} m",
        result.assessment_type.as_str(),
        result.calculation_mode.as_str(),
        result.calculation_distance_m
    )?;
    writeln!(output, "Source level: {:.1} dB(A) SWL", result.source_level_db)?;
    writeln!(output, "Predicted level: {:.1} dB(A)", result.predicted_level_db)?;
    writeln!(
        output,
        "Background: {:.1} dB(A) (exceeded by {:.1})",
        result.background_db, result.exceed_background_db
    )?;
    writeln!(
        output,
        "NML: {:.1} dB(A) (exceeded by {:.1})",
        result.nml_db, result.exceed_nml_db
    )?;
    writeln!(output, "Impact: {}", result.impact_band.as_str())?;

    if let Some(distances) = &result.distances {
        writeln!(
            output,
            "Distances: background={} nml={} highly_affected={}",
            format_distance(distances.to_background_m),
            format_distance(distances.to_nml_m),
            format_distance(distances.to_highly_affected_m)
        )?;
    }

    write_measures(&mut output, "Standard measures", &result.standard_measures)?;
    write_measures(&mut output, "Additional measures", &result.additional_measures)?;

    for warning in &result.warnings {
        writeln!(output, "Warning: {warning}")?;
    }

    if let Some(trace) = &result.trace {
        writeln!(
            output,
            "Trace: {} tables, {} values, {} assumptions",
            trace.tables_used.len(),
            trace.intermediate_values.len(),
            trace.assumptions.len()
        )?;
        for assumption in &trace.assumptions {
            writeln!(output, "\tassumed: {assumption}")?;
        }
    }

    output.flush()?;
    Ok(())
}

fn write_measures(output: &mut impl Write, heading: &str, measures: &[SelectedMeasure]) -> Result<()> {
    writeln!(output, "{heading}: {}", measures.len())?;
    for measure in measures {
        match measure.reduction_db {
            Some(reduction) => writeln!(
                output,
                "\t{}\t{} (-{reduction:.1} dB)",
                measure.id, measure.title
            )?,
            None => writeln!(output, "\t{}\t{}", measure.id, measure.title)?,
        }
    }
    Ok(())
}

fn format_distance(distance: Option<f64>) -> String {
    match distance {
        Some(distance) => format!("{distance:.1} m"),
        None => "beyond range".to_string(),
    }
}
