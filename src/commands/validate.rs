use anyhow::{Result, bail};
use serde::Serialize;
use tracing::{info, warn};

use noise_estimator::util::write_json_pretty;
use noise_estimator::worked_examples::{ReplayReport, replay};

use crate::cli::ValidateArgs;
use crate::commands::{load_policy, open_dataset};

#[derive(Debug, Serialize)]
struct ValidationReport {
    dataset_version: String,
    content_hash: String,
    issues: Vec<String>,
    worked_examples: ReplayReport,
}

pub fn run(args: ValidateArgs) -> Result<()> {
    let policy = load_policy(&args.policy)?;
    let dataset = open_dataset(&args.dataset)?;

    let issues = dataset.validate();
    for issue in &issues {
        warn!(issue = %issue, "dataset issue");
    }

    let replayed = replay(&dataset, &policy, args.tolerance_db);
    for outcome in replayed.outcomes.iter().filter(|outcome| !outcome.passed) {
        warn!(
            example = %outcome.id,
            mismatches = %outcome.mismatches.join("; "),
            error = %outcome.error.as_deref().unwrap_or_default(),
            "worked example failed"
        );
    }
    info!(
        version = %dataset.version(),
        issues = issues.len(),
        examples = replayed.total,
        passed = replayed.passed,
        failed = replayed.failed,
        tolerance_db = args.tolerance_db,
        "validation completed"
    );

    let report = ValidationReport {
        dataset_version: dataset.version().to_string(),
        content_hash: dataset.content_hash().to_string(),
        issues,
        worked_examples: replayed,
    };
    if let Some(path) = &args.report_path {
        write_json_pretty(path, &report)?;
        info!(path = %path.display(), "wrote validation report");
    }

    if !report.issues.is_empty() || !report.worked_examples.all_passed() {
        bail!(
            "dataset {} failed validation: {} issues, {} failing worked examples",
            report.dataset_version,
            report.issues.len(),
            report.worked_examples.failed
        );
    }
    Ok(())
}
