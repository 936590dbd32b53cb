use anyhow::Result;
use tracing::{info, warn};

use crate::cli::InfoArgs;
use crate::commands::{open_dataset, write_json_stdout};

pub fn run(args: InfoArgs) -> Result<()> {
    let dataset = open_dataset(&args.dataset)?;
    let summary = dataset.info();

    if args.json {
        return write_json_stdout(&summary);
    }

    info!(
        version = %summary.version,
        source_hash = %summary.source_hash,
        content_hash = %summary.content_hash,
        workbook = %summary.workbook_name.as_deref().unwrap_or_default(),
        extracted_at = %summary.extraction_timestamp,
        tables = summary.table_names.len(),
        categories = summary.category_count,
        scenarios = summary.scenario_count,
        plants = summary.plant_count,
        measures = summary.measure_count,
        propagation_rows = summary.propagation_rows,
        worked_examples = summary.worked_example_count,
        "dataset summary"
    );

    if summary.validation_issues.is_empty() {
        info!("no validation issues");
    }
    for issue in &summary.validation_issues {
        warn!(issue = %issue, "validation issue");
    }

    Ok(())
}
