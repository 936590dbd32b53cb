use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use noise_estimator::dataset::{Dataset, DatasetStore};
use noise_estimator::policy::EnginePolicy;
use noise_estimator::util::read_json;

use crate::cli::{DatasetSelection, PolicyArgs};

pub mod datasets;
pub mod estimate;
pub mod info;
pub mod list;
pub mod validate;

pub(crate) fn load_policy(args: &PolicyArgs) -> Result<EnginePolicy> {
    let mut policy = match &args.policy_path {
        Some(path) => read_json::<EnginePolicy>(path)
            .with_context(|| format!("failed to load policy {}", path.display()))?,
        None => EnginePolicy::default(),
    };
    if let Some(margin) = args.highly_affected_margin_db {
        policy.highly_affected_margin_db = margin;
    }
    if let Some(distance) = args.default_distance_m {
        policy.default_calculation_distance_m = distance;
    }
    policy.validate().context("invalid engine policy")?;
    Ok(policy)
}

pub(crate) fn open_dataset(selection: &DatasetSelection) -> Result<Arc<Dataset>> {
    let store = DatasetStore::open(&selection.dataset_dir);
    let dataset = store
        .load(selection.dataset_version.as_deref())
        .with_context(|| {
            format!(
                "failed to load dataset {} from {}",
                selection.dataset_version.as_deref().unwrap_or("(latest)"),
                selection.dataset_dir.display()
            )
        })?;
    info!(version = %dataset.version(), "using dataset");
    Ok(dataset)
}

pub(crate) fn write_json_stdout<T: Serialize>(value: &T) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    serde_json::to_writer_pretty(&mut output, value).context("failed to serialize json output")?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}
