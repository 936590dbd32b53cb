use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "noise-estimator",
    version,
    about = "Construction noise impact estimation against versioned datasets"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one estimation request.
    Estimate(EstimateArgs),
    /// List dataset bundles with their digests.
    Datasets(DatasetsArgs),
    /// Summarize one dataset version.
    Info(InfoArgs),
    /// Print a dataset catalog.
    List(ListArgs),
    /// Check dataset completeness and replay its worked examples.
    Validate(ValidateArgs),
}

#[derive(Args, Debug, Clone)]
pub struct DatasetSelection {
    #[arg(long, default_value = "datasets")]
    pub dataset_dir: PathBuf,

    /// Defaults to the latest version under the dataset directory.
    #[arg(long)]
    pub dataset_version: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct PolicyArgs {
    /// JSON policy file; omitted fields keep their defaults.
    #[arg(long)]
    pub policy_path: Option<PathBuf>,

    #[arg(long)]
    pub highly_affected_margin_db: Option<f64>,

    #[arg(long)]
    pub default_distance_m: Option<f64>,
}

#[derive(Args, Debug, Clone)]
pub struct EstimateArgs {
    #[command(flatten)]
    pub dataset: DatasetSelection,

    #[command(flatten)]
    pub policy: PolicyArgs,

    /// Request JSON file.
    #[arg(long)]
    pub input: PathBuf,

    /// Write the result JSON here instead of stdout.
    #[arg(long)]
    pub output: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Record the calculation trace regardless of the request flag.
    #[arg(long, default_value_t = false)]
    pub trace: bool,
}

#[derive(Args, Debug, Clone)]
pub struct DatasetsArgs {
    #[arg(long, default_value = "datasets")]
    pub dataset_dir: PathBuf,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct InfoArgs {
    #[command(flatten)]
    pub dataset: DatasetSelection,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ListKind {
    Categories,
    Scenarios,
    Plants,
    Measures,
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    #[arg(value_enum)]
    pub kind: ListKind,

    #[command(flatten)]
    pub dataset: DatasetSelection,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub dataset: DatasetSelection,

    #[command(flatten)]
    pub policy: PolicyArgs,

    #[arg(long, default_value_t = 0.2)]
    pub tolerance_db: f64,

    #[arg(long)]
    pub report_path: Option<PathBuf>,
}
