use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::NaiveDateTime;
use regex::Regex;
use serde::Serialize;
use tracing::info;

use noise_estimator::dataset::{BUNDLE_FILE, DatasetStore};
use noise_estimator::util::{now_utc_string, sha256_file, write_json_pretty};

use crate::cli::DatasetsArgs;

#[derive(Debug, Clone, Serialize)]
pub struct DatasetEntry {
    pub version: String,
    /// Decoded from extractor-style version labels only.
    pub extracted_at: Option<String>,
    pub source_hash_prefix: Option<String>,
    pub size_bytes: u64,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub dataset_directory: String,
    pub dataset_count: usize,
    pub datasets: Vec<DatasetEntry>,
}

pub fn run(args: DatasetsArgs) -> Result<()> {
    let manifest = build_manifest(&args.dataset_dir)?;

    match &args.manifest_path {
        Some(path) => {
            write_json_pretty(path, &manifest)?;
            info!(path = %path.display(), "wrote dataset manifest");
        }
        None => {
            for entry in &manifest.datasets {
                println!(
                    "{}\t{}\t{} bytes\t{}",
                    entry.version,
                    entry.extracted_at.as_deref().unwrap_or("-"),
                    entry.size_bytes,
                    entry.sha256
                );
            }
        }
    }

    info!(dataset_count = manifest.dataset_count, "dataset listing completed");
    Ok(())
}

pub fn build_manifest(dataset_dir: &Path) -> Result<DatasetManifest> {
    let pattern = Regex::new(r"^(\d{8})_(\d{6})_([0-9a-fA-F]{8})$")
        .context("failed to compile version label regex")?;

    let store = DatasetStore::open(dataset_dir);
    let versions = store
        .list_versions()
        .with_context(|| format!("failed to list datasets in {}", dataset_dir.display()))?;

    if versions.is_empty() {
        bail!("no dataset bundles found in {}", dataset_dir.display());
    }

    let mut datasets = Vec::with_capacity(versions.len());
    for version in versions {
        let path = store.bundle_path(&version);
        let size_bytes = fs::metadata(&path)
            .with_context(|| format!("failed to inspect {}", path.display()))?
            .len();
        let sha256 = sha256_file(&path)?;
        let (extracted_at, source_hash_prefix) = match parse_version_label(&version, &pattern) {
            Some((extracted_at, prefix)) => (Some(extracted_at), Some(prefix)),
            None => (None, None),
        };

        datasets.push(DatasetEntry {
            version,
            extracted_at,
            source_hash_prefix,
            size_bytes,
            sha256,
        });
    }

    Ok(DatasetManifest {
        manifest_version: 1,
        generated_at: now_utc_string(),
        dataset_directory: dataset_dir.display().to_string(),
        dataset_count: datasets.len(),
        datasets,
    })
}

/// Splits `YYYYMMDD_HHMMSS_<hash8>` into an RFC 3339 timestamp and the hash
/// prefix.
fn parse_version_label(version: &str, pattern: &Regex) -> Option<(String, String)> {
    let captures = pattern.captures(version)?;
    let stamp = format!("{}{}", captures.get(1)?.as_str(), captures.get(2)?.as_str());
    let extracted_at = NaiveDateTime::parse_from_str(&stamp, "%Y%m%d%H%M%S")
        .ok()?
        .and_utc()
        .to_rfc3339();
    let prefix = captures.get(3)?.as_str().to_ascii_lowercase();
    Some((extracted_at, prefix))
}
