use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use tracing::{debug, info};

use super::Dataset;
use crate::error::{EngineError, EngineResult, EntityKind};
use crate::util::sha256_hex;

pub const BUNDLE_FILE: &str = "dataset.json";
/// Optional sidecar holding the expected SHA-256 of the bundle, in
/// `sha256sum` format or as a bare digest.
pub const CHECKSUM_FILE: &str = "dataset.json.sha256";

/// Version labels double as directory names, so separators and a leading dot
/// are rejected.
pub fn is_valid_version(version: &str) -> bool {
    let mut chars = version.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphanumeric() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// Dataset bundles under `<root>/<version>/dataset.json`, parsed at most once
/// per version and shared read-only afterwards.
#[derive(Debug)]
pub struct DatasetStore {
    root: PathBuf,
    cache: RwLock<HashMap<String, Arc<Dataset>>>,
}

impl DatasetStore {
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn bundle_path(&self, version: &str) -> PathBuf {
        self.root.join(version).join(BUNDLE_FILE)
    }

    /// Version directories holding a bundle, in ascending order.
    pub fn list_versions(&self) -> EngineResult<Vec<String>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(EngineError::BundleIo {
                    path: self.root.clone(),
                    source,
                });
            }
        };

        let mut versions = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| EngineError::BundleIo {
                path: self.root.clone(),
                source,
            })?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if is_valid_version(&name) && entry.path().join(BUNDLE_FILE).is_file() {
                versions.push(name);
            }
        }
        versions.sort();
        Ok(versions)
    }

    pub fn latest_version(&self) -> EngineResult<String> {
        self.list_versions()?
            .pop()
            .ok_or_else(|| EngineError::not_found(EntityKind::DatasetVersion, "latest"))
    }

    /// Loads `version`, or the latest available version when `None`.
    pub fn load(&self, version: Option<&str>) -> EngineResult<Arc<Dataset>> {
        let version = match version {
            Some(version) => version.to_string(),
            None => self.latest_version()?,
        };
        if !is_valid_version(&version) {
            return Err(EngineError::validation(
                "dataset_version",
                format!("`{version}` is not a valid version label"),
            ));
        }

        if let Some(dataset) = self.read_cache().get(&version) {
            debug!(version = %version, "dataset cache hit");
            return Ok(Arc::clone(dataset));
        }

        let dataset = Arc::new(self.read_bundle(&version)?);

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        let shared = cache
            .entry(version.clone())
            .or_insert_with(|| Arc::clone(&dataset));
        Ok(Arc::clone(shared))
    }

    pub fn clear(&self) {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn cached_versions(&self) -> Vec<String> {
        let mut versions: Vec<String> = self.read_cache().keys().cloned().collect();
        versions.sort();
        versions
    }

    fn read_cache(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<Dataset>>> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_bundle(&self, version: &str) -> EngineResult<Dataset> {
        let path = self.bundle_path(version);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(EngineError::not_found(EntityKind::DatasetVersion, version));
            }
            Err(source) => return Err(EngineError::BundleIo { path, source }),
        };

        let checksum_path = path.with_file_name(CHECKSUM_FILE);
        match fs::read_to_string(&checksum_path) {
            Ok(contents) => {
                let expected = contents.split_whitespace().next().unwrap_or_default();
                let actual = sha256_hex(&bytes);
                if !expected.eq_ignore_ascii_case(&actual) {
                    return Err(EngineError::invalid_bundle(
                        version,
                        format!("checksum mismatch: expected {expected}, found {actual}"),
                    ));
                }
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(EngineError::BundleIo {
                    path: checksum_path,
                    source,
                });
            }
        }

        let dataset = Dataset::from_slice(&bytes, &path)?;
        if dataset.version() != version {
            return Err(EngineError::invalid_bundle(
                version,
                format!("bundle declares version {}", dataset.version()),
            ));
        }

        info!(
            version = %version,
            tables = dataset.table_names().count(),
            content_hash = %dataset.content_hash(),
            "loaded dataset bundle"
        );
        Ok(dataset)
    }
}
