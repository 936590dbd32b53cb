use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Kinds of dataset entities a lookup can miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    DatasetVersion,
    Table,
    NoiseCategory,
    Scenario,
    Plant,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DatasetVersion => "dataset version",
            Self::Table => "table",
            Self::NoiseCategory => "noise category",
            Self::Scenario => "scenario",
            Self::Plant => "plant",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid request field `{field}`: {message}")]
    Validation { field: &'static str, message: String },

    #[error("invalid input `{parameter}` = {value}: must be finite and greater than zero")]
    InvalidInput { parameter: &'static str, value: f64 },

    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    #[error("failed to read dataset bundle {}", path.display())]
    BundleIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed dataset bundle {}", path.display())]
    BundleFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("dataset {version} rejected: {reason}")]
    BundleInvalid { version: String, reason: String },
}

impl EngineError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn invalid_bundle(version: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BundleInvalid {
            version: version.into(),
            reason: reason.into(),
        }
    }

    /// True for errors the caller can fix by changing the request.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::InvalidInput { .. } | Self::NotFound { .. }
        )
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
