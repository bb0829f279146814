//! Error types for artifact loading

use crate::error::AppError;
use std::path::{Path, PathBuf};

/// Result type for artifact operations
pub type ArtifactResult<T> = std::result::Result<T, ArtifactError>;

/// Reasons a single artifact failed to load
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    /// File or directory missing at the fixed path
    #[error("not found at {0}")]
    NotFound(PathBuf),

    /// File present but undecodable
    #[error("corrupt artifact at {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// File decoded but its contents are inconsistent with what the engine expects
    #[error("incompatible artifact at {path}: {reason}")]
    Incompatible { path: PathBuf, reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ArtifactError {
    pub fn corrupt(path: &Path, reason: impl ToString) -> Self {
        ArtifactError::Corrupt {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub fn incompatible(path: &Path, reason: impl ToString) -> Self {
        ArtifactError::Incompatible {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

impl From<ArtifactError> for AppError {
    fn from(err: ArtifactError) -> Self {
        match err {
            ArtifactError::Io(err) => AppError::Io(err),
            ArtifactError::NotFound(path) => AppError::NotFound(path.display().to_string()),
            other => AppError::Artifact {
                artifact: "model".to_string(),
                message: other.to_string(),
            },
        }
    }
}

/// Read and decode a JSON artifact from a fixed path
pub(crate) fn read_json_artifact<T: serde::de::DeserializeOwned>(path: &Path) -> ArtifactResult<T> {
    if !path.exists() {
        return Err(ArtifactError::NotFound(path.to_path_buf()));
    }
    let bytes = std::fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(|e| ArtifactError::corrupt(path, e))
}
