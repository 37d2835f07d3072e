use std::path::PathBuf;

use thiserror::Error;

use crate::compile::CompileFailure;

/// Errors emitted by the build cache.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Compile(#[from] CompileFailure),
    #[error("invalid plugin descriptor at {path}: {message}")]
    InvalidDescriptor { path: PathBuf, message: String },
    #[error("failed to write manifest at {path}: {source}")]
    ManifestWrite {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("watch error: {0}")]
    Watch(String),
}
