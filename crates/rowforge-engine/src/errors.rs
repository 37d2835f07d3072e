use thiserror::Error;

use rowforge_core::ResolveError;

use crate::model::RowFailure;

/// Errors that abort a generation run.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Cyclic or missing dependency, detected before any worker exists.
    #[error("configuration error: {0}")]
    Config(#[from] ResolveError),
    /// First row failure under the fail-fast policy.
    #[error("row {} failed in plugin '{}': {}", .0.row_index, .0.plugin_id, .0.message)]
    RowFailed(RowFailure),
    #[error("row task failed: {0}")]
    Join(String),
}
