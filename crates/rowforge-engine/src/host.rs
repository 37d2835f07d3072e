use std::path::{Path, PathBuf};

use thiserror::Error;

use rowforge_core::{CellValue, GenerateRequest, WorkerResources};

/// Failure raised by plugin code; opaque to the core.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct PluginError {
    pub message: String,
}

impl PluginError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// One plugin's generation behavior.
///
/// Lives inside a worker task (or is called directly on the inline bypass
/// path); never shared between execution units.
pub trait CellGenerator: Send {
    /// Load shared utility code. Invoked at most once per worker lifetime.
    fn bootstrap(&mut self, _resources: &WorkerResources) -> Result<(), PluginError> {
        Ok(())
    }

    /// Generate one cell.
    fn generate(&mut self, request: &GenerateRequest) -> Result<CellValue, PluginError>;
}

/// Errors instantiating a generator from an artifact or inline.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("artifact not found: {0}")]
    ArtifactNotFound(PathBuf),
    #[error("unknown plugin '{0}'")]
    UnknownPlugin(String),
    #[error("malformed artifact for plugin '{plugin_id}': {message}")]
    Malformed { plugin_id: String, message: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Opaque capability that turns artifacts (or bare plugin ids) into live
/// generators.
pub trait PluginHost: Send + Sync {
    /// Instantiate a generator from a compiled worker artifact.
    fn load_worker(
        &self,
        plugin_id: &str,
        artifact: &Path,
    ) -> Result<Box<dyn CellGenerator>, LoadError>;

    /// Instantiate a generator for a plugin with no worker artifact.
    ///
    /// This is the bypass path: the engine calls the generator directly,
    /// with no message round-trip.
    fn load_inline(&self, plugin_id: &str) -> Result<Box<dyn CellGenerator>, LoadError>;
}
