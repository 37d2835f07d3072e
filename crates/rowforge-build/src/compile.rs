use serde::{Deserialize, Serialize};
use thiserror::Error;

use rowforge_core::PluginRole;

use crate::discover::DiscoveredPlugin;

/// Number of content-hash hex chars embedded in artifact names.
const NAME_HASH_LEN: usize = 12;

/// One plugin's compile failure, isolated from the rest of the build pass.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[error("compile failed for plugin '{plugin_id}': {message}")]
pub struct CompileFailure {
    pub plugin_id: String,
    pub message: String,
}

impl CompileFailure {
    pub fn new(plugin_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            message: message.into(),
        }
    }
}

/// Opaque "compile plugin source into artifact bytes" capability.
///
/// The cache never looks inside the bytes; it only hashes them.
pub trait WorkerCompiler: Send + Sync {
    fn compile(&self, plugin: &DiscoveredPlugin) -> Result<Vec<u8>, CompileFailure>;
}

/// Passthrough compiler: the generator source bytes are the artifact.
///
/// Stands in for an external bundler; used by the CLI and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyCompiler;

impl WorkerCompiler for CopyCompiler {
    fn compile(&self, plugin: &DiscoveredPlugin) -> Result<Vec<u8>, CompileFailure> {
        let source = plugin.generator_source.as_ref().ok_or_else(|| {
            CompileFailure::new(&plugin.descriptor.id, "plugin has no generator source")
        })?;
        std::fs::read(source)
            .map_err(|err| CompileFailure::new(&plugin.descriptor.id, err.to_string()))
    }
}

/// Fixed pre-hash artifact name for a plugin, keyed by id and role.
///
/// This is where the compile step stages its output, so the expected name
/// is always computable before any hash exists.
pub fn expected_artifact_name(id: &str, role: PluginRole) -> String {
    format!("{}-{id}.generator.bin", role.artifact_prefix())
}

/// Content-addressed artifact name: identical bytes always map to the same
/// name.
pub fn hashed_artifact_name(id: &str, role: PluginRole, content_hash: &str) -> String {
    let short = &content_hash[..content_hash.len().min(NAME_HASH_LEN)];
    format!("{}-{id}.generator.{short}.bin", role.artifact_prefix())
}
