use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::compile::{
    CompileFailure, WorkerCompiler, expected_artifact_name, hashed_artifact_name,
};
use crate::discover::DiscoveredPlugin;
use crate::errors::BuildError;
use crate::manifest::{Manifest, ManifestEntry};

type ChangeListener = Box<dyn Fn(&ManifestEntry) + Send + Sync>;

/// Result of building one plugin.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub entry: ManifestEntry,
    /// False when the compiled output was byte-identical to the last build.
    pub changed: bool,
}

/// Summary of one build pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildReport {
    pub built: Vec<String>,
    pub unchanged: Vec<String>,
    pub failed: Vec<CompileFailure>,
}

impl BuildReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Content-addressed incremental build cache for worker artifacts.
///
/// Owns the manifest for the duration of a build pass: created from the
/// persisted manifest at start, mutated only through `build_if_changed`,
/// and read-only everywhere else. Build passes are not reentrant.
pub struct BuildCache {
    out_dir: PathBuf,
    manifest_path: PathBuf,
    manifest: Manifest,
    compiler: Box<dyn WorkerCompiler>,
    listeners: Vec<ChangeListener>,
}

impl BuildCache {
    /// Open a cache over `out_dir`, loading the prior manifest so content
    /// hashes survive across build passes.
    pub fn new(
        out_dir: impl Into<PathBuf>,
        manifest_path: impl Into<PathBuf>,
        compiler: Box<dyn WorkerCompiler>,
    ) -> Result<Self, BuildError> {
        let out_dir = out_dir.into();
        let manifest_path = manifest_path.into();
        std::fs::create_dir_all(&out_dir)?;
        let manifest = Manifest::load(&manifest_path)?;
        Ok(Self {
            out_dir,
            manifest_path,
            manifest,
            compiler,
            listeners: Vec::new(),
        })
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Register a listener invoked exactly once per changed plugin, e.g. to
    /// refresh an in-memory map without a full reload.
    pub fn on_change(&mut self, listener: impl Fn(&ManifestEntry) + Send + Sync + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Compile one plugin and refresh its artifact only if the compiled
    /// output changed.
    ///
    /// The compile step always runs to produce bytes for comparison; hash
    /// equality against the recorded entry is the sole "unchanged"
    /// criterion. Unchanged output skips every downstream step: no artifact
    /// write, no manifest update, no change notification.
    pub fn build_if_changed(
        &mut self,
        plugin: &DiscoveredPlugin,
    ) -> Result<BuildOutcome, BuildError> {
        let id = plugin.descriptor.id.as_str();
        let role = plugin.descriptor.role;
        let bytes = self.compiler.compile(plugin)?;
        let content_hash = hex::encode(Sha256::digest(&bytes));

        if let Some(prior) = self.manifest.entry(id) {
            if prior.content_hash == content_hash {
                debug!(plugin_id = %id, hash = %content_hash, "artifact unchanged");
                return Ok(BuildOutcome {
                    entry: prior.clone(),
                    changed: false,
                });
            }
        }

        let staging = self.out_dir.join(expected_artifact_name(id, role));
        std::fs::write(&staging, &bytes)?;

        let artifact_name = hashed_artifact_name(id, role, &content_hash);
        std::fs::write(self.out_dir.join(&artifact_name), &bytes)?;

        let entry = ManifestEntry {
            plugin_id: id.to_string(),
            role,
            content_hash,
            artifact_name,
        };
        self.manifest.insert(entry.clone());
        for listener in &self.listeners {
            listener(&entry);
        }
        info!(
            plugin_id = %id,
            artifact = %entry.artifact_name,
            "worker artifact rebuilt"
        );

        Ok(BuildOutcome {
            entry,
            changed: true,
        })
    }

    /// Build every worker-backed plugin in `plugins`, then persist the
    /// manifest.
    ///
    /// A compile failure is isolated to its plugin: it is recorded in the
    /// report and the plugin's prior manifest entry, if any, stays usable.
    /// A manifest write failure is fatal for the pass.
    pub fn build_all(&mut self, plugins: &[DiscoveredPlugin]) -> Result<BuildReport, BuildError> {
        let mut report = BuildReport::default();

        for plugin in plugins.iter().filter(|plugin| plugin.is_worker_backed()) {
            let id = plugin.descriptor.id.clone();
            match self.build_if_changed(plugin) {
                Ok(outcome) if outcome.changed => report.built.push(id),
                Ok(_) => report.unchanged.push(id),
                Err(BuildError::Compile(failure)) => {
                    warn!(plugin_id = %failure.plugin_id, error = %failure.message, "plugin build failed");
                    report.failed.push(failure);
                }
                Err(other) => return Err(other),
            }
        }

        self.save_manifest()?;
        info!(
            built = report.built.len(),
            unchanged = report.unchanged.len(),
            failed = report.failed.len(),
            "build pass finished"
        );
        Ok(report)
    }

    pub fn save_manifest(&mut self) -> Result<(), BuildError> {
        self.manifest.save(&self.manifest_path)
    }
}
