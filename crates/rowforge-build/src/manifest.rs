use std::collections::BTreeMap;
use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use rowforge_core::{CONTRACT_VERSION, PluginRole};

use crate::errors::BuildError;

/// Current build artifact for one plugin.
///
/// An entry is replaced wholesale whenever the content hash changes, never
/// mutated field-by-field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ManifestEntry {
    pub plugin_id: String,
    pub role: PluginRole,
    /// SHA-256 of the compiled artifact bytes, hex encoded.
    pub content_hash: String,
    /// Content-addressed physical file name under the artifacts directory.
    pub artifact_name: String,
}

/// Persisted mapping from plugin identity to its current build artifact.
///
/// Written only by the build cache; read-only at runtime.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Manifest {
    pub manifest_version: String,
    /// UTC timestamp of the last save.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
    /// Core generation workers and shared utilities.
    #[serde(default)]
    pub core: BTreeMap<String, ManifestEntry>,
    #[serde(default)]
    pub data_types: BTreeMap<String, ManifestEntry>,
    #[serde(default)]
    pub export_types: BTreeMap<String, ManifestEntry>,
    #[serde(default)]
    pub countries: BTreeMap<String, ManifestEntry>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            manifest_version: CONTRACT_VERSION.to_string(),
            generated_at: None,
            core: BTreeMap::new(),
            data_types: BTreeMap::new(),
            export_types: BTreeMap::new(),
            countries: BTreeMap::new(),
        }
    }
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    fn map_for(&self, role: PluginRole) -> &BTreeMap<String, ManifestEntry> {
        match role {
            PluginRole::CoreUtility => &self.core,
            PluginRole::DataType => &self.data_types,
            PluginRole::ExportType => &self.export_types,
            PluginRole::Country => &self.countries,
        }
    }

    fn map_for_mut(&mut self, role: PluginRole) -> &mut BTreeMap<String, ManifestEntry> {
        match role {
            PluginRole::CoreUtility => &mut self.core,
            PluginRole::DataType => &mut self.data_types,
            PluginRole::ExportType => &mut self.export_types,
            PluginRole::Country => &mut self.countries,
        }
    }

    /// Look up the current entry for a plugin id across all roles.
    pub fn entry(&self, plugin_id: &str) -> Option<&ManifestEntry> {
        [
            PluginRole::DataType,
            PluginRole::ExportType,
            PluginRole::Country,
            PluginRole::CoreUtility,
        ]
        .into_iter()
        .find_map(|role| self.map_for(role).get(plugin_id))
    }

    /// Replace the entry for the plugin named by `entry`.
    pub fn insert(&mut self, entry: ManifestEntry) {
        self.map_for_mut(entry.role)
            .insert(entry.plugin_id.clone(), entry);
    }

    pub fn is_empty(&self) -> bool {
        self.core.is_empty()
            && self.data_types.is_empty()
            && self.export_types.is_empty()
            && self.countries.is_empty()
    }

    /// Load a manifest from disk; a missing file yields an empty manifest.
    pub fn load(path: &Path) -> Result<Self, BuildError> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Persist the manifest. A write failure is fatal for the build pass.
    pub fn save(&mut self, path: &Path) -> Result<(), BuildError> {
        self.generated_at = Some(chrono::Utc::now().to_rfc3339());
        let contents = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, contents).map_err(|source| BuildError::ManifestWrite {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(plugin_id: &str, role: PluginRole, hash: &str) -> ManifestEntry {
        ManifestEntry {
            plugin_id: plugin_id.to_string(),
            role,
            content_hash: hash.to_string(),
            artifact_name: format!("{}-{plugin_id}.generator.{hash}.bin", role.artifact_prefix()),
        }
    }

    #[test]
    fn insert_routes_by_role_and_entry_finds_across_roles() {
        let mut manifest = Manifest::new();
        manifest.insert(entry("Composite", PluginRole::DataType, "aa"));
        manifest.insert(entry("json", PluginRole::ExportType, "bb"));
        manifest.insert(entry("worker_utils", PluginRole::CoreUtility, "cc"));

        assert_eq!(manifest.data_types.len(), 1);
        assert_eq!(manifest.export_types.len(), 1);
        assert_eq!(manifest.core.len(), 1);
        assert_eq!(
            manifest.entry("worker_utils").map(|e| e.content_hash.as_str()),
            Some("cc")
        );
        assert!(manifest.entry("nope").is_none());
    }

    #[test]
    fn insert_replaces_prior_entry() {
        let mut manifest = Manifest::new();
        manifest.insert(entry("Composite", PluginRole::DataType, "aa"));
        manifest.insert(entry("Composite", PluginRole::DataType, "bb"));

        assert_eq!(manifest.data_types.len(), 1);
        assert_eq!(
            manifest.entry("Composite").map(|e| e.content_hash.as_str()),
            Some("bb")
        );
    }

    #[test]
    fn manifest_round_trips_through_json() {
        let mut manifest = Manifest::new();
        manifest.insert(entry("Composite", PluginRole::DataType, "aa"));

        let json = serde_json::to_string(&manifest).expect("serialize");
        let back: Manifest = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.entry("Composite"), manifest.entry("Composite"));
    }
}
