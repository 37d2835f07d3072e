use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Role of a plugin within the generation pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PluginRole {
    DataType,
    ExportType,
    Country,
    CoreUtility,
}

impl PluginRole {
    /// Fixed prefix used when rendering artifact names for this role.
    ///
    /// Render-only: role identity always travels as an explicit field and
    /// is never parsed back out of a file name.
    pub fn artifact_prefix(&self) -> &'static str {
        match self {
            PluginRole::DataType => "DT",
            PluginRole::ExportType => "ET",
            PluginRole::Country => "C",
            PluginRole::CoreUtility => "CORE",
        }
    }
}

/// Static metadata describing one plugin.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PluginDescriptor {
    /// Unique identifier of the plugin.
    pub id: String,
    /// Role the plugin plays in the pipeline.
    pub role: PluginRole,
    /// Plugin ids this plugin may read from when generating a cell.
    ///
    /// Declarative, not deduced: the resolver trusts this list verbatim.
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// Deterministic registry of plugin descriptors keyed by id.
///
/// Populated while plugins are discovered; read-only during a generation
/// run.
#[derive(Debug, Clone, Default)]
pub struct PluginCatalog {
    descriptors: BTreeMap<String, PluginDescriptor>,
}

impl PluginCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor, replacing any previous entry with the same id.
    pub fn register(&mut self, descriptor: PluginDescriptor) {
        self.descriptors.insert(descriptor.id.clone(), descriptor);
    }

    pub fn get(&self, id: &str) -> Option<&PluginDescriptor> {
        self.descriptors.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.descriptors.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PluginDescriptor> {
        self.descriptors.values()
    }
}

impl FromIterator<PluginDescriptor> for PluginCatalog {
    fn from_iter<I: IntoIterator<Item = PluginDescriptor>>(iter: I) -> Self {
        let mut catalog = Self::new();
        for descriptor in iter {
            catalog.register(descriptor);
        }
        catalog
    }
}
