use std::path::{Path, PathBuf};

use tracing::debug;

use rowforge_core::{PluginDescriptor, PluginRole};

use crate::errors::BuildError;

/// File that marks a plugin as worker-backed. Absence means the plugin
/// runs inline, which is a valid, simpler case.
const GENERATOR_MARKER: &str = "generator.src";

/// Descriptor file expected in every plugin folder.
const DESCRIPTOR_FILE: &str = "plugin.json";

const COLLECTIONS: [(&str, PluginRole); 4] = [
    ("core", PluginRole::CoreUtility),
    ("data_types", PluginRole::DataType),
    ("export_types", PluginRole::ExportType),
    ("countries", PluginRole::Country),
];

/// One plugin found on disk.
#[derive(Debug, Clone)]
pub struct DiscoveredPlugin {
    pub descriptor: PluginDescriptor,
    /// Plugin folder.
    pub dir: PathBuf,
    /// Generator source when the plugin is worker-backed.
    pub generator_source: Option<PathBuf>,
}

impl DiscoveredPlugin {
    pub fn is_worker_backed(&self) -> bool {
        self.generator_source.is_some()
    }
}

/// Scan the plugin tree under `plugins_root`.
///
/// Expects `<root>/{core,data_types,export_types,countries}/<id>/` with a
/// `plugin.json` descriptor per plugin; missing collection directories are
/// skipped. Results are ordered by collection, then by plugin id, so build
/// order is deterministic.
pub fn discover_plugins(plugins_root: &Path) -> Result<Vec<DiscoveredPlugin>, BuildError> {
    let mut plugins = Vec::new();

    for (collection, role) in COLLECTIONS {
        let collection_dir = plugins_root.join(collection);
        if !collection_dir.is_dir() {
            continue;
        }

        let mut entries: Vec<PathBuf> = std::fs::read_dir(&collection_dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect();
        entries.sort();

        for dir in entries {
            plugins.push(read_plugin(&dir, role)?);
        }
    }

    debug!(count = plugins.len(), "discovered plugins");
    Ok(plugins)
}

fn read_plugin(dir: &Path, role: PluginRole) -> Result<DiscoveredPlugin, BuildError> {
    let descriptor_path = dir.join(DESCRIPTOR_FILE);
    let contents = std::fs::read_to_string(&descriptor_path).map_err(|err| {
        BuildError::InvalidDescriptor {
            path: descriptor_path.clone(),
            message: err.to_string(),
        }
    })?;
    let descriptor: PluginDescriptor =
        serde_json::from_str(&contents).map_err(|err| BuildError::InvalidDescriptor {
            path: descriptor_path.clone(),
            message: err.to_string(),
        })?;

    if descriptor.role != role {
        return Err(BuildError::InvalidDescriptor {
            path: descriptor_path.clone(),
            message: format!(
                "descriptor role {:?} does not match collection role {:?}",
                descriptor.role, role
            ),
        });
    }

    let folder_name = dir.file_name().and_then(|name| name.to_str());
    if folder_name != Some(descriptor.id.as_str()) {
        return Err(BuildError::InvalidDescriptor {
            path: descriptor_path,
            message: format!(
                "descriptor id '{}' does not match folder name '{}'",
                descriptor.id,
                folder_name.unwrap_or("")
            ),
        });
    }

    let marker = dir.join(GENERATOR_MARKER);
    let generator_source = marker.is_file().then_some(marker);

    Ok(DiscoveredPlugin {
        descriptor,
        dir: dir.to_path_buf(),
        generator_source,
    })
}
