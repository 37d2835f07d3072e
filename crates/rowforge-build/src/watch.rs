use std::collections::BTreeSet;
use std::path::Path;
use std::sync::mpsc;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, warn};

use crate::cache::BuildCache;
use crate::discover::DiscoveredPlugin;
use crate::errors::BuildError;

/// Watch the plugin tree and rebuild exactly the plugin a change belongs
/// to, leaving unaffected plugins untouched.
///
/// Blocks until the watcher channel closes.
pub fn watch_plugins(
    plugins_root: &Path,
    cache: &mut BuildCache,
    plugins: &[DiscoveredPlugin],
) -> Result<(), BuildError> {
    let (tx, rx) = mpsc::channel();
    let mut watcher = RecommendedWatcher::new(
        move |result: Result<Event, notify::Error>| {
            if let Ok(event) = result {
                let _ = tx.send(event);
            }
        },
        Config::default(),
    )
    .map_err(|err| BuildError::Watch(err.to_string()))?;

    watcher
        .watch(plugins_root, RecursiveMode::Recursive)
        .map_err(|err| BuildError::Watch(err.to_string()))?;

    info!(root = %plugins_root.display(), "watching plugins for changes");

    while let Ok(event) = rx.recv() {
        let mut touched: BTreeSet<&str> = BTreeSet::new();
        for path in &event.paths {
            for plugin in plugins {
                if path.starts_with(&plugin.dir) {
                    touched.insert(plugin.descriptor.id.as_str());
                }
            }
        }

        for id in touched {
            let Some(plugin) = plugins.iter().find(|p| p.descriptor.id == id) else {
                continue;
            };
            if !plugin.is_worker_backed() {
                debug!(plugin_id = %id, "inline plugin changed, nothing to rebuild");
                continue;
            }
            match cache.build_if_changed(plugin) {
                Ok(outcome) if outcome.changed => {
                    cache.save_manifest()?;
                    info!(plugin_id = %id, artifact = %outcome.entry.artifact_name, "rebuilt");
                }
                Ok(_) => debug!(plugin_id = %id, "compiled output unchanged"),
                Err(BuildError::Compile(failure)) => {
                    warn!(plugin_id = %failure.plugin_id, error = %failure.message, "rebuild failed");
                }
                Err(other) => return Err(other),
            }
        }
    }

    Ok(())
}
