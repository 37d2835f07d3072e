use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rowforge_build::{
    BuildCache, CompileFailure, CopyCompiler, DiscoveredPlugin, Manifest, WorkerCompiler,
    discover_plugins,
};

fn temp_root(label: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("rowforge_build_{label}_{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(&dir).expect("create temp root");
    dir
}

fn write_plugin(
    root: &Path,
    collection: &str,
    id: &str,
    role: &str,
    dependencies: &[&str],
    generator: Option<&str>,
) {
    let dir = root.join("plugins").join(collection).join(id);
    fs::create_dir_all(&dir).expect("create plugin dir");
    let deps: Vec<String> = dependencies.iter().map(|dep| format!("\"{dep}\"")).collect();
    fs::write(
        dir.join("plugin.json"),
        format!(
            r#"{{"id":"{id}","role":"{role}","dependencies":[{}]}}"#,
            deps.join(",")
        ),
    )
    .expect("write descriptor");
    if let Some(source) = generator {
        fs::write(dir.join("generator.src"), source).expect("write generator source");
    }
}

fn open_cache(root: &Path, compiler: Box<dyn WorkerCompiler>) -> BuildCache {
    BuildCache::new(root.join("artifacts"), root.join("worker_manifest.json"), compiler)
        .expect("open cache")
}

struct FailingCompiler {
    fail_for: String,
}

impl WorkerCompiler for FailingCompiler {
    fn compile(&self, plugin: &DiscoveredPlugin) -> Result<Vec<u8>, CompileFailure> {
        if plugin.descriptor.id == self.fail_for {
            return Err(CompileFailure::new(&plugin.descriptor.id, "bundler exploded"));
        }
        CopyCompiler.compile(plugin)
    }
}

#[test]
fn discovery_classifies_worker_backed_and_inline_plugins() {
    let root = temp_root("discover");
    write_plugin(&root, "data_types", "Alphanumeric", "data_type", &[], Some("alpha v1"));
    write_plugin(
        &root,
        "data_types",
        "Composite",
        "data_type",
        &["Alphanumeric"],
        Some("composite v1"),
    );
    write_plugin(&root, "data_types", "AutoIncrement", "data_type", &[], None);
    write_plugin(&root, "export_types", "json", "export_type", &[], Some("json v1"));

    let plugins = discover_plugins(&root.join("plugins")).expect("discover");
    let ids: Vec<&str> = plugins.iter().map(|p| p.descriptor.id.as_str()).collect();
    assert_eq!(ids, vec!["Alphanumeric", "AutoIncrement", "Composite", "json"]);

    let auto_increment = plugins
        .iter()
        .find(|p| p.descriptor.id == "AutoIncrement")
        .expect("AutoIncrement");
    assert!(!auto_increment.is_worker_backed());
    assert!(plugins.iter().filter(|p| p.is_worker_backed()).count() == 3);

    let composite = plugins
        .iter()
        .find(|p| p.descriptor.id == "Composite")
        .expect("Composite");
    assert_eq!(composite.descriptor.dependencies, vec!["Alphanumeric"]);
}

#[test]
fn identical_output_is_not_rebuilt_and_does_not_notify() {
    let root = temp_root("unchanged");
    write_plugin(&root, "data_types", "Alphanumeric", "data_type", &[], Some("alpha v1"));
    let plugins = discover_plugins(&root.join("plugins")).expect("discover");

    let notifications = Arc::new(AtomicUsize::new(0));

    let mut cache = open_cache(&root, Box::new(CopyCompiler));
    let counter = Arc::clone(&notifications);
    cache.on_change(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let first = cache.build_all(&plugins).expect("first build");
    assert_eq!(first.built, vec!["Alphanumeric".to_string()]);
    assert_eq!(notifications.load(Ordering::SeqCst), 1);

    let entry_after_first = cache.manifest().entry("Alphanumeric").expect("entry").clone();

    let second = cache.build_all(&plugins).expect("second build");
    assert!(second.built.is_empty());
    assert_eq!(second.unchanged, vec!["Alphanumeric".to_string()]);
    assert_eq!(notifications.load(Ordering::SeqCst), 1, "no second notification");

    let entry_after_second = cache.manifest().entry("Alphanumeric").expect("entry");
    assert_eq!(entry_after_second.content_hash, entry_after_first.content_hash);
    assert_eq!(entry_after_second.artifact_name, entry_after_first.artifact_name);
}

#[test]
fn changed_output_gets_a_new_artifact_and_one_notification() {
    let root = temp_root("changed");
    write_plugin(&root, "data_types", "Alphanumeric", "data_type", &[], Some("alpha v1"));
    let plugins = discover_plugins(&root.join("plugins")).expect("discover");

    let notifications = Arc::new(AtomicUsize::new(0));
    let mut cache = open_cache(&root, Box::new(CopyCompiler));
    let counter = Arc::clone(&notifications);
    cache.on_change(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    cache.build_all(&plugins).expect("first build");
    let before = cache.manifest().entry("Alphanumeric").expect("entry").clone();

    fs::write(
        root.join("plugins/data_types/Alphanumeric/generator.src"),
        "alpha v2",
    )
    .expect("update source");

    let report = cache.build_all(&plugins).expect("second build");
    assert_eq!(report.built, vec!["Alphanumeric".to_string()]);
    assert_eq!(notifications.load(Ordering::SeqCst), 2);

    let after = cache.manifest().entry("Alphanumeric").expect("entry");
    assert_ne!(after.content_hash, before.content_hash);
    assert_ne!(after.artifact_name, before.artifact_name);
    assert!(root.join("artifacts").join(&after.artifact_name).is_file());
    assert!(
        root.join("artifacts")
            .join("DT-Alphanumeric.generator.bin")
            .is_file(),
        "staging artifact uses the fixed pre-hash name"
    );
}

#[test]
fn compile_failure_is_isolated_and_keeps_prior_entry() {
    let root = temp_root("failure");
    write_plugin(&root, "data_types", "Alphanumeric", "data_type", &[], Some("alpha v1"));
    write_plugin(&root, "data_types", "Composite", "data_type", &["Alphanumeric"], Some("composite v1"));
    let plugins = discover_plugins(&root.join("plugins")).expect("discover");

    let mut cache = open_cache(&root, Box::new(CopyCompiler));
    cache.build_all(&plugins).expect("seed build");
    let prior = cache.manifest().entry("Composite").expect("entry").clone();
    drop(cache);

    // Reopen the cache with a compiler that fails for Composite only; the
    // manifest reloads from disk so prior hashes survive.
    fs::write(
        root.join("plugins/data_types/Alphanumeric/generator.src"),
        "alpha v2",
    )
    .expect("update source");
    let mut cache = open_cache(
        &root,
        Box::new(FailingCompiler {
            fail_for: "Composite".to_string(),
        }),
    );

    let report = cache.build_all(&plugins).expect("build with failure");
    assert_eq!(report.built, vec!["Alphanumeric".to_string()]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].plugin_id, "Composite");
    assert!(!report.is_clean());

    let kept = cache.manifest().entry("Composite").expect("stale entry kept");
    assert_eq!(kept, &prior);
}

#[test]
fn manifest_persists_across_cache_instances() {
    let root = temp_root("persist");
    write_plugin(&root, "countries", "netherlands", "country", &[], Some("nl v1"));
    let plugins = discover_plugins(&root.join("plugins")).expect("discover");

    let mut cache = open_cache(&root, Box::new(CopyCompiler));
    cache.build_all(&plugins).expect("build");
    drop(cache);

    let manifest = Manifest::load(&root.join("worker_manifest.json")).expect("load");
    let entry = manifest.entry("netherlands").expect("entry");
    assert!(entry.artifact_name.starts_with("C-netherlands.generator."));
    assert!(manifest.generated_at.is_some());
}

#[test]
fn loading_a_missing_manifest_yields_an_empty_one() {
    let root = temp_root("missing");
    let manifest = Manifest::load(&root.join("does_not_exist.json")).expect("load");
    assert!(manifest.is_empty());
}
