mod host;
mod logging;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use thiserror::Error;
use tracing::{info, warn};

use rowforge_build::{
    BuildCache, BuildError, CopyCompiler, Manifest, discover_plugins, watch_plugins,
};
use rowforge_core::{PluginCatalog, RowSchema};
use rowforge_engine::{DispatchEngine, EngineError, EngineOptions};

use host::BuiltinHost;

#[derive(Debug, Error)]
enum CliError {
    #[error("build error: {0}")]
    Build(#[from] BuildError),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0} plugin(s) failed to build")]
    FailedPlugins(usize),
    #[error("logging error: {0}")]
    Logging(String),
}

#[derive(Parser, Debug)]
#[command(name = "rowforge", version, about = "Rowforge synthetic dataset generator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Discover plugins, compile changed worker artifacts, update the manifest.
    BuildWorkers(BuildArgs),
    /// Build once, then rebuild single plugins as their sources change.
    Watch(BuildArgs),
    /// Generate a dataset from a row schema.
    Generate(GenerateArgs),
}

#[derive(Args, Debug)]
struct BuildArgs {
    /// Plugin tree root.
    #[arg(long, default_value = "plugins")]
    plugins: PathBuf,
    /// Output directory for worker artifacts.
    #[arg(long, default_value = "dist/workers")]
    out: PathBuf,
    /// Manifest file path.
    #[arg(long, default_value = "dist/worker_manifest.json")]
    manifest: PathBuf,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Plugin tree root.
    #[arg(long, default_value = "plugins")]
    plugins: PathBuf,
    /// Directory holding built worker artifacts.
    #[arg(long, default_value = "dist/workers")]
    artifacts: PathBuf,
    /// Manifest file path.
    #[arg(long, default_value = "dist/worker_manifest.json")]
    manifest: PathBuf,
    /// Row schema JSON file.
    #[arg(long)]
    schema: PathBuf,
    /// Number of rows to generate.
    #[arg(long, default_value_t = 100)]
    rows: u64,
    /// Upper bound on rows generated concurrently.
    #[arg(long, default_value_t = 4)]
    max_concurrent_rows: usize,
    /// Abort the run on the first row failure instead of collecting failures.
    #[arg(long, default_value_t = false)]
    fail_fast: bool,
    /// Per-request timeout in milliseconds.
    #[arg(long, default_value_t = 10_000)]
    timeout_ms: u64,
    /// Output file for the dataset JSON; stdout when omitted.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    logging::init().map_err(CliError::Logging)?;
    let cli = Cli::parse();

    match cli.command {
        Command::BuildWorkers(args) => run_build(args),
        Command::Watch(args) => run_watch(args),
        Command::Generate(args) => run_generate(args).await,
    }
}

fn run_build(args: BuildArgs) -> Result<(), CliError> {
    let plugins = discover_plugins(&args.plugins)?;
    let mut cache = BuildCache::new(&args.out, &args.manifest, Box::new(CopyCompiler))?;
    let report = cache.build_all(&plugins)?;

    info!(
        built = report.built.len(),
        unchanged = report.unchanged.len(),
        failed = report.failed.len(),
        manifest = %args.manifest.display(),
        "build-workers finished"
    );
    for failure in &report.failed {
        warn!(plugin_id = %failure.plugin_id, error = %failure.message, "plugin failed");
    }

    if report.is_clean() {
        Ok(())
    } else {
        Err(CliError::FailedPlugins(report.failed.len()))
    }
}

fn run_watch(args: BuildArgs) -> Result<(), CliError> {
    let plugins = discover_plugins(&args.plugins)?;
    let mut cache = BuildCache::new(&args.out, &args.manifest, Box::new(CopyCompiler))?;
    cache.build_all(&plugins)?;
    watch_plugins(&args.plugins, &mut cache, &plugins)?;
    Ok(())
}

async fn run_generate(args: GenerateArgs) -> Result<(), CliError> {
    let plugins = discover_plugins(&args.plugins)?;
    let catalog: PluginCatalog = plugins
        .iter()
        .map(|plugin| plugin.descriptor.clone())
        .collect();
    let manifest = Manifest::load(&args.manifest)?;

    let contents = std::fs::read_to_string(&args.schema)?;
    let schema: RowSchema = serde_json::from_str(&contents)?;

    let options = EngineOptions {
        max_concurrent_rows: args.max_concurrent_rows,
        fail_fast: args.fail_fast,
        request_timeout: Duration::from_millis(args.timeout_ms),
    };
    let engine = DispatchEngine::new(
        options,
        catalog,
        manifest,
        &args.artifacts,
        Arc::new(BuiltinHost),
    );

    let dataset = engine.generate_dataset(&schema, args.rows).await?;
    engine.shutdown();

    for failure in &dataset.failures {
        warn!(
            row_index = failure.row_index,
            plugin_id = %failure.plugin_id,
            error = %failure.message,
            "row failed"
        );
    }

    let json = serde_json::to_string_pretty(&dataset)?;
    match args.out {
        Some(path) => std::fs::write(path, json)?,
        None => println!("{json}"),
    }
    Ok(())
}
