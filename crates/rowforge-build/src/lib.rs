//! Content-addressed incremental build cache for worker artifacts.
//!
//! Discovers plugins on disk, compiles each worker-backed plugin through an
//! opaque compiler collaborator, hashes the compiled bytes, and maintains
//! the manifest the dispatch engine reads at runtime. A plugin whose
//! compiled output is byte-identical to its last build never triggers
//! redundant downstream work.

pub mod cache;
pub mod compile;
pub mod discover;
pub mod errors;
pub mod manifest;
pub mod watch;

pub use cache::{BuildCache, BuildOutcome, BuildReport};
pub use compile::{
    CompileFailure, CopyCompiler, WorkerCompiler, expected_artifact_name, hashed_artifact_name,
};
pub use discover::{DiscoveredPlugin, discover_plugins};
pub use errors::BuildError;
pub use manifest::{Manifest, ManifestEntry};
pub use watch::watch_plugins;
