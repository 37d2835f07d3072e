//! Worker pool and dispatch engine.
//!
//! Drives row-by-row, dependency-ordered dataset generation: resolves the
//! column order once per schema, pools isolated message-passing workers per
//! plugin, and assembles completed rows by index while surfacing per-row
//! failures as structured diagnostics.

pub mod engine;
pub mod errors;
pub mod host;
pub mod model;
pub mod pool;
pub mod worker;

pub use engine::DispatchEngine;
pub use errors::EngineError;
pub use host::{CellGenerator, LoadError, PluginError, PluginHost};
pub use model::{Dataset, EngineOptions, GeneratedRow, RowFailure};
pub use pool::WorkerPool;
pub use worker::{HandleState, RequestError, WorkerHandle};
