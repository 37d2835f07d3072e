//! Core contracts for rowforge.
//!
//! This crate defines the plugin descriptor and row schema types, the
//! dependency resolver that orders column generation, and the message
//! protocol exchanged between the dispatch engine and isolated workers.

pub mod message;
pub mod plugin;
pub mod resolve;
pub mod schema;

pub use message::{CellValue, ExistingCell, GenerateReply, GenerateRequest, WorkerResources};
pub use plugin::{PluginCatalog, PluginDescriptor, PluginRole};
pub use resolve::{ResolveError, resolve};
pub use schema::{ColumnBinding, RowSchema};

/// Current contract version for `schema.json` and manifest artifacts.
pub const CONTRACT_VERSION: &str = "0.1";
