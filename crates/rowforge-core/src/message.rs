use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Value generated for one cell.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CellValue {
    /// Human-readable form, always present.
    pub display: String,
    /// Optional machine form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<serde_json::Value>,
}

impl CellValue {
    pub fn display(display: impl Into<String>) -> Self {
        Self {
            display: display.into(),
            raw: None,
        }
    }
}

/// A cell already generated earlier in the current row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExistingCell {
    pub col_index: usize,
    pub data: CellValue,
}

/// Shared resources a fresh worker loads exactly once.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WorkerResources {
    /// Artifact holding shared utility code, when one is built.
    pub worker_utils: Option<PathBuf>,
}

/// One generation request for one (row, column) pair.
///
/// `existing_row_data` carries only cells the resolver placed earlier in
/// the same row; a plugin never sees columns ordered after it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub row_index: u64,
    pub col_index: usize,
    /// Column configuration for this cell, opaque to the core.
    pub row_state: serde_json::Value,
    pub existing_row_data: Vec<ExistingCell>,
    /// Bootstrap instruction, present only on the first request a fresh
    /// handle receives. Workers apply it at most once and ignore it on
    /// later requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bootstrap: Option<WorkerResources>,
}

/// Reply to one generation request.
///
/// Exactly one reply per request; an uncaught plugin failure becomes
/// `Failed` rather than a silently dropped channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum GenerateReply {
    Value(CellValue),
    Failed { message: String },
}
