use std::time::Duration;

use serde::{Deserialize, Serialize};

use rowforge_core::CellValue;

/// Configuration for the dispatch engine, fixed at construction.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Upper bound on rows generated concurrently.
    pub max_concurrent_rows: usize,
    /// Abort the whole run on the first row failure instead of collecting
    /// failures and continuing.
    pub fail_fast: bool,
    /// Budget for one generation request; exceeding it is a row-scoped
    /// failure with no retry.
    pub request_timeout: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_concurrent_rows: 4,
            fail_fast: false,
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// One fully generated row; cells are in schema column order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneratedRow {
    pub row_index: u64,
    pub cells: Vec<CellValue>,
}

/// A single row's generation failure: the row is dropped, the run is not.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RowFailure {
    pub row_index: u64,
    pub col_index: usize,
    pub plugin_id: String,
    pub message: String,
}

/// Result of a generation run.
///
/// Rows are ordered by row index regardless of completion order. A row
/// index absent from both `rows` and `failures` was never attempted
/// (only possible when `cancelled` is set); no partially-assembled row is
/// ever included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub run_id: String,
    pub rows_requested: u64,
    pub rows: Vec<GeneratedRow>,
    pub failures: Vec<RowFailure>,
    pub cancelled: bool,
}
