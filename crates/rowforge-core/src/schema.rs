use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One column of a row schema, bound to a plugin and its configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ColumnBinding {
    /// Display title of the column.
    pub title: String,
    /// Id of the plugin that generates this column.
    pub plugin_id: String,
    /// Plugin-specific configuration, opaque to the core.
    #[serde(default)]
    pub config: serde_json::Value,
}

/// Ordered set of column bindings describing one row.
///
/// The column index is the position in `columns`. A schema is treated as
/// immutable for the duration of a generation run.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RowSchema {
    pub columns: Vec<ColumnBinding>,
}

impl RowSchema {
    pub fn new(columns: Vec<ColumnBinding>) -> Self {
        Self { columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
