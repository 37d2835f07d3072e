use std::path::Path;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;

use rowforge_core::{CellValue, GenerateRequest};
use rowforge_engine::{CellGenerator, LoadError, PluginError, PluginHost};

const UPPER_ALNUM: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const DIGITS: &[u8] = b"0123456789";
const LOWER: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

/// Demonstration host backing the `generate` command.
///
/// Worker artifacts carry a JSON directive naming the generator kind;
/// inline plugins are addressed by their id. Everything here is sample
/// behavior — the engine never depends on it.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinHost;

impl BuiltinHost {
    fn generator_for(kind: &str) -> Option<Box<dyn CellGenerator>> {
        match kind {
            "alphanumeric" => Some(Box::new(AlphanumericGenerator)),
            "auto_increment" => Some(Box::new(AutoIncrementGenerator)),
            "composite" => Some(Box::new(CompositeGenerator)),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Directive {
    kind: String,
}

impl PluginHost for BuiltinHost {
    fn load_worker(
        &self,
        plugin_id: &str,
        artifact: &Path,
    ) -> Result<Box<dyn CellGenerator>, LoadError> {
        if !artifact.is_file() {
            return Err(LoadError::ArtifactNotFound(artifact.to_path_buf()));
        }
        let contents = std::fs::read_to_string(artifact)?;
        let directive: Directive =
            serde_json::from_str(&contents).map_err(|err| LoadError::Malformed {
                plugin_id: plugin_id.to_string(),
                message: err.to_string(),
            })?;
        Self::generator_for(&directive.kind).ok_or_else(|| LoadError::Malformed {
            plugin_id: plugin_id.to_string(),
            message: format!("unknown generator kind '{}'", directive.kind),
        })
    }

    fn load_inline(&self, plugin_id: &str) -> Result<Box<dyn CellGenerator>, LoadError> {
        Self::generator_for(plugin_id)
            .ok_or_else(|| LoadError::UnknownPlugin(plugin_id.to_string()))
    }
}

/// Random text from a format string: `X` upper alphanumeric, `9` digit,
/// `a` lowercase letter, anything else literal.
struct AlphanumericGenerator;

impl CellGenerator for AlphanumericGenerator {
    fn generate(&mut self, request: &GenerateRequest) -> Result<CellValue, PluginError> {
        let format = request
            .row_state
            .get("format")
            .and_then(|value| value.as_str())
            .unwrap_or("XXXX");

        let mut rng = ChaCha8Rng::seed_from_u64(cell_seed(request.row_index, request.col_index));
        let display: String = format
            .chars()
            .map(|c| match c {
                'X' => pick(UPPER_ALNUM, &mut rng),
                '9' => pick(DIGITS, &mut rng),
                'a' => pick(LOWER, &mut rng),
                other => other,
            })
            .collect();
        Ok(CellValue::display(display))
    }
}

/// Monotonic counter starting at `start` (default 1).
struct AutoIncrementGenerator;

impl CellGenerator for AutoIncrementGenerator {
    fn generate(&mut self, request: &GenerateRequest) -> Result<CellValue, PluginError> {
        let start = request
            .row_state
            .get("start")
            .and_then(|value| value.as_u64())
            .unwrap_or(1);
        let value = start + request.row_index;
        Ok(CellValue {
            display: value.to_string(),
            raw: Some(serde_json::json!(value)),
        })
    }
}

/// Interpolates `{ROW<n>}` placeholders (1-based column numbers) with the
/// display values of earlier columns.
struct CompositeGenerator;

impl CellGenerator for CompositeGenerator {
    fn generate(&mut self, request: &GenerateRequest) -> Result<CellValue, PluginError> {
        let placeholder = request
            .row_state
            .get("placeholder")
            .and_then(|value| value.as_str())
            .ok_or_else(|| PluginError::new("composite requires a 'placeholder' setting"))?;

        let mut display = placeholder.to_string();
        for cell in &request.existing_row_data {
            let token = format!("{{ROW{}}}", cell.col_index + 1);
            display = display.replace(&token, &cell.data.display);
        }
        Ok(CellValue::display(display))
    }
}

fn pick(choices: &[u8], rng: &mut ChaCha8Rng) -> char {
    choices[rng.random_range(0..choices.len())] as char
}

fn cell_seed(row_index: u64, col_index: usize) -> u64 {
    let mut hash = row_index ^ 0xcbf29ce484222325;
    for byte in (col_index as u64).to_le_bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}
