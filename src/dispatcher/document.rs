//! Persisted dispatcher document.
//!
//! ```json
//! {
//!   "selected_engine_idx": 2,
//!   "selected_preset_idx": 0,
//!   "engine_states": { "Lead": { ... }, "Bass": { ... } },
//!   "presets": { "Bass": [ { "name": "warm", "data": { ... } } ] }
//! }
//! ```
//!
//! Parsing is lenient: the document may be stale or hand-edited, so every
//! segment is validated on its own and a bad segment never aborts the rest.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::engine::Preset;
use crate::error::DispatchError;

pub const SELECTED_ENGINE_KEY: &str = "selected_engine_idx";
pub const SELECTED_PRESET_KEY: &str = "selected_preset_idx";
pub const ENGINE_STATES_KEY: &str = "engine_states";
pub const PRESETS_KEY: &str = "presets";

/// Label used in diagnostics for problems outside any engine segment.
const DOCUMENT_LABEL: &str = "<document>";

#[derive(Debug, Clone, Serialize)]
pub struct DispatcherDocument<'a> {
    pub selected_engine_idx: usize,
    pub selected_preset_idx: usize,
    pub engine_states: &'a BTreeMap<String, Value>,
    pub presets: &'a BTreeMap<String, Vec<Preset>>,
}

/// Result of lenient parsing. Indices are signed and unclamped; the
/// dispatcher validates them against its own bounds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedDocument {
    pub selected_engine_idx: i64,
    pub selected_preset_idx: i64,
    pub engine_states: BTreeMap<String, Value>,
    pub presets: BTreeMap<String, Vec<Preset>>,
    /// Segments that were skipped
    pub diagnostics: Vec<DispatchError>,
}

impl ParsedDocument {
    /// Parse a document.
    ///
    /// # Errors
    /// Only when the root is not a JSON object. Problems inside individual
    /// segments are collected in `diagnostics` instead.
    pub fn parse(doc: &Value) -> Result<Self, DispatchError> {
        let root = doc.as_object().ok_or_else(|| {
            DispatchError::malformed(DOCUMENT_LABEL, "document root is not an object")
        })?;

        let mut parsed = ParsedDocument::default();
        parsed.selected_engine_idx = parsed.read_index(root, SELECTED_ENGINE_KEY);
        parsed.selected_preset_idx = parsed.read_index(root, SELECTED_PRESET_KEY);
        parsed.read_engine_states(root);
        parsed.read_presets(root);
        Ok(parsed)
    }

    fn read_index(&mut self, root: &Map<String, Value>, key: &str) -> i64 {
        match root.get(key) {
            None => 0,
            Some(value) => match value.as_i64() {
                Some(index) => index,
                None => {
                    self.diagnostics.push(DispatchError::malformed(
                        DOCUMENT_LABEL,
                        format!("{} is not an integer: {}", key, value),
                    ));
                    0
                }
            },
        }
    }

    fn read_engine_states(&mut self, root: &Map<String, Value>) {
        match root.get(ENGINE_STATES_KEY) {
            None => {}
            Some(Value::Object(states)) => {
                self.engine_states = states
                    .iter()
                    .map(|(name, blob)| (name.clone(), blob.clone()))
                    .collect();
            }
            Some(other) => self.diagnostics.push(DispatchError::malformed(
                DOCUMENT_LABEL,
                format!("{} is not an object: {}", ENGINE_STATES_KEY, other),
            )),
        }
    }

    fn read_presets(&mut self, root: &Map<String, Value>) {
        let banks = match root.get(PRESETS_KEY) {
            None => return,
            Some(Value::Object(banks)) => banks,
            Some(other) => {
                self.diagnostics.push(DispatchError::malformed(
                    DOCUMENT_LABEL,
                    format!("{} is not an object: {}", PRESETS_KEY, other),
                ));
                return;
            }
        };

        for (engine, list) in banks {
            match Vec::<Preset>::deserialize(list) {
                Ok(presets) => {
                    self.presets.insert(engine.clone(), presets);
                }
                Err(err) => self
                    .diagnostics
                    .push(DispatchError::malformed(engine, format!("presets: {}", err))),
            }
        }
    }
}
