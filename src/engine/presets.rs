//! Named parameter snapshots per engine.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Named, saved snapshot of an engine's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,
    pub data: Value,
}

impl Preset {
    pub fn new(name: impl Into<String>, data: Value) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

/// What selector screens need to render the active engine.
///
/// Republished on every engine switch and every preset-list change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetSelectorData {
    pub name: String,
    pub icon: String,
    pub presets: Vec<String>,
}

/// Ordered preset lists keyed by engine name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PresetBank {
    banks: BTreeMap<String, Vec<Preset>>,
}

impl PresetBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `presets` for `engine` unless a list already exists.
    pub fn seed(&mut self, engine: &str, presets: Vec<Preset>) {
        self.banks.entry(engine.to_string()).or_insert(presets);
    }

    pub fn presets(&self, engine: &str) -> &[Preset] {
        self.banks.get(engine).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn preset_names(&self, engine: &str) -> Vec<String> {
        self.presets(engine).iter().map(|p| p.name.clone()).collect()
    }

    pub fn len(&self, engine: &str) -> usize {
        self.presets(engine).len()
    }

    /// Highest valid preset index for `engine` (0 when the list is empty).
    pub fn max_index(&self, engine: &str) -> usize {
        self.len(engine).saturating_sub(1)
    }

    pub fn get(&self, engine: &str, index: usize) -> Option<&Preset> {
        self.presets(engine).get(index)
    }

    /// Insert a preset, overwriting one with the same name in place.
    ///
    /// Returns the index the preset ended up at.
    pub fn upsert(&mut self, engine: &str, preset: Preset) -> usize {
        let list = self.banks.entry(engine.to_string()).or_default();
        match list.iter().position(|p| p.name == preset.name) {
            Some(index) => {
                list[index] = preset;
                index
            }
            None => {
                list.push(preset);
                list.len() - 1
            }
        }
    }

    pub fn insert_list(&mut self, engine: &str, presets: Vec<Preset>) {
        self.banks.insert(engine.to_string(), presets);
    }

    pub fn as_map(&self) -> &BTreeMap<String, Vec<Preset>> {
        &self.banks
    }
}
