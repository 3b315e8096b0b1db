// EngineStateStore - per-engine-name map of serialized state blobs
//
// Entries are created the first time an engine is switched away from,
// overwritten on every later save, and never removed implicitly. Blobs for
// engines that are not registered in the current process are kept so a
// session round trip does not lose them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EngineStateStore {
    states: BTreeMap<String, Value>,
}

impl EngineStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `state` under `name`, replacing any previous blob.
    pub fn save(&mut self, name: &str, state: Value) {
        self.states.insert(name.to_string(), state);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.states.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.states.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.states.keys().map(String::as_str)
    }

    /// Replace the whole map (document load).
    pub fn replace(&mut self, states: BTreeMap<String, Value>) {
        self.states = states;
    }

    pub fn as_map(&self) -> &BTreeMap<String, Value> {
        &self.states
    }
}
