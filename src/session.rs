//! Session files for desktop tools.
//!
//! A session bundles the persisted documents of every dispatcher in the
//! process, keyed by engine type:
//!
//! ```json
//! { "version": 1, "dispatchers": { "synth": { "selected_engine_idx": 2, ... } } }
//! ```
//!
//! Load and save happen on the control side only; the audio backend hands
//! the dispatcher back before anything here is called.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dispatcher::EngineDispatcher;
use crate::engine::EngineType;

pub const SESSION_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionFile {
    pub version: u32,
    #[serde(default)]
    pub dispatchers: BTreeMap<String, Value>,
}

impl Default for SessionFile {
    fn default() -> Self {
        Self {
            version: SESSION_VERSION,
            dispatchers: BTreeMap::new(),
        }
    }
}

impl SessionFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let session: SessionFile = serde_json::from_str(&contents)
            .with_context(|| format!("parsing session {}", path.display()))?;
        if session.version > SESSION_VERSION {
            bail!(
                "Session {} has version {}, newest supported is {}",
                path.display(),
                session.version,
                SESSION_VERSION
            );
        }
        log::info!(
            "[Session] Loaded {} dispatcher document(s) from {}",
            session.dispatchers.len(),
            path.display()
        );
        Ok(session)
    }

    /// Load `path`, or start an empty session if it does not exist yet.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            log::debug!("[Session] {} not found, starting empty", path.display());
            Ok(Self::default())
        }
    }

    /// Write pretty JSON, replacing the file atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("serializing session")?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, path).with_context(|| format!("replacing {}", path.display()))?;
        log::info!("[Session] Saved {}", path.display());
        Ok(())
    }

    pub fn document(&self, engine_type: EngineType) -> Option<&Value> {
        self.dispatchers.get(engine_type.as_str())
    }

    /// Save the dispatcher's active engine and store its document.
    pub fn capture(&mut self, dispatcher: &mut EngineDispatcher) {
        dispatcher.save_engine_state();
        self.dispatchers
            .insert(dispatcher.engine_type().as_str().to_string(), dispatcher.to_json());
    }

    /// Apply the stored document for the dispatcher's engine type.
    ///
    /// # Returns
    /// `false` if the session holds no document for that type
    pub fn restore(&self, dispatcher: &mut EngineDispatcher) -> Result<bool> {
        let Some(doc) = self.document(dispatcher.engine_type()) else {
            return Ok(false);
        };
        dispatcher
            .from_json(doc)
            .with_context(|| format!("restoring {} dispatcher", dispatcher.engine_type()))?;
        Ok(true)
    }
}
