//! Engine capability contract.
//!
//! Every pluggable audio unit implements [`Engine`]. The dispatcher only ever
//! talks to engines through this trait: construct (via an
//! [`EngineFactory`]), process a block, round-trip its state through JSON,
//! and report a stable name.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DispatchError;

pub mod input;
pub mod presets;
pub mod registry;
pub mod state_store;

pub use input::{EncoderEvent, InputEvent, InputHandler, Key};
pub use presets::{Preset, PresetBank, PresetSelectorData};
pub use registry::{EngineFactory, EngineRegistry, OFF_ENGINE_NAME};
pub use state_store::EngineStateStore;

/// Category a dispatcher instance is parameterized over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineType {
    Synth,
    Effect,
    Sequencer,
    Arpeggiator,
}

impl EngineType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineType::Synth => "synth",
            EngineType::Effect => "effect",
            EngineType::Sequencer => "sequencer",
            EngineType::Arpeggiator => "arpeggiator",
        }
    }
}

impl fmt::Display for EngineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Interleaving layout of the block handed to [`Engine::process`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelLayout {
    Mono,
    Stereo,
}

impl ChannelLayout {
    pub fn channels(&self) -> usize {
        match self {
            ChannelLayout::Mono => 1,
            ChannelLayout::Stereo => 2,
        }
    }

    /// Layout for an interleaved channel count. Only mono and stereo exist.
    pub fn from_channels(channels: u16) -> Option<Self> {
        match channels {
            1 => Some(ChannelLayout::Mono),
            2 => Some(ChannelLayout::Stereo),
            _ => None,
        }
    }
}

/// Per-call processing context.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessContext {
    pub sample_rate: u32,
    pub layout: ChannelLayout,
    /// Absolute frame position of the first frame in the block
    pub frame: u64,
}

impl ProcessContext {
    pub fn new(sample_rate: u32, layout: ChannelLayout) -> Self {
        Self {
            sample_rate,
            layout,
            frame: 0,
        }
    }

    /// Number of frames contained in an interleaved buffer of `len` samples.
    #[inline]
    pub fn frames(&self, len: usize) -> usize {
        len / self.layout.channels()
    }
}

/// Capability contract implemented by every engine.
///
/// # Real-Time Safety
/// [`Engine::process`] runs on the audio thread. Implementations must not
/// allocate, lock, block, or log inside it. Everything else is called from
/// the dispatcher's drain point or the control side.
pub trait Engine: Send {
    /// Stable identifier, used as state-store key and in the name table.
    fn name(&self) -> &str;

    fn engine_type(&self) -> EngineType;

    /// Render or transform one interleaved block in place.
    fn process(&mut self, buffer: &mut [f32], ctx: &ProcessContext);

    /// Serialize the full engine state.
    fn to_json(&self) -> Value;

    /// Restore state produced by [`Engine::to_json`].
    ///
    /// On error the engine must be left in a playable state.
    fn from_json(&mut self, state: &Value) -> Result<(), DispatchError>;

    /// Icon identifier shown next to the engine name in selector screens.
    fn icon(&self) -> &str {
        ""
    }

    /// Presets shipped with the engine, seeded into the preset bank the first
    /// time the engine is constructed.
    fn factory_presets(&self) -> Vec<Preset> {
        Vec::new()
    }

    /// Optional input handling capability.
    fn input_handler(&mut self) -> Option<&mut dyn InputHandler> {
        None
    }
}

/// Deserialize a typed engine state from a JSON blob, mapping failures to
/// [`DispatchError::MalformedPersistedState`].
pub fn state_from_json<T>(engine: &str, state: &Value) -> Result<T, DispatchError>
where
    T: for<'de> Deserialize<'de>,
{
    T::deserialize(state).map_err(|err| DispatchError::malformed(engine, err))
}

/// Serialize a typed engine state, falling back to `null` if the type cannot
/// be represented as JSON.
pub fn state_to_json<T: Serialize>(state: &T) -> Value {
    serde_json::to_value(state).unwrap_or(Value::Null)
}
