//! Built-in engines.
//!
//! Small reference implementations of the [`Engine`](crate::engine::Engine)
//! contract. They exist so the dispatcher, the CLI and the test-suite have
//! something real to switch between.

mod bass;
mod gain;
mod lead;
mod noise;
mod off;

pub use bass::{BassEngine, BassParams};
pub use gain::{GainEngine, GainParams};
pub use lead::{LeadEngine, LeadParams};
pub use noise::{NoiseEngine, NoiseParams};
pub use off::OffEngine;

use crate::engine::{EngineRegistry, EngineType};
use crate::error::DispatchError;

/// `Off`, `Lead`, `Bass`, `Noise`.
pub fn synth_registry() -> Result<EngineRegistry, DispatchError> {
    EngineRegistry::with_off(EngineType::Synth)
        .with_engine::<LeadEngine>()?
        .with_engine::<BassEngine>()?
        .with_engine::<NoiseEngine>()
}

/// `Off` (bypass), `Gain`.
pub fn effect_registry() -> Result<EngineRegistry, DispatchError> {
    EngineRegistry::with_off(EngineType::Effect).with_engine::<GainEngine>()
}

/// Registry for a given category, or `None` if no built-ins exist for it.
pub fn registry_for(engine_type: EngineType) -> Option<Result<EngineRegistry, DispatchError>> {
    match engine_type {
        EngineType::Synth => Some(synth_registry()),
        EngineType::Effect => Some(effect_registry()),
        EngineType::Sequencer | EngineType::Arpeggiator => None,
    }
}

/// Per-sample phase increment for an oscillator at `frequency`.
#[inline]
pub(crate) fn phase_increment(frequency: f32, sample_rate: u32) -> f32 {
    frequency / sample_rate.max(1) as f32
}

/// Write the same value into every channel of one interleaved frame.
#[inline]
pub(crate) fn write_frame(frame: &mut [f32], value: f32) {
    for sample in frame.iter_mut() {
        *sample = value;
    }
}
