use std::f32::consts::TAU;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{phase_increment, write_frame};
use crate::engine::{state_from_json, state_to_json, Engine, EngineType, Preset, ProcessContext};
use crate::error::DispatchError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BassParams {
    pub frequency: f32,
    /// Soft-clip drive, 1.0 = clean
    pub drive: f32,
    /// Sub-octave mix in [0, 1]
    pub sub_level: f32,
    pub level: f32,
}

impl Default for BassParams {
    fn default() -> Self {
        Self {
            frequency: 55.0,
            drive: 1.0,
            sub_level: 0.5,
            level: 0.6,
        }
    }
}

impl BassParams {
    fn sanitized(self) -> Self {
        Self {
            frequency: self.frequency.clamp(20.0, 2_000.0),
            drive: self.drive.clamp(1.0, 10.0),
            sub_level: self.sub_level.clamp(0.0, 1.0),
            level: self.level.clamp(0.0, 1.0),
        }
    }
}

/// Sine plus sub-octave through a tanh drive stage.
#[derive(Debug, Clone, Default)]
pub struct BassEngine {
    params: BassParams,
    phase: f32,
}

impl BassEngine {
    pub fn params(&self) -> &BassParams {
        &self.params
    }

    pub fn set_params(&mut self, params: BassParams) {
        self.params = params.sanitized();
    }
}

impl Engine for BassEngine {
    fn name(&self) -> &str {
        "Bass"
    }

    fn engine_type(&self) -> EngineType {
        EngineType::Synth
    }

    fn process(&mut self, buffer: &mut [f32], ctx: &ProcessContext) {
        // phase runs at the sub-octave so both partials stay aligned
        let increment = phase_increment(self.params.frequency * 0.5, ctx.sample_rate);
        let p = self.params;
        for frame in buffer.chunks_exact_mut(ctx.layout.channels()) {
            let fundamental = (self.phase * 2.0 * TAU).sin();
            let sub = (self.phase * TAU).sin();
            let mixed = fundamental + p.sub_level * sub;
            let value = (mixed * p.drive).tanh() * p.level;
            write_frame(frame, value);

            self.phase += increment;
            if self.phase >= 1.0 {
                self.phase -= 1.0;
            }
        }
    }

    fn to_json(&self) -> Value {
        state_to_json(&self.params)
    }

    fn from_json(&mut self, state: &Value) -> Result<(), DispatchError> {
        let params: BassParams = state_from_json(self.name(), state)?;
        self.set_params(params);
        Ok(())
    }

    fn icon(&self) -> &str {
        "sine"
    }

    fn factory_presets(&self) -> Vec<Preset> {
        vec![Preset::new("init", state_to_json(&BassParams::default()))]
    }
}
