use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{phase_increment, write_frame};
use crate::engine::{
    state_from_json, state_to_json, EncoderEvent, Engine, EngineType, InputHandler, Preset,
    ProcessContext,
};
use crate::error::DispatchError;

/// Lead voice parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeadParams {
    /// Oscillator frequency in Hz
    pub frequency: f32,
    /// One-pole lowpass coefficient in [0, 1] (1 = open)
    pub cutoff: f32,
    /// Output level in [0, 1]
    pub level: f32,
}

impl Default for LeadParams {
    fn default() -> Self {
        Self {
            frequency: 440.0,
            cutoff: 0.5,
            level: 0.5,
        }
    }
}

impl LeadParams {
    fn sanitized(self) -> Self {
        Self {
            frequency: self.frequency.clamp(20.0, 20_000.0),
            cutoff: self.cutoff.clamp(0.0, 1.0),
            level: self.level.clamp(0.0, 1.0),
        }
    }
}

/// Band-limited-ish saw through a one-pole lowpass.
#[derive(Debug, Clone, Default)]
pub struct LeadEngine {
    params: LeadParams,
    phase: f32,
    filter_state: f32,
}

impl LeadEngine {
    pub fn params(&self) -> &LeadParams {
        &self.params
    }

    pub fn set_params(&mut self, params: LeadParams) {
        self.params = params.sanitized();
    }
}

impl Engine for LeadEngine {
    fn name(&self) -> &str {
        "Lead"
    }

    fn engine_type(&self) -> EngineType {
        EngineType::Synth
    }

    fn process(&mut self, buffer: &mut [f32], ctx: &ProcessContext) {
        let increment = phase_increment(self.params.frequency, ctx.sample_rate);
        let coeff = self.params.cutoff.max(0.001);
        for frame in buffer.chunks_exact_mut(ctx.layout.channels()) {
            let saw = 2.0 * self.phase - 1.0;
            self.filter_state += coeff * (saw - self.filter_state);
            write_frame(frame, self.filter_state * self.params.level);

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
        let params: LeadParams = state_from_json(self.name(), state)?;
        self.set_params(params);
        Ok(())
    }

    fn icon(&self) -> &str {
        "saw"
    }

    fn factory_presets(&self) -> Vec<Preset> {
        vec![
            Preset::new("init", state_to_json(&LeadParams::default())),
            Preset::new(
                "bright",
                json!({"frequency": 880.0, "cutoff": 0.95, "level": 0.6}),
            ),
            Preset::new(
                "soft",
                json!({"frequency": 220.0, "cutoff": 0.1, "level": 0.4}),
            ),
        ]
    }

    fn input_handler(&mut self) -> Option<&mut dyn InputHandler> {
        Some(self)
    }
}

impl InputHandler for LeadEngine {
    fn encoder(&mut self, event: EncoderEvent) -> bool {
        let delta = event.steps as f32 * 0.01;
        let mut params = self.params;
        match event.encoder {
            0 => params.cutoff += delta,
            1 => params.level += delta,
            _ => return false,
        }
        self.set_params(params);
        true
    }
}
