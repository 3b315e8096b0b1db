use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::engine::{state_from_json, state_to_json, Engine, EngineType, Preset, ProcessContext};
use crate::error::DispatchError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GainParams {
    pub gain_db: f32,
}

impl Default for GainParams {
    fn default() -> Self {
        Self { gain_db: 0.0 }
    }
}

/// Static gain effect.
#[derive(Debug, Clone, Default)]
pub struct GainEngine {
    params: GainParams,
}

impl GainEngine {
    pub fn params(&self) -> &GainParams {
        &self.params
    }

    fn linear_gain(&self) -> f32 {
        10.0_f32.powf(self.params.gain_db / 20.0)
    }
}

impl Engine for GainEngine {
    fn name(&self) -> &str {
        "Gain"
    }

    fn engine_type(&self) -> EngineType {
        EngineType::Effect
    }

    fn process(&mut self, buffer: &mut [f32], _ctx: &ProcessContext) {
        let gain = self.linear_gain();
        for sample in buffer.iter_mut() {
            *sample *= gain;
        }
    }

    fn to_json(&self) -> Value {
        state_to_json(&self.params)
    }

    fn from_json(&mut self, state: &Value) -> Result<(), DispatchError> {
        let params: GainParams = state_from_json(self.name(), state)?;
        self.params = GainParams {
            gain_db: params.gain_db.clamp(-60.0, 24.0),
        };
        Ok(())
    }

    fn factory_presets(&self) -> Vec<Preset> {
        vec![
            Preset::new("unity", json!({"gain_db": 0.0})),
            Preset::new("-6 dB", json!({"gain_db": -6.0})),
        ]
    }
}
