use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::write_frame;
use crate::engine::{state_from_json, state_to_json, Engine, EngineType, ProcessContext};
use crate::error::DispatchError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseParams {
    pub level: f32,
    /// Seed for the deterministic generator
    pub seed: u64,
}

impl Default for NoiseParams {
    fn default() -> Self {
        Self {
            level: 0.25,
            seed: 42,
        }
    }
}

/// Seeded white noise.
///
/// The generator is re-seeded whenever state is loaded, so identical state
/// renders identical output.
#[derive(Debug, Clone)]
pub struct NoiseEngine {
    params: NoiseParams,
    rng: StdRng,
}

impl Default for NoiseEngine {
    fn default() -> Self {
        let params = NoiseParams::default();
        Self {
            params,
            rng: StdRng::seed_from_u64(params.seed),
        }
    }
}

impl NoiseEngine {
    pub fn params(&self) -> &NoiseParams {
        &self.params
    }
}

impl Engine for NoiseEngine {
    fn name(&self) -> &str {
        "Noise"
    }

    fn engine_type(&self) -> EngineType {
        EngineType::Synth
    }

    fn process(&mut self, buffer: &mut [f32], ctx: &ProcessContext) {
        let level = self.params.level;
        for frame in buffer.chunks_exact_mut(ctx.layout.channels()) {
            let value: f32 = self.rng.gen_range(-1.0..1.0);
            write_frame(frame, value * level);
        }
    }

    fn to_json(&self) -> Value {
        state_to_json(&self.params)
    }

    fn from_json(&mut self, state: &Value) -> Result<(), DispatchError> {
        let params: NoiseParams = state_from_json(self.name(), state)?;
        self.params = NoiseParams {
            level: params.level.clamp(0.0, 1.0),
            seed: params.seed,
        };
        self.rng = StdRng::seed_from_u64(self.params.seed);
        Ok(())
    }

    fn icon(&self) -> &str {
        "noise"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ChannelLayout;
    use serde_json::json;

    #[test]
    fn test_same_seed_same_output() {
        let ctx = ProcessContext::new(48000, ChannelLayout::Mono);
        let mut a = NoiseEngine::default();
        let mut b = NoiseEngine::default();
        b.from_json(&a.to_json()).unwrap();

        let mut out_a = vec![0.0_f32; 128];
        let mut out_b = vec![0.0_f32; 128];
        a.process(&mut out_a, &ctx);
        b.process(&mut out_b, &ctx);
        assert_eq!(out_a, out_b);
    }

    #[test]
    fn test_level_bounds_output() {
        let mut engine = NoiseEngine::default();
        engine.from_json(&json!({"level": 0.1, "seed": 7})).unwrap();
        let mut buffer = vec![0.0_f32; 1024];
        engine.process(&mut buffer, &ProcessContext::new(48000, ChannelLayout::Mono));
        assert!(buffer.iter().all(|&s| s.abs() <= 0.1));
    }
}
