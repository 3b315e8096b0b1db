use serde_json::{json, Value};

use crate::engine::{Engine, EngineType, ProcessContext, OFF_ENGINE_NAME};
use crate::error::DispatchError;

/// The distinguished no-op engine.
///
/// Effects pass audio through untouched; every other category outputs
/// silence.
#[derive(Debug, Clone)]
pub struct OffEngine {
    engine_type: EngineType,
}

impl OffEngine {
    pub fn new(engine_type: EngineType) -> Self {
        Self { engine_type }
    }
}

impl Engine for OffEngine {
    fn name(&self) -> &str {
        OFF_ENGINE_NAME
    }

    fn engine_type(&self) -> EngineType {
        self.engine_type
    }

    fn process(&mut self, buffer: &mut [f32], _ctx: &ProcessContext) {
        if self.engine_type != EngineType::Effect {
            buffer.fill(0.0);
        }
    }

    fn to_json(&self) -> Value {
        json!({})
    }

    fn from_json(&mut self, _state: &Value) -> Result<(), DispatchError> {
        Ok(())
    }

    fn icon(&self) -> &str {
        "off"
    }
}
