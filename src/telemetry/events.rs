//! Core telemetry event types describing dispatcher diagnostics exposed to
//! CLI surfaces and UI subscribers.

use serde::{Deserialize, Serialize};

use crate::engine::EngineType;

/// Rich metric events covering switches, presets, and absorbed errors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MetricEvent {
    EngineSwitched {
        engine_type: EngineType,
        from: String,
        to: String,
        /// Save + destroy + construct + restore duration
        elapsed_us: u64,
    },
    SwitchTiming {
        avg_us: f32,
        max_us: f32,
        sample_count: usize,
    },
    PresetSelected {
        engine: String,
        index: usize,
        name: String,
    },
    PresetCreated {
        engine: String,
        name: String,
        index: usize,
        overwritten: bool,
    },
    StateSaved {
        engine: String,
    },
    QueueOccupancy {
        engine_type: EngineType,
        percent: f32,
    },
    /// An error absorbed on the owning thread (never propagated)
    Rejected {
        code: i32,
        context: String,
        message: String,
    },
}
