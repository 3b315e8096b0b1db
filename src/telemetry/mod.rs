//! Diagnostics telemetry collector and helpers.
//!
//! The collector multiplexes switch timings, preset activity, queue
//! occupancy, and absorbed errors into a bounded history plus a broadcast
//! stream. Nothing here is reachable from a processing call.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use once_cell::sync::Lazy;
use tokio::sync::broadcast;

use crate::engine::EngineType;
use crate::error::{DispatchError, ErrorCode};

pub mod events;

pub use events::MetricEvent;

/// Global telemetry hub shared across the crate.
static HUB: Lazy<TelemetryHub> = Lazy::new(TelemetryHub::default);

/// Access the global telemetry hub.
pub fn hub() -> &'static TelemetryHub {
    &HUB
}

/// Snapshot of collector state for CLI reporting.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TelemetrySnapshot {
    pub recent: Vec<MetricEvent>,
    pub total_events: u64,
    pub dropped_events: u64,
}

/// Broadcast-based collector retaining a bounded history of metrics.
pub struct TelemetryCollector {
    tx: broadcast::Sender<MetricEvent>,
    history: Mutex<VecDeque<MetricEvent>>,
    history_capacity: usize,
    total_events: AtomicU64,
    dropped_history: AtomicU64,
}

impl TelemetryCollector {
    pub fn new(buffer: usize, history_capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer.max(1));
        Self {
            tx,
            history: Mutex::new(VecDeque::with_capacity(history_capacity)),
            history_capacity,
            total_events: AtomicU64::new(0),
            dropped_history: AtomicU64::new(0),
        }
    }

    pub fn publish(&self, event: MetricEvent) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut history) = self.history.lock() {
            if history.len() == self.history_capacity {
                history.pop_front();
                self.dropped_history.fetch_add(1, Ordering::Relaxed);
            }
            history.push_back(event.clone());
        }

        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MetricEvent> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let recent = self
            .history
            .lock()
            .map(|history| history.iter().cloned().collect())
            .unwrap_or_default();
        TelemetrySnapshot {
            recent,
            total_events: self.total_events.load(Ordering::Relaxed),
            dropped_events: self.dropped_history.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new(256, 64)
    }
}

/// Rolling window over engine switch durations.
struct SwitchTimer {
    samples: VecDeque<f32>,
    max_samples: usize,
}

impl SwitchTimer {
    fn new(max_samples: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(max_samples),
            max_samples: max_samples.max(1),
        }
    }

    fn observe(&mut self, value_us: f32) -> (f32, f32, usize) {
        if self.samples.len() == self.max_samples {
            self.samples.pop_front();
        }
        self.samples.push_back(value_us);

        let count = self.samples.len();
        let sum: f32 = self.samples.iter().copied().sum();
        let max = self
            .samples
            .iter()
            .copied()
            .fold(0.0_f32, |acc, next| acc.max(next));
        (sum / count as f32, max, count)
    }
}

/// Top-level hub wrapping collector state plus derived gauges.
pub struct TelemetryHub {
    collector: TelemetryCollector,
    switch_timer: Mutex<SwitchTimer>,
    queue_gauges: Mutex<HashMap<EngineType, f32>>,
}

impl TelemetryHub {
    pub fn new(channel_capacity: usize, history_capacity: usize, timing_window: usize) -> Self {
        Self {
            collector: TelemetryCollector::new(channel_capacity, history_capacity),
            switch_timer: Mutex::new(SwitchTimer::new(timing_window)),
            queue_gauges: Mutex::new(HashMap::new()),
        }
    }

    pub fn collector(&self) -> &TelemetryCollector {
        &self.collector
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.collector.snapshot()
    }

    pub fn record_switch(&self, engine_type: EngineType, from: &str, to: &str, elapsed: Duration) {
        let elapsed_us = elapsed.as_micros() as u64;
        self.collector.publish(MetricEvent::EngineSwitched {
            engine_type,
            from: from.to_string(),
            to: to.to_string(),
            elapsed_us,
        });

        let timing = self
            .switch_timer
            .lock()
            .map(|mut timer| timer.observe(elapsed_us as f32));
        if let Ok((avg_us, max_us, sample_count)) = timing {
            self.collector.publish(MetricEvent::SwitchTiming {
                avg_us,
                max_us,
                sample_count,
            });
        }
    }

    pub fn record_preset_selected(&self, engine: &str, index: usize, name: &str) {
        self.collector.publish(MetricEvent::PresetSelected {
            engine: engine.to_string(),
            index,
            name: name.to_string(),
        });
    }

    pub fn record_preset_created(&self, engine: &str, name: &str, index: usize, overwritten: bool) {
        self.collector.publish(MetricEvent::PresetCreated {
            engine: engine.to_string(),
            name: name.to_string(),
            index,
            overwritten,
        });
    }

    pub fn record_state_saved(&self, engine: &str) {
        self.collector.publish(MetricEvent::StateSaved {
            engine: engine.to_string(),
        });
    }

    /// Emit queue occupancy, skipping changes under 2.5 percentage points.
    pub fn record_queue_occupancy(&self, engine_type: EngineType, percent: f32) {
        let normalized = percent.clamp(0.0, 100.0);
        let Ok(mut gauges) = self.queue_gauges.lock() else {
            return;
        };

        let should_emit = gauges
            .get(&engine_type)
            .map(|last| (last - normalized).abs() >= 2.5)
            .unwrap_or(true);

        if should_emit {
            gauges.insert(engine_type, normalized);
            self.collector.publish(MetricEvent::QueueOccupancy {
                engine_type,
                percent: normalized,
            });
        }
    }

    pub fn record_rejection(&self, err: &DispatchError, context: impl Into<String>) {
        self.collector.publish(MetricEvent::Rejected {
            code: err.code(),
            context: context.into(),
            message: err.message(),
        });
    }
}

impl Default for TelemetryHub {
    fn default() -> Self {
        Self::new(256, 64, 32)
    }
}
