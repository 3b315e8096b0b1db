// Deferred diagnostics
//
// The owning thread is usually the audio thread, where logging (the
// subscriber writes to stderr under a lock) and the telemetry hub (mutex
// guarded history) are off limits. The dispatcher therefore never logs or
// records on its own: it pushes a `Report` into a lock-free SPSC ring and a
// control thread turns the reports into log lines and telemetry.
//
// Flow:
// 1. Owning thread: EngineDispatcher pushes Report -> rtrb producer
// 2. Control thread: DispatcherHandle::flush_reports() -> rtrb consumer
// 3. Control thread: Report::emit() -> log + telemetry::hub()
//
// A full ring drops the report and bumps a shared counter; the next flush
// logs how many were lost.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use rtrb::{Consumer, Producer, RingBuffer};

use crate::engine::{EngineType, InputEvent};
use crate::error::{log_dispatch_error, DispatchError};
use crate::telemetry;

/// Reports buffered between two flushes before new ones are dropped.
pub const REPORT_QUEUE_CAPACITY: usize = 256;

/// Something the dispatcher did that is worth a log line or a metric.
#[derive(Debug)]
pub enum Report {
    Switched {
        engine_type: EngineType,
        from: String,
        to: String,
        elapsed: Duration,
    },
    NameMismatch {
        reported: String,
        registered: String,
    },
    StateSaved {
        engine: String,
    },
    PresetCreated {
        engine: String,
        name: String,
        index: usize,
        overwritten: bool,
    },
    PresetSelected {
        engine: String,
        index: usize,
        name: String,
    },
    InputIgnored {
        engine: String,
        event: InputEvent,
    },
    QueueOccupancy {
        engine_type: EngineType,
        percent: f32,
    },
    /// Persisted blob failed to restore; the engine runs on defaults
    RestoreFailed { error: DispatchError },
    /// Error absorbed on the owning thread (clamped action, bad segment)
    Rejected {
        error: DispatchError,
        context: &'static str,
    },
}

impl Report {
    /// Log the report and record it with the telemetry hub.
    ///
    /// Control threads only.
    pub fn emit(self) {
        let hub = telemetry::hub();
        match self {
            Report::Switched {
                engine_type,
                from,
                to,
                elapsed,
            } => {
                info!(
                    "[Dispatcher] Switched {} engine '{}' -> '{}' in {:?}",
                    engine_type, from, to, elapsed
                );
                hub.record_switch(engine_type, &from, &to, elapsed);
            }
            Report::NameMismatch {
                reported,
                registered,
            } => {
                warn!(
                    "[Dispatcher] Engine reports name '{}' but is registered as '{}'",
                    reported, registered
                );
            }
            Report::StateSaved { engine } => {
                debug!("[Dispatcher] Saved state for '{}'", engine);
                hub.record_state_saved(&engine);
            }
            Report::PresetCreated {
                engine,
                name,
                index,
                overwritten,
            } => {
                info!(
                    "[Dispatcher] {} preset '{}' for '{}' at index {}",
                    if overwritten { "Overwrote" } else { "Created" },
                    name,
                    engine,
                    index
                );
                hub.record_preset_created(&engine, &name, index, overwritten);
            }
            Report::PresetSelected {
                engine,
                index,
                name,
            } => {
                debug!(
                    "[Dispatcher] Loaded preset '{}' ({}) into '{}'",
                    name, index, engine
                );
                hub.record_preset_selected(&engine, index, &name);
            }
            Report::InputIgnored { engine, event } => {
                debug!("[Dispatcher] '{}' ignored input {:?}", engine, event);
            }
            Report::QueueOccupancy {
                engine_type,
                percent,
            } => {
                hub.record_queue_occupancy(engine_type, percent);
            }
            Report::RestoreFailed { error } => {
                log_dispatch_error(&error, "restore engine state");
                hub.record_rejection(&error, "restore engine state");
            }
            Report::Rejected { error, context } => {
                warn!("[Dispatcher] {}: {}", context, error);
                hub.record_rejection(&error, context);
            }
        }
    }
}

/// Owning-thread end of the report ring. Never blocks.
pub(crate) struct ReportSender {
    producer: Producer<Report>,
    dropped: Arc<AtomicUsize>,
}

impl ReportSender {
    pub(crate) fn push(&mut self, report: Report) {
        if self.producer.push(report).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Control-thread end of the report ring.
pub struct ReportReceiver {
    consumer: Consumer<Report>,
    dropped: Arc<AtomicUsize>,
}

impl ReportReceiver {
    /// Emit every pending report.
    ///
    /// # Returns
    /// Number of reports emitted
    pub fn flush(&mut self) -> usize {
        let mut emitted = 0;
        while let Ok(report) = self.consumer.pop() {
            report.emit();
            emitted += 1;
        }
        let dropped = self.dropped.swap(0, Ordering::Relaxed);
        if dropped > 0 {
            warn!(
                "[Dispatcher] {} diagnostics dropped, reports were not flushed in time",
                dropped
            );
        }
        emitted
    }

    /// Reports waiting to be flushed.
    pub fn pending(&self) -> usize {
        self.consumer.slots()
    }
}

pub(crate) fn report_queue(capacity: usize) -> (ReportSender, ReportReceiver) {
    let (producer, consumer) = RingBuffer::new(capacity.max(1));
    let dropped = Arc::new(AtomicUsize::new(0));
    (
        ReportSender {
            producer,
            dropped: Arc::clone(&dropped),
        },
        ReportReceiver { consumer, dropped },
    )
}
