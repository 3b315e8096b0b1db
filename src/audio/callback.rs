//! Per-block audio callback driving one dispatcher.
//!
//! # Real-Time Safety
//! `render` performs, in order:
//! - `drain_actions()` (the safe point where switches happen)
//! - one `process()` call on the active engine
//! - a relaxed atomic add on the shared frame counter
//!
//! The buffer is owned by the caller and reused across calls, so the steady
//! state allocates nothing. Allocation only happens inside a drain that
//! actually applies a switch or preset change.
//!
//! # Architecture
//! ```text
//! StubAudioBackend::start()
//!   └─> audio thread
//!       └─> DispatchCallback::render() [every block]
//!           ├─> EngineDispatcher::drain_actions()
//!           └─> EngineDispatcher::process()
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::dispatcher::EngineDispatcher;
use crate::engine::ProcessContext;

pub struct DispatchCallback {
    dispatcher: EngineDispatcher,
    ctx: ProcessContext,
    /// Frames rendered so far, shared with the control side
    frame_counter: Arc<AtomicU64>,
}

impl DispatchCallback {
    pub fn new(
        dispatcher: EngineDispatcher,
        ctx: ProcessContext,
        frame_counter: Arc<AtomicU64>,
    ) -> Self {
        Self {
            dispatcher,
            ctx,
            frame_counter,
        }
    }

    /// Render one interleaved block in place.
    ///
    /// # Returns
    /// Number of frames rendered
    #[inline]
    pub fn render(&mut self, buffer: &mut [f32]) -> usize {
        self.dispatcher.drain_actions();

        self.ctx.frame = self.frame_counter.load(Ordering::Relaxed);
        self.dispatcher.process(buffer, &self.ctx);

        let frames = self.ctx.frames(buffer.len());
        self.frame_counter
            .fetch_add(frames as u64, Ordering::Relaxed);
        frames
    }

    pub fn dispatcher(&self) -> &EngineDispatcher {
        &self.dispatcher
    }

    pub fn into_dispatcher(self) -> EngineDispatcher {
        self.dispatcher
    }
}
