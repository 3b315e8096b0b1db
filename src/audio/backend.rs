//! Stub audio backend
//!
//! Runs a dispatcher on a dedicated thread that behaves like a device
//! callback: fixed-size blocks, paced at the block period. No audio hardware
//! is touched, so the whole switch/process discipline can be exercised on any
//! desktop machine and in `cargo test`.
//!
//! The dispatcher is moved into the thread on `start` and handed back by
//! `stop`, so persistence (`to_json`/`from_json`) always runs off the audio
//! thread.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use log::{debug, info};

use super::callback::DispatchCallback;
use crate::config::AudioConfig;
use crate::dispatcher::EngineDispatcher;
use crate::engine::{ChannelLayout, ProcessContext};
use crate::error::{log_audio_error, AudioError};

/// How the audio thread schedules blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// One block per block period, like a device callback
    RealTime,
    /// Blocks back to back, yielding between them
    Freewheel,
}

pub struct StubAudioBackend {
    worker: Option<JoinHandle<EngineDispatcher>>,
    shutdown: Arc<AtomicBool>,
    frame_counter: Arc<AtomicU64>,
    block_counter: Arc<AtomicU64>,
}

impl StubAudioBackend {
    /// Start the audio thread at real-time pace.
    ///
    /// # Errors
    /// `InvalidFormat` for a zero sample rate or block size, or a channel
    /// count other than 1 or 2; `ThreadSpawnFailed` if the thread cannot be
    /// created.
    pub fn start(dispatcher: EngineDispatcher, config: &AudioConfig) -> Result<Self, AudioError> {
        Self::start_with_pacing(dispatcher, config, Pacing::RealTime)
    }

    pub fn start_with_pacing(
        dispatcher: EngineDispatcher,
        config: &AudioConfig,
        pacing: Pacing,
    ) -> Result<Self, AudioError> {
        let layout = validate_format(config).inspect_err(|err| log_audio_error(err, "start"))?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let frame_counter = Arc::new(AtomicU64::new(0));
        let block_counter = Arc::new(AtomicU64::new(0));

        let ctx = ProcessContext::new(config.sample_rate, layout);
        let block_samples = config.block_size * layout.channels();
        let period = config.block_period();

        let worker = {
            let shutdown = Arc::clone(&shutdown);
            let frame_counter = Arc::clone(&frame_counter);
            let block_counter = Arc::clone(&block_counter);
            thread::Builder::new()
                .name(format!("audio-{}", dispatcher.engine_type()))
                .spawn(move || {
                    let mut callback = DispatchCallback::new(dispatcher, ctx, frame_counter);
                    let mut buffer = vec![0.0_f32; block_samples];
                    let mut next_deadline = Instant::now();

                    while !shutdown.load(Ordering::Acquire) {
                        callback.render(&mut buffer);
                        block_counter.fetch_add(1, Ordering::Relaxed);

                        match pacing {
                            Pacing::RealTime => {
                                next_deadline += period;
                                let now = Instant::now();
                                if next_deadline > now {
                                    thread::sleep(next_deadline - now);
                                } else {
                                    // overran, resync instead of bursting
                                    next_deadline = now;
                                }
                            }
                            Pacing::Freewheel => thread::yield_now(),
                        }
                    }
                    callback.into_dispatcher()
                })
                .map_err(AudioError::from)
                .inspect_err(|err| log_audio_error(err, "start"))?
        };

        info!(
            "[StubAudioBackend] Started: {} Hz, {} frames x {} ch, {:?}",
            config.sample_rate, config.block_size, config.channels, pacing
        );
        Ok(Self {
            worker: Some(worker),
            shutdown,
            frame_counter,
            block_counter,
        })
    }

    /// Stop the audio thread and take the dispatcher back.
    ///
    /// # Errors
    /// `ThreadPanicked` if the audio thread panicked; `NotRunning` if the
    /// backend was already stopped.
    pub fn stop(mut self) -> Result<EngineDispatcher, AudioError> {
        self.shutdown.store(true, Ordering::Release);
        let worker = self.worker.take().ok_or(AudioError::NotRunning)?;
        let dispatcher = worker.join().map_err(|_| {
            let err = AudioError::ThreadPanicked;
            log_audio_error(&err, "stop");
            err
        })?;
        info!(
            "[StubAudioBackend] Stopped after {} blocks ({} frames)",
            self.blocks(),
            self.frames()
        );
        Ok(dispatcher)
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .map(|worker| !worker.is_finished())
            .unwrap_or(false)
    }

    /// Frames rendered so far
    pub fn frames(&self) -> u64 {
        self.frame_counter.load(Ordering::Relaxed)
    }

    /// Blocks rendered so far
    pub fn blocks(&self) -> u64 {
        self.block_counter.load(Ordering::Relaxed)
    }
}

impl Drop for StubAudioBackend {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            self.shutdown.store(true, Ordering::Release);
            // dispatcher is discarded with the backend
            if worker.join().is_err() {
                log_audio_error(&AudioError::ThreadPanicked, "drop");
            }
            debug!("[StubAudioBackend] Dropped while running");
        }
    }
}

fn validate_format(config: &AudioConfig) -> Result<ChannelLayout, AudioError> {
    let reason = if config.sample_rate == 0 {
        "sample_rate is 0".to_string()
    } else if config.block_size == 0 {
        "block_size is 0".to_string()
    } else if let Some(layout) = config.channel_layout() {
        return Ok(layout);
    } else {
        format!("{} channels, expected 1 or 2", config.channels)
    };
    Err(AudioError::InvalidFormat { reason })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DispatcherConfig;
    use crate::engines::synth_registry;
    use std::time::Duration;

    fn dispatcher() -> EngineDispatcher {
        EngineDispatcher::new(synth_registry().unwrap(), &DispatcherConfig::default()).unwrap()
    }

    fn wait_for_blocks(backend: &StubAudioBackend, blocks: u64) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while backend.blocks() < blocks && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_start_and_stop_returns_dispatcher() {
        let backend =
            StubAudioBackend::start_with_pacing(dispatcher(), &AudioConfig::default(), Pacing::Freewheel)
                .unwrap();
        wait_for_blocks(&backend, 4);
        assert!(backend.is_running());

        let blocks = backend.blocks();
        assert!(blocks >= 4);
        assert!(backend.frames() >= blocks * 256);

        let dispatcher = backend.stop().unwrap();
        assert_eq!(dispatcher.current().name(), "Off");
    }

    #[test]
    fn test_switch_requested_while_running() {
        let mut dispatcher = dispatcher();
        let mut handle = dispatcher.take_handle().unwrap();
        let backend = StubAudioBackend::start(dispatcher, &AudioConfig::default()).unwrap();

        handle.select_engine(2).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while handle.snapshot().engine_idx != 2 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }

        let dispatcher = backend.stop().unwrap();
        assert_eq!(dispatcher.current().name(), "Bass");
    }

    #[test]
    fn test_invalid_format_is_rejected() {
        let config = AudioConfig {
            block_size: 0,
            ..AudioConfig::default()
        };
        let err = StubAudioBackend::start(dispatcher(), &config).err().unwrap();
        assert!(matches!(err, AudioError::InvalidFormat { .. }));
    }

    #[test]
    fn test_surround_channel_count_is_rejected() {
        let config = AudioConfig {
            channels: 6,
            ..AudioConfig::default()
        };
        let err = StubAudioBackend::start(dispatcher(), &config).err().unwrap();
        assert!(
            matches!(&err, AudioError::InvalidFormat { reason } if reason.contains("6 channels"))
        );
    }
}
