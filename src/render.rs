//! Offline rendering of a dispatcher to a WAV file.
//!
//! Uses the same drain-then-process block loop as the audio thread, so
//! queued actions take effect at block boundaries exactly as they would
//! live.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use hound::{SampleFormat, WavSpec, WavWriter};

use crate::config::AudioConfig;
use crate::dispatcher::EngineDispatcher;
use crate::engine::ProcessContext;

/// What a render produced
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSummary {
    pub frames: u64,
    pub blocks: u64,
    /// Absolute peak over all channels
    pub peak: f32,
}

/// Render `frames` frames of the active engine into a 32-bit float WAV.
pub fn render_to_wav(
    dispatcher: &mut EngineDispatcher,
    frames: u64,
    path: &Path,
    audio: &AudioConfig,
) -> Result<RenderSummary> {
    if audio.block_size == 0 || audio.sample_rate == 0 {
        anyhow::bail!("block_size and sample_rate must be non-zero");
    }

    let layout = audio
        .channel_layout()
        .ok_or_else(|| anyhow!("{} channels, expected 1 or 2", audio.channels))?;
    let spec = WavSpec {
        channels: layout.channels() as u16,
        sample_rate: audio.sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer =
        WavWriter::create(path, spec).with_context(|| format!("creating {}", path.display()))?;

    let mut ctx = ProcessContext::new(audio.sample_rate, layout);
    let mut buffer = vec![0.0_f32; audio.block_size * layout.channels()];
    let mut summary = RenderSummary {
        frames: 0,
        blocks: 0,
        peak: 0.0,
    };

    while summary.frames < frames {
        let block_frames = (frames - summary.frames).min(audio.block_size as u64) as usize;
        let block = &mut buffer[..block_frames * layout.channels()];

        dispatcher.drain_actions();
        ctx.frame = summary.frames;
        dispatcher.process(block, &ctx);

        for &sample in block.iter() {
            summary.peak = summary.peak.max(sample.abs());
            writer
                .write_sample(sample)
                .with_context(|| format!("writing {}", path.display()))?;
        }
        summary.frames += block_frames as u64;
        summary.blocks += 1;
    }
    dispatcher.flush_reports();

    writer
        .finalize()
        .with_context(|| format!("finalizing {}", path.display()))?;
    log::info!(
        "[Render] Wrote {} frames of '{}' to {} (peak {:.3})",
        summary.frames,
        dispatcher.current_name(),
        path.display(),
        summary.peak
    );
    Ok(summary)
}
