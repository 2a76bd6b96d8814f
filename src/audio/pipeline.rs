//! PCM normalization: decoded buffers → mono samples at the pipeline rate.
//!
//! Responsibilities:
//! - Convert Symphonia-decoded PCM into interleaved `f32`
//! - Downmix to mono (equal-weight channel average)
//! - Resample to the pipeline sample rate when the source rate differs
//!
//! `finalize()` must be called at end-of-stream to flush any remaining
//! resampler input.

use anyhow::{Context, Result, anyhow, bail};
use rubato::{Resampler, SincFixedIn, WindowFunction};
use symphonia::core::audio::{AudioBufferRef, SampleBuffer};

use super::PIPELINE_SAMPLE_RATE;

/// A small stateful pipeline that collects decoded audio as mono samples at
/// the pipeline rate.
pub(crate) struct MonoPipeline {
    // Scratch buffer used to copy decoded PCM into an interleaved `Vec<f32>`.
    sample_buf_f32: Option<SampleBuffer<f32>>,

    // Lazily initialized resampler (only needed when the source sample rate
    // differs from the pipeline rate).
    resampler: Option<SincFixedIn<f32>>,

    // Accumulator for mono source samples awaiting a full resampler block.
    pending: Vec<f32>,
}

impl MonoPipeline {
    pub(crate) fn new() -> Self {
        Self {
            sample_buf_f32: None,
            resampler: None,
            pending: Vec::new(),
        }
    }

    /// Push a decoded Symphonia buffer through the pipeline, appending mono
    /// pipeline-rate samples to `out`.
    pub(crate) fn push(&mut self, decoded: &AudioBufferRef<'_>, out: &mut Vec<f32>) -> Result<()> {
        self.ensure_sample_buffer(decoded);
        let buf = self
            .sample_buf_f32
            .as_mut()
            .ok_or_else(|| anyhow!("sample buffer not initialized"))?;
        buf.copy_interleaved_ref(decoded.clone());

        let src_rate = decoded.spec().rate;
        let channels = decoded.spec().channels.count();
        if channels == 0 {
            bail!("decoded audio had zero channels");
        }

        let mono_src = downmix_to_mono(buf.samples(), channels);

        // Fast path: already at the pipeline sample rate.
        if src_rate == PIPELINE_SAMPLE_RATE {
            out.extend_from_slice(&mono_src);
            return Ok(());
        }

        self.ensure_resampler(src_rate)?;
        self.pending.extend_from_slice(&mono_src);
        self.drain_full_blocks(out)
    }

    /// Flush remaining buffered samples at end-of-stream.
    ///
    /// If resampling was never needed, this is a no-op.
    pub(crate) fn finalize(&mut self, out: &mut Vec<f32>) -> Result<()> {
        let Some(rs) = self.resampler.as_ref() else {
            return Ok(());
        };

        if self.pending.is_empty() {
            return Ok(());
        }

        // rubato expects exact block sizes; pad the remainder with zeros.
        let in_max = rs.input_frames_max();
        let rem = self.pending.len() % in_max;
        if rem != 0 {
            self.pending.resize(self.pending.len() + (in_max - rem), 0.0);
        }

        self.drain_full_blocks(out)
    }

    fn ensure_sample_buffer(&mut self, decoded: &AudioBufferRef<'_>) {
        if self.sample_buf_f32.is_some() {
            return;
        }
        let spec = *decoded.spec();
        let duration = decoded.capacity() as u64;
        self.sample_buf_f32 = Some(SampleBuffer::<f32>::new(duration, spec));
    }

    fn ensure_resampler(&mut self, src_rate: u32) -> Result<()> {
        if self.resampler.is_some() {
            return Ok(());
        }

        // How many source frames we feed rubato per `process()` call.
        let in_chunk_src_frames = 2048;

        let rs = SincFixedIn::<f32>::new(
            PIPELINE_SAMPLE_RATE as f64 / src_rate as f64,
            2.0,
            rubato::SincInterpolationParameters {
                sinc_len: 256,
                f_cutoff: 0.95,
                interpolation: rubato::SincInterpolationType::Linear,
                oversampling_factor: 256,
                window: WindowFunction::BlackmanHarris2,
            },
            in_chunk_src_frames,
            1, // mono
        )
        .map_err(|e| anyhow!(e))
        .context("failed to init resampler")?;

        self.resampler = Some(rs);
        Ok(())
    }

    /// Resample every complete input block sitting in `pending`.
    fn drain_full_blocks(&mut self, out: &mut Vec<f32>) -> Result<()> {
        let rs = self
            .resampler
            .as_mut()
            .ok_or_else(|| anyhow!("resampler not initialized"))?;
        let in_max = rs.input_frames_max();

        while self.pending.len() >= in_max {
            let block: Vec<f32> = self.pending.drain(..in_max).collect();

            let resampled = rs
                .process(&[block], None)
                .map_err(|e| anyhow!(e))
                .context("resampler process failed")?;

            if resampled.len() != 1 {
                bail!("expected mono output from resampler");
            }
            out.extend_from_slice(&resampled[0]);
        }

        Ok(())
    }
}

/// Downmix interleaved samples into mono by averaging channels.
fn downmix_to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels == 1 {
        return interleaved.to_vec();
    }

    let frames = interleaved.len() / channels;
    let mut mono = Vec::with_capacity(frames);

    for f in 0..frames {
        let base = f * channels;
        let mut acc = 0.0;
        for c in 0..channels {
            acc += interleaved[base + c];
        }
        mono.push(acc / channels as f32);
    }

    mono
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalize_is_noop_without_resampler() -> anyhow::Result<()> {
        let mut pipeline = MonoPipeline::new();
        let mut out = Vec::new();
        pipeline.finalize(&mut out)?;
        assert!(out.is_empty());
        Ok(())
    }

    #[test]
    fn downmix_to_mono_single_channel_is_identity() {
        let input = vec![0.0, 1.0, -1.0];
        assert_eq!(downmix_to_mono(&input, 1), input);
    }

    #[test]
    fn downmix_to_mono_averages_channels() {
        // Two frames of stereo: (L=1, R=3), (L=-1, R=1) => mono: 2, 0
        let interleaved = vec![1.0, 3.0, -1.0, 1.0];
        assert_eq!(downmix_to_mono(&interleaved, 2), vec![2.0, 0.0]);
    }

    #[test]
    fn drain_errors_when_resampler_is_missing() {
        let mut pipeline = MonoPipeline::new();
        let mut out = Vec::new();
        let err = pipeline.drain_full_blocks(&mut out).unwrap_err();
        assert!(err.to_string().contains("resampler not initialized"));
    }

    #[test]
    fn resample_path_emits_and_finalize_flushes_remainder() -> anyhow::Result<()> {
        let mut pipeline = MonoPipeline::new();
        pipeline.ensure_resampler(8_000)?;
        pipeline.ensure_resampler(8_000)?; // idempotent

        let in_max = pipeline
            .resampler
            .as_ref()
            .expect("resampler initialized")
            .input_frames_max();

        // Enough samples to force multiple full blocks plus a remainder that
        // `finalize()` flushes.
        pipeline.pending = vec![0.0; (in_max * 2) + 7];

        let mut out = Vec::new();
        pipeline.drain_full_blocks(&mut out)?;
        assert!(pipeline.pending.len() < in_max);

        pipeline.finalize(&mut out)?;
        assert!(pipeline.pending.is_empty());
        assert!(!out.is_empty());
        Ok(())
    }
}
