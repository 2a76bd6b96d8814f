//! Media decoding into the PCM format the inference pipelines expect.
//!
//! ELAN hands the recognizer whatever media file the user annotated (WAV,
//! MP4, MKV, Ogg, and so on). The pipelines want mono 16 kHz 16-bit PCM, so
//! this module:
//! - takes a fast path through `hound` when the file is already a conformant
//!   WAV
//! - otherwise probes and decodes the container with Symphonia, downmixes to
//!   mono, and resamples with rubato when the source rate differs

mod pipeline;
mod wav;

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result, anyhow, ensure};
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use pipeline::MonoPipeline;

/// The sample rate the segmentation and embedding models operate at (Hz).
pub const PIPELINE_SAMPLE_RATE: u32 = 16_000;

/// Decode a media file into mono 16 kHz 16-bit PCM.
pub fn load_pipeline_samples(path: &Path) -> Result<Vec<i16>> {
    if let Some(samples) = wav::try_read_conformant_wav(path)? {
        return Ok(samples);
    }
    decode_media_file(path)
}

/// Full decode path: probe, decode, downmix, resample.
fn decode_media_file(path: &Path) -> Result<Vec<i16>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open media file '{}'", path.display()))?;

    let mss_opts = MediaSourceStreamOptions {
        // Symphonia expects a power-of-two buffer > 32KiB for good probing
        // behavior.
        buffer_len: 256 * 1024,
    };
    let mss = MediaSourceStream::new(Box::new(file), mss_opts);

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let format_opts: FormatOptions = Default::default();
    let metadata_opts: MetadataOptions = Default::default();

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &format_opts, &metadata_opts)
        .map_err(|e| anyhow!(e))
        .with_context(|| format!("failed to probe media file '{}'", path.display()))?;

    let mut format = probed.format;

    // Pick the first decodable audio track with a known sample rate (required
    // for resampling decisions downstream).
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL && t.codec_params.sample_rate.is_some())
        .cloned()
        .ok_or_else(|| anyhow!("no audio track found in '{}'", path.display()))?;

    let decoder_opts: DecoderOptions = Default::default();
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &decoder_opts)
        .map_err(|e| anyhow!(e))
        .context("failed to create decoder for audio track")?;

    let mut pipeline = MonoPipeline::new();
    let mut mono_16k: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            // IO errors signal end-of-stream in Symphonia's model.
            Err(SymphoniaError::IoError(_)) => break,
            Err(e) => return Err(anyhow!(e)).context("failed reading packet"),
        };

        if packet.track_id() != track.id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => pipeline
                .push(&decoded, &mut mono_16k)
                .context("audio pipeline failed while processing decoded samples")?,
            // Recoverable: corrupted frame, keep decoding.
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(SymphoniaError::IoError(_)) => break,
            Err(e) => return Err(anyhow!(e)).context("decoder failure"),
        }
    }

    // Flush any buffered resampler tail.
    pipeline
        .finalize(&mut mono_16k)
        .context("audio pipeline failed during finalize")?;

    ensure!(
        !mono_16k.is_empty(),
        "no audio decoded from '{}'",
        path.display()
    );

    Ok(to_i16(&mono_16k))
}

/// Convert normalized `f32` samples into 16-bit PCM, clamping out-of-range
/// values instead of wrapping.
fn to_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16)
        .collect()
}
