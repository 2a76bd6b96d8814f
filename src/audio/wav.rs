//! WAV fast path.
//!
//! Fieldwork recordings are very often already mono 16 kHz 16-bit WAV. Those
//! can be handed to the pipelines directly without running the full
//! probe/decode/resample machinery; anything else falls through to the
//! general decoder.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use hound::{SampleFormat, WavReader};

use super::PIPELINE_SAMPLE_RATE;

/// Read `path` as 16-bit PCM when it is already in pipeline format.
///
/// Returns `Ok(None)` when the file isn't a WAV (by extension or content) or
/// doesn't match the pipeline format; the caller then runs the full decode
/// path. A WAV that matches but can't be read cleanly is an error.
pub(crate) fn try_read_conformant_wav(path: &Path) -> Result<Option<Vec<i16>>> {
    let is_wav = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"));
    if !is_wav {
        return Ok(None);
    }

    let file = File::open(path)
        .with_context(|| format!("failed to open media file '{}'", path.display()))?;

    // A `.wav` extension on a non-WAV container happens in the wild; let the
    // general decoder have a go instead of failing here.
    let mut reader = match WavReader::new(BufReader::new(file)) {
        Ok(reader) => reader,
        Err(_) => return Ok(None),
    };

    let spec = reader.spec();
    if spec.channels != 1
        || spec.sample_rate != PIPELINE_SAMPLE_RATE
        || spec.sample_format != SampleFormat::Int
        || spec.bits_per_sample != 16
    {
        return Ok(None);
    }

    let samples = reader
        .samples::<i16>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("failed to read WAV samples from '{}'", path.display()))?;

    Ok(Some(samples))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, sample_rate: u32, channels: u16) -> anyhow::Result<()> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec)?;
        for i in 0..(channels as i16 * 8) {
            writer.write_sample(i * 100)?;
        }
        writer.finalize()?;
        Ok(())
    }

    #[test]
    fn reads_conformant_wav_directly() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("speech.wav");
        write_wav(&path, PIPELINE_SAMPLE_RATE, 1)?;

        let samples = try_read_conformant_wav(&path)?.expect("fast path taken");
        assert_eq!(samples.len(), 8);
        assert_eq!(samples[1], 100);
        Ok(())
    }

    #[test]
    fn falls_through_for_other_sample_rates() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("speech.wav");
        write_wav(&path, 44_100, 1)?;

        assert!(try_read_conformant_wav(&path)?.is_none());
        Ok(())
    }

    #[test]
    fn falls_through_for_stereo() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("speech.wav");
        write_wav(&path, PIPELINE_SAMPLE_RATE, 2)?;

        assert!(try_read_conformant_wav(&path)?.is_none());
        Ok(())
    }

    #[test]
    fn ignores_non_wav_extensions() -> anyhow::Result<()> {
        assert!(try_read_conformant_wav(Path::new("video.mp4"))?.is_none());
        Ok(())
    }
}
