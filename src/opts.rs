//! Options that control a recognizer run.
//!
//! This struct represents *library-level configuration*, not the wire
//! protocol directly. The recognizer binary is responsible for mapping the
//! ELAN parameter map into this type so that:
//! - the library remains reusable outside of the ELAN process contract
//! - other frontends (tests, batch jobs) can construct options
//!   programmatically

use std::path::PathBuf;

use crate::error::Result;
use crate::params::ParamMap;

/// Which recognizer service to run.
///
/// ELAN's recognizer description registers the two services as separate
/// entries that launch the same binary with a different first argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum Mode {
    /// Detect speech intervals without attributing them to speakers.
    Vad,

    /// Detect speech intervals and group them by speaker.
    Diarization,
}

/// Tuning parameters for voice activity detection.
#[derive(Debug, Clone)]
pub struct VadOpts {
    /// Activation threshold the user asked for.
    ///
    /// The bundled segmentation model applies fixed activation thresholds, so
    /// this is recorded for diagnostics rather than forwarded.
    pub onset: f32,

    /// Deactivation threshold; same status as `onset`.
    pub offset: f32,

    /// Drop detected turns shorter than this many seconds.
    pub min_duration_on: f32,

    /// Bridge silences shorter than this many seconds.
    pub min_duration_off: f32,
}

/// Tuning parameters for speaker diarization.
#[derive(Debug, Clone)]
pub struct DiarizationOpts {
    /// Bridge within-speaker silences shorter than this many seconds.
    pub min_duration_off: f32,

    /// Exact speaker count, when the user knows it.
    pub num_speakers: Option<usize>,

    /// Lower bound on the speaker count.
    ///
    /// Nearest-centroid clustering cannot enforce a minimum; the value is
    /// kept for diagnostics.
    pub min_speakers: Option<usize>,

    /// Upper bound on the speaker count.
    pub max_speakers: Option<usize>,

    /// Path to the speaker-embedding model.
    pub embedding_model: PathBuf,

    /// Optional roster file for speaker identification (`id,audio` columns).
    pub speaker_verification_csv: Option<PathBuf>,
}

/// Mode-specific configuration.
#[derive(Debug, Clone)]
pub enum ModeOpts {
    Vad(VadOpts),
    Diarization(DiarizationOpts),
}

/// The full configuration for one recognizer run.
#[derive(Debug, Clone)]
pub struct Opts {
    /// The media file to analyze.
    pub source: PathBuf,

    /// Where the tier XML is written.
    pub output_segments: PathBuf,

    /// Path to the segmentation model.
    pub checkpoint: PathBuf,

    /// Per-mode tuning.
    pub mode: ModeOpts,
}

impl Opts {
    /// Build the run configuration from the decoded ELAN parameters.
    pub fn from_params(mode: Mode, params: &ParamMap) -> Result<Self> {
        // Check the output path first: a run that cannot write its result is
        // reported before any other validation.
        let output_segments = params.path("output_segments")?;
        let source = params.path("source")?;
        let checkpoint = params.path("checkpoint")?;

        let mode = match mode {
            Mode::Vad => ModeOpts::Vad(VadOpts {
                onset: params.f32("onset")?,
                offset: params.f32("offset")?,
                min_duration_on: params.f32("min_duration_on")?,
                min_duration_off: params.f32("min_duration_off")?,
            }),
            Mode::Diarization => ModeOpts::Diarization(DiarizationOpts {
                min_duration_off: params.f32("min_duration_off")?,
                num_speakers: params.speaker_count("num_speakers", "Unknown")?,
                min_speakers: params.speaker_count("min_speakers", "_")?,
                max_speakers: params.speaker_count("max_speakers", "_")?,
                embedding_model: params.path("embedding_model")?,
                speaker_verification_csv: params.opt_path("speaker_verification_csv"),
            }),
        };

        Ok(Self {
            source,
            output_segments,
            checkpoint,
            mode,
        })
    }

    /// The service this configuration runs.
    pub fn mode(&self) -> Mode {
        match self.mode {
            ModeOpts::Vad(_) => Mode::Vad,
            ModeOpts::Diarization(_) => Mode::Diarization,
        }
    }
}
