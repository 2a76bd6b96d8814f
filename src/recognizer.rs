//! High-level API for running the recognizer pipelines.
//!
//! We expose a single entry point (`Recognizer`) that wires up media decoding
//! → segmentation → (for diarization) embedding, clustering, and labeling →
//! optional roster identification, reporting progress through `ElanProgress`
//! at each stage boundary.
//!
//! The inference itself belongs entirely to `pyannote-rs`: this module only
//! marshals parameters into it and turns its segments into speaker tiers.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, ensure};
use pyannote_rs::{EmbeddingExtractor, EmbeddingManager};
use tracing::{debug, warn};

use crate::audio::{self, PIPELINE_SAMPLE_RATE};
use crate::opts::{DiarizationOpts, ModeOpts, Opts, VadOpts};
use crate::progress::ElanProgress;
use crate::turns::{SpeakerTurns, Turn, TurnFilter};
use crate::verify::{Centroids, Roster};

/// Prefix for machine-generated tier labels, so recognizer output is easy to
/// tell apart from hand-made tiers.
pub const TIER_PREFIX: &str = "Tierscribe_";

/// Label of the single tier VAD mode produces.
const SPEECH_LABEL: &str = "SPEECH";

/// Cosine-similarity threshold for assigning a turn to an existing cluster.
const CLUSTER_SIMILARITY_THRESHOLD: f32 = 0.5;

/// Turns shorter than this rarely yield a usable speaker embedding.
const MIN_EMBEDDING_SECONDS: f64 = 0.5;

/// The main recognizer entry point.
///
/// Construction validates the model paths up front so a misconfigured run
/// fails before any decoding starts; `run` performs one full pass over the
/// source media.
pub struct Recognizer {
    segmentation_model: PathBuf,
    embedding_model: Option<PathBuf>,
}

impl Recognizer {
    pub fn new(opts: &Opts) -> Result<Self> {
        require_model_file("segmentation model", &opts.checkpoint)?;

        let embedding_model = match &opts.mode {
            ModeOpts::Vad(_) => None,
            ModeOpts::Diarization(diarization) => {
                require_model_file("speaker-embedding model", &diarization.embedding_model)?;
                Some(diarization.embedding_model.clone())
            }
        };

        Ok(Self {
            segmentation_model: opts.checkpoint.clone(),
            embedding_model,
        })
    }

    /// Run the configured service over the source media.
    pub fn run<W: Write>(&self, opts: &Opts, progress: &mut ElanProgress<W>) -> Result<SpeakerTurns> {
        let samples = audio::load_pipeline_samples(&opts.source)?;
        debug!(
            source = %opts.source.display(),
            samples = samples.len(),
            "decoded source media"
        );

        match &opts.mode {
            ModeOpts::Vad(vad) => self.run_vad(vad, &samples, progress),
            ModeOpts::Diarization(diarization) => {
                self.run_diarization(diarization, &samples, progress)
            }
        }
    }

    /// Voice activity detection: segmentation only, one output tier.
    fn run_vad<W: Write>(
        &self,
        vad: &VadOpts,
        samples: &[i16],
        progress: &mut ElanProgress<W>,
    ) -> Result<SpeakerTurns> {
        debug!(
            onset = vad.onset,
            offset = vad.offset,
            "activation thresholds are fixed by the bundled segmentation model"
        );

        let mut detected: Vec<Turn> = self
            .segment(samples, progress)?
            .into_iter()
            .map(|(turn, _)| turn)
            .collect();

        let filter = TurnFilter {
            min_duration_on: vad.min_duration_on as f64,
            min_duration_off: vad.min_duration_off as f64,
        };
        filter.apply(&mut detected);

        let mut turns = SpeakerTurns::new();
        if !detected.is_empty() {
            turns.extend(SPEECH_LABEL, detected);
        }
        Ok(turns.with_prefix(TIER_PREFIX))
    }

    /// Speaker diarization: segmentation, embedding, clustering, labeling.
    fn run_diarization<W: Write>(
        &self,
        diarization: &DiarizationOpts,
        samples: &[i16],
        progress: &mut ElanProgress<W>,
    ) -> Result<SpeakerTurns> {
        if let Some(min_speakers) = diarization.min_speakers {
            debug!(
                min_speakers,
                "minimum speaker count is not enforced by nearest-centroid clustering"
            );
        }

        let segments = self.segment(samples, progress)?;
        if segments.is_empty() {
            return Ok(SpeakerTurns::new());
        }
        let total = segments.len() as u64;

        let embedding_model = self
            .embedding_model
            .as_ref()
            .context("diarization requires a speaker-embedding model")?;
        let mut extractor = EmbeddingExtractor::new(path_str(embedding_model)?)
            .map_err(|e| anyhow!("failed to load speaker-embedding model: {e}"))?;

        // One embedding per turn. Turns too short to embed keep a `None` so
        // progress still counts them.
        let mut embedded: Vec<(Turn, Option<Vec<f32>>)> = Vec::with_capacity(segments.len());
        for (i, (turn, turn_samples)) in segments.into_iter().enumerate() {
            let embedding = if turn.duration() < MIN_EMBEDDING_SECONDS {
                debug!(start = turn.start, end = turn.end, "turn too short for a speaker embedding");
                None
            } else {
                match extractor.compute(&turn_samples) {
                    Ok(embedding) => Some(embedding.collect::<Vec<f32>>()),
                    Err(e) => {
                        warn!(
                            start = turn.start,
                            end = turn.end,
                            "failed to compute speaker embedding: {e}"
                        );
                        None
                    }
                }
            };

            embedded.push((turn, embedding));
            progress.step("embedding", (i + 1) as u64, total)?;
        }

        // Nearest-centroid clustering through the library's embedding
        // manager. An exact or maximum speaker count caps its capacity; once
        // the cap is reached the zero-threshold retry assigns the turn to the
        // nearest existing speaker.
        let capacity = diarization
            .num_speakers
            .or(diarization.max_speakers)
            .unwrap_or(usize::MAX);
        let mut manager = EmbeddingManager::new(capacity);

        let wants_identification = diarization.speaker_verification_csv.is_some();
        let mut centroids = wants_identification.then(Centroids::new);

        let mut labeled: Vec<(Turn, String)> = Vec::new();
        for (i, (turn, embedding)) in embedded.into_iter().enumerate() {
            if let Some(embedding) = embedding {
                let speaker = manager
                    .search_speaker(embedding.clone(), CLUSTER_SIMILARITY_THRESHOLD)
                    .or_else(|| manager.search_speaker(embedding.clone(), 0.0))
                    .unwrap_or(0);
                let label = format!("SPEAKER_{speaker:02}");

                if let Some(centroids) = centroids.as_mut() {
                    centroids.add(&label, &embedding);
                }
                labeled.push((turn, label));
            }
            progress.step("clustering", (i + 1) as u64, total)?;
        }

        // Group by speaker and bridge within-speaker gaps.
        let mut turns = SpeakerTurns::new();
        for (turn, label) in labeled {
            turns.push(&label, turn);
        }

        let filter = TurnFilter {
            min_duration_on: 0.0,
            min_duration_off: diarization.min_duration_off as f64,
        };
        let speakers = turns.len() as u64;
        for (i, (_, speaker_turns)) in turns.iter_mut().enumerate() {
            filter.apply(speaker_turns);
            progress.step("labeling", (i + 1) as u64, speakers)?;
        }
        turns.retain_non_empty();

        // Roster identification replaces cluster labels with user-supplied
        // identities; without a roster the clusters keep prefixed machine
        // labels.
        match &diarization.speaker_verification_csv {
            Some(csv_path) => {
                let roster = Roster::load(csv_path, &mut extractor)?;
                let centroids = centroids
                    .context("centroids were not accumulated for identification")?
                    .finish();
                Ok(roster.identify(&turns, &centroids))
            }
            None => Ok(turns.with_prefix(TIER_PREFIX)),
        }
    }

    /// Run the segmentation model over the decoded samples.
    ///
    /// The call is a single opaque inference pass, so it reports as a
    /// one-item step. Each detected turn comes back with the samples it
    /// covers, which the diarization path feeds to the embedding model.
    fn segment<W: Write>(
        &self,
        samples: &[i16],
        progress: &mut ElanProgress<W>,
    ) -> Result<Vec<(Turn, Vec<i16>)>> {
        progress.step("segmentation", 0, 1)?;

        let segments = pyannote_rs::segment(
            samples,
            PIPELINE_SAMPLE_RATE,
            path_str(&self.segmentation_model)?,
        )
        .map_err(|e| anyhow!("speech segmentation failed: {e}"))?;

        let turns: Vec<(Turn, Vec<i16>)> = segments
            .into_iter()
            .map(|segment| {
                let turn = Turn {
                    start: segment.start as f64,
                    end: segment.end as f64,
                };
                (turn, segment.samples)
            })
            .collect();

        progress.step("segmentation", 1, 1)?;
        debug!(turns = turns.len(), "segmentation finished");
        Ok(turns)
    }
}

fn require_model_file(what: &str, path: &Path) -> Result<()> {
    ensure!(
        path.is_file(),
        "{what} not found at '{}'",
        path.display()
    );
    Ok(())
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str()
        .with_context(|| format!("model path '{}' is not valid UTF-8", path.display()))
}
