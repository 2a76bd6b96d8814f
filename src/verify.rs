//! Nearest-neighbor speaker identification.
//!
//! Users can hand the diarization recognizer a roster: a CSV file with `id`
//! and `audio` columns, one reference recording per known speaker. Each
//! roster entry is embedded with the same speaker-embedding model the
//! diarization run uses; afterwards every diarized cluster's mean embedding
//! is compared against the roster by cosine distance and relabeled with the
//! nearest roster identity.
//!
//! This is a one-shot linear scan over a handful of vectors, not a search
//! structure.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result, anyhow, ensure};
use pyannote_rs::EmbeddingExtractor;
use serde::Deserialize;
use tracing::debug;

use crate::audio;
use crate::turns::SpeakerTurns;

/// Cosine distance at (or past) which two embeddings no longer count as the
/// same speaker: 0 = identical, 1 = orthogonal.
pub const MAX_MATCH_DISTANCE: f32 = 1.0;

/// One row of the roster file.
#[derive(Debug, Deserialize)]
struct RosterRow {
    id: String,
    audio: String,
}

/// Known speakers and their reference embeddings.
pub struct Roster {
    entries: Vec<(String, Vec<f32>)>,
}

impl Roster {
    /// Load a roster CSV and embed each referenced recording.
    ///
    /// Audio references are reduced to their file names and resolved in the
    /// CSV's own directory, so a roster folder can be moved as a unit.
    pub fn load(csv_path: &Path, extractor: &mut EmbeddingExtractor) -> Result<Self> {
        let raw = std::fs::read_to_string(csv_path)
            .with_context(|| format!("failed to read roster '{}'", csv_path.display()))?;
        // Spreadsheet exports often carry a UTF-8 BOM that would end up glued
        // to the first header name.
        let raw = raw.strip_prefix('\u{feff}').unwrap_or(&raw);

        let dir = csv_path.parent().unwrap_or_else(|| Path::new("."));

        let mut entries = Vec::new();
        let mut reader = csv::Reader::from_reader(raw.as_bytes());
        for row in reader.deserialize::<RosterRow>() {
            let row = row.with_context(|| format!("malformed roster '{}'", csv_path.display()))?;

            let file_name = Path::new(&row.audio)
                .file_name()
                .ok_or_else(|| anyhow!("roster entry '{}' has no audio file name", row.id))?;
            let audio_path = dir.join(file_name);

            let samples = audio::load_pipeline_samples(&audio_path).with_context(|| {
                format!("failed to load reference audio for roster speaker '{}'", row.id)
            })?;
            let embedding: Vec<f32> = extractor
                .compute(&samples)
                .map_err(|e| anyhow!("failed to embed reference audio for '{}': {e}", row.id))?
                .collect();

            entries.push((row.id, embedding));
        }

        ensure!(
            !entries.is_empty(),
            "roster '{}' contains no speakers",
            csv_path.display()
        );

        Ok(Self { entries })
    }

    /// Build a roster directly from identities and embeddings.
    pub fn from_entries(entries: Vec<(String, Vec<f32>)>) -> Self {
        Self { entries }
    }

    /// Replace diarized cluster labels with roster identities.
    ///
    /// Clusters with no roster match under the distance cutoff are dropped;
    /// clusters matching the same identity have their turns merged.
    pub fn identify(&self, turns: &SpeakerTurns, centroids: &BTreeMap<String, Vec<f32>>) -> SpeakerTurns {
        let mut identified = SpeakerTurns::new();

        for (label, cluster_turns) in turns.iter() {
            let Some(centroid) = centroids.get(label) else {
                debug!(speaker = label, "no centroid for diarized speaker; dropping");
                continue;
            };

            match self.nearest(centroid) {
                Some((id, distance)) => {
                    debug!(speaker = label, identity = id, distance, "roster match");
                    identified.extend(id, cluster_turns.iter().copied());
                }
                None => {
                    debug!(speaker = label, "no roster match under the distance cutoff");
                }
            }
        }

        identified.sort_turns();
        identified
    }

    /// Linear nearest-centroid scan.
    fn nearest(&self, embedding: &[f32]) -> Option<(&str, f32)> {
        let mut best: Option<(&str, f32)> = None;

        for (id, reference) in &self.entries {
            let distance = cosine_distance(embedding, reference);
            debug!(identity = id.as_str(), distance, "roster comparison");

            if distance < best.map_or(MAX_MATCH_DISTANCE, |(_, d)| d) {
                best = Some((id, distance));
            }
        }

        best
    }
}

/// Running mean embedding per diarized speaker label.
#[derive(Debug, Default)]
pub struct Centroids {
    sums: BTreeMap<String, (Vec<f32>, usize)>,
}

impl Centroids {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, label: &str, embedding: &[f32]) {
        let (sum, count) = self
            .sums
            .entry(label.to_string())
            .or_insert_with(|| (vec![0.0; embedding.len()], 0));

        for (acc, value) in sum.iter_mut().zip(embedding) {
            *acc += value;
        }
        *count += 1;
    }

    /// Finish accumulation, yielding one mean embedding per label.
    pub fn finish(self) -> BTreeMap<String, Vec<f32>> {
        self.sums
            .into_iter()
            .map(|(label, (sum, count))| {
                let mean = sum.iter().map(|value| value / count as f32).collect();
                (label, mean)
            })
            .collect()
    }
}

/// Cosine distance between two embeddings (0 = identical, 1 = orthogonal).
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::turns::Turn;

    fn turn(start: f64, end: f64) -> Turn {
        Turn { start, end }
    }

    #[test]
    fn cosine_distance_of_identical_vectors_is_zero() {
        let v = vec![0.3, 0.4, 0.5];
        assert!(cosine_distance(&v, &v).abs() < 1e-6);
    }

    #[test]
    fn cosine_distance_of_orthogonal_vectors_is_one() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!((cosine_distance(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn zero_vectors_do_not_divide_by_zero() {
        let a = vec![0.0, 0.0];
        let b = vec![1.0, 0.0];
        assert_eq!(cosine_distance(&a, &b), 1.0);
    }

    #[test]
    fn nearest_picks_smallest_distance() {
        let roster = Roster::from_entries(vec![
            ("ana".to_string(), vec![1.0, 0.0]),
            ("ben".to_string(), vec![0.7, 0.7]),
        ]);

        let (id, distance) = roster.nearest(&[0.9, 0.1]).expect("match found");
        assert_eq!(id, "ana");
        assert!(distance < 0.1);
    }

    #[test]
    fn nearest_rejects_matches_at_the_cutoff() {
        let roster = Roster::from_entries(vec![("ana".to_string(), vec![1.0, 0.0])]);
        assert!(roster.nearest(&[0.0, 1.0]).is_none());
        assert!(roster.nearest(&[-1.0, 0.0]).is_none());
    }

    #[test]
    fn centroids_average_embeddings() {
        let mut centroids = Centroids::new();
        centroids.add("SPEAKER_01", &[1.0, 0.0]);
        centroids.add("SPEAKER_01", &[0.0, 1.0]);

        let means = centroids.finish();
        assert_eq!(means["SPEAKER_01"], vec![0.5, 0.5]);
    }

    #[test]
    fn identify_relabels_and_drops_unmatched() {
        let roster = Roster::from_entries(vec![("ana".to_string(), vec![1.0, 0.0])]);

        let mut turns = SpeakerTurns::new();
        turns.push("SPEAKER_01", turn(0.0, 1.0));
        turns.push("SPEAKER_02", turn(2.0, 3.0));

        let mut centroids = BTreeMap::new();
        centroids.insert("SPEAKER_01".to_string(), vec![0.9, 0.1]);
        centroids.insert("SPEAKER_02".to_string(), vec![0.0, 1.0]);

        let identified = roster.identify(&turns, &centroids);
        assert_eq!(identified.len(), 1);
        assert_eq!(identified.get("ana"), Some(&[turn(0.0, 1.0)][..]));
    }

    #[test]
    fn identify_merges_clusters_sharing_an_identity() {
        let roster = Roster::from_entries(vec![("ana".to_string(), vec![1.0, 0.0])]);

        let mut turns = SpeakerTurns::new();
        turns.push("SPEAKER_01", turn(4.0, 5.0));
        turns.push("SPEAKER_02", turn(0.0, 1.0));

        let mut centroids = BTreeMap::new();
        centroids.insert("SPEAKER_01".to_string(), vec![0.9, 0.1]);
        centroids.insert("SPEAKER_02".to_string(), vec![0.8, 0.2]);

        let identified = roster.identify(&turns, &centroids);
        assert_eq!(identified.len(), 1);
        assert_eq!(
            identified.get("ana"),
            Some(&[turn(0.0, 1.0), turn(4.0, 5.0)][..])
        );
    }
}
