//! Speaker turn data structures and post-filtering.
//!
//! The pipelines produce raw time intervals; ELAN users tune two knobs on top
//! of them:
//! - `min_duration_off`: silences shorter than this are treated as part of
//!   the surrounding turn (bridged)
//! - `min_duration_on`: turns shorter than this are dropped as noise
//!
//! `TurnFilter` applies both, bridging before dropping so short fragments can
//! accrete into turns that survive the duration filter.

use std::collections::BTreeMap;

/// One detected speech interval, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Turn {
    pub start: f64,
    pub end: f64,
}

impl Turn {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Detected turns grouped by speaker label.
///
/// Labels are kept ordered so tier output is deterministic.
#[derive(Debug, Default, Clone)]
pub struct SpeakerTurns {
    tiers: BTreeMap<String, Vec<Turn>>,
}

impl SpeakerTurns {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    /// Number of speakers.
    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn push(&mut self, label: &str, turn: Turn) {
        self.tiers.entry(label.to_string()).or_default().push(turn);
    }

    pub fn extend(&mut self, label: &str, turns: impl IntoIterator<Item = Turn>) {
        self.tiers.entry(label.to_string()).or_default().extend(turns);
    }

    pub fn get(&self, label: &str) -> Option<&[Turn]> {
        self.tiers.get(label).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Turn])> {
        self.tiers.iter().map(|(label, turns)| (label.as_str(), turns.as_slice()))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Vec<Turn>)> {
        self.tiers.iter_mut().map(|(label, turns)| (label.as_str(), turns))
    }

    /// Drop speakers whose turn lists ended up empty after filtering.
    pub fn retain_non_empty(&mut self) {
        self.tiers.retain(|_, turns| !turns.is_empty());
    }

    /// Sort every speaker's turns by start time.
    ///
    /// Needed after merging turn lists from multiple sources.
    pub fn sort_turns(&mut self) {
        for turns in self.tiers.values_mut() {
            turns.sort_by(|a, b| a.start.total_cmp(&b.start));
        }
    }

    /// Return the same turns under prefixed labels.
    ///
    /// Machine-generated labels are prefixed with the tool name so users can
    /// tell recognizer output apart from their own tiers.
    pub fn with_prefix(self, prefix: &str) -> Self {
        let tiers = self
            .tiers
            .into_iter()
            .map(|(label, turns)| (format!("{prefix}{label}"), turns))
            .collect();
        Self { tiers }
    }
}

/// Policy knobs for turn post-filtering, in seconds.
#[derive(Debug, Clone, Copy)]
pub struct TurnFilter {
    /// Drop turns shorter than this duration.
    pub min_duration_on: f64,

    /// Bridge gaps shorter than this duration.
    pub min_duration_off: f64,
}

impl TurnFilter {
    /// Apply the policy in-place.
    ///
    /// The result is sorted, non-overlapping, and free of sub-threshold turns
    /// and gaps.
    pub fn apply(&self, turns: &mut Vec<Turn>) {
        turns.sort_by(|a, b| a.start.total_cmp(&b.start));

        let mut merged: Vec<Turn> = Vec::with_capacity(turns.len());
        for turn in turns.drain(..) {
            if let Some(prev) = merged.last_mut() {
                if turn.start - prev.end < self.min_duration_off {
                    prev.end = prev.end.max(turn.end);
                    continue;
                }
            }
            merged.push(turn);
        }

        merged.retain(|turn| turn.duration() >= self.min_duration_on);
        *turns = merged;
    }
}
