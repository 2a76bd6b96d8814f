//! The ELAN progress protocol.
//!
//! While a recognizer runs, ELAN expects `PROGRESS: <fraction> <detail>`
//! lines on stdout and a final `RESULT: DONE.` once the output file exists.
//! The pipeline reports per-stage completion (e.g. "embedding, 3 of 12");
//! this module remaps those per-stage fractions into one overall fraction
//! across the fixed number of stages each mode runs, so the progress bar
//! advances smoothly from start to finish instead of filling once per stage.

use std::io::Write;

use anyhow::Result;

use crate::opts::Mode;

/// Number of reporting stages each mode drives.
///
/// Diarization runs segmentation, embedding, clustering, and labeling; voice
/// activity detection stops after segmentation.
pub fn stage_count(mode: Mode) -> usize {
    match mode {
        Mode::Vad => 1,
        Mode::Diarization => 4,
    }
}

/// Writes ELAN progress lines, remapping per-stage completion into an overall
/// fraction.
///
/// The reporter infers stage boundaries from the step name: a call with a new
/// name advances to the next stage, repeated names stay within the current
/// one. Within stage `s` of `n`, fractional completion `f` is reported as
/// `f/n + (s-1)/n`.
pub struct ElanProgress<W: Write> {
    w: W,
    num_stages: usize,
    stage: usize,
    step_name: Option<String>,
}

impl<W: Write> ElanProgress<W> {
    pub fn new(w: W, mode: Mode) -> Self {
        Self {
            w,
            num_stages: stage_count(mode),
            stage: 0,
            step_name: None,
        }
    }

    /// Report completion within the current step.
    ///
    /// A `total` of zero is treated as a completed single-item step, which is
    /// how steps without a meaningful item count report themselves.
    pub fn step(&mut self, step_name: &str, completed: u64, total: u64) -> Result<()> {
        let (completed, total) = if total == 0 { (1, 1) } else { (completed, total) };

        if self.step_name.as_deref() != Some(step_name) {
            self.step_name = Some(step_name.to_string());
            self.stage += 1;
        }

        // A driver that emits more distinct steps than the mode declares must
        // not report past 100%.
        let stage = self.stage.min(self.num_stages);

        let fraction = (completed as f64 / total as f64).min(1.0);
        let overall =
            fraction / self.num_stages as f64 + (stage - 1) as f64 / self.num_stages as f64;

        // ELAN checks for the output file as soon as it sees 100% and warns
        // the user when it isn't there yet. Holding the reported figure just
        // under complete keeps that prompt from firing before `done()`.
        let overall = (overall - 0.01).max(0.0);

        writeln!(
            self.w,
            "PROGRESS: {overall:.2} {}, {completed} of {total}",
            capitalize(step_name)
        )?;
        self.w.flush()?;
        Ok(())
    }

    /// Tell ELAN the run finished and the output file is in place.
    pub fn done(&mut self) -> Result<()> {
        writeln!(self.w, "RESULT: DONE.")?;
        self.w.flush()?;
        Ok(())
    }
}

/// Uppercase the first character and lowercase the rest, for the step label
/// ELAN displays.
fn capitalize(step: &str) -> String {
    let mut chars = step.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
