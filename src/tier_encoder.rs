//! Encoder for the AVATech tier XML that ELAN ingests.
//!
//! Design:
//! - We stream output directly to a `Write` implementation.
//! - We write the document header lazily on the first tier so that:
//!   - callers can construct the encoder without immediately writing output
//!   - even "no speech found" runs still produce a well-formed document
//!     (header + footer) on close
//!
//! The document shape is fixed by ELAN's recognizer API: a `<TIERS>` root,
//! one `<TIER columns="...">` per speaker, and one
//! `<span start=".." end=".."><v></v></span>` per turn with three-decimal
//! second stamps.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::turns::{SpeakerTurns, Turn};

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>";
const TIERS_OPEN: &str = "<TIERS xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" \
                          xsi:noNamespaceSchemaLocation=\"file:avatech-tiers.xsd\">";

/// Streams speaker tiers as AVATech tier XML.
pub struct TierEncoder<W: Write> {
    /// The underlying writer we stream XML into.
    w: W,

    /// Whether we've written the document header.
    started: bool,

    /// Whether the encoder has been closed.
    closed: bool,
}

impl<W: Write> TierEncoder<W> {
    /// Create a new tier encoder that writes to the provided writer.
    pub fn new(w: W) -> Self {
        Self {
            w,
            started: false,
            closed: false,
        }
    }

    /// Write the document header if we haven't written it yet.
    fn start_if_needed(&mut self) -> Result<()> {
        if !self.started {
            writeln!(self.w, "{XML_DECLARATION}")?;
            writeln!(self.w, "{TIERS_OPEN}")?;
            self.started = true;
        }
        Ok(())
    }

    /// Write one speaker's tier.
    pub fn write_tier(&mut self, label: &str, turns: &[Turn]) -> Result<()> {
        if self.closed {
            anyhow::bail!("cannot write tier: encoder is already closed");
        }

        self.start_if_needed()?;

        writeln!(self.w, "<TIER columns=\"{}\">", escape_attribute(label))?;
        for turn in turns {
            writeln!(
                self.w,
                "    <span start=\"{:.3}\" end=\"{:.3}\"><v></v></span>",
                turn.start, turn.end
            )?;
        }
        writeln!(self.w, "</TIER>")?;

        Ok(())
    }

    /// Finalize the document and flush the underlying writer.
    ///
    /// This method is idempotent. A close without any tiers still emits a
    /// well-formed, empty document.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }

        self.start_if_needed()?;
        writeln!(self.w, "</TIERS>")?;
        self.w.flush()?;

        self.closed = true;
        Ok(())
    }
}

/// Write all tiers to `path` as one document.
///
/// Tiers come out in label order (the order `SpeakerTurns` maintains), so
/// repeated runs over the same input produce identical files.
pub fn write_tier_file(path: &Path, turns: &SpeakerTurns) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create output file '{}'", path.display()))?;

    let mut encoder = TierEncoder::new(BufWriter::new(file));
    for (label, turns) in turns.iter() {
        encoder.write_tier(label, turns)?;
    }
    encoder.close()
}

/// Escape a string for use inside a double-quoted XML attribute.
fn escape_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(start: f64, end: f64) -> Turn {
        Turn { start, end }
    }

    #[test]
    fn close_without_tiers_emits_empty_document() -> anyhow::Result<()> {
        let mut out = Vec::new();
        let mut encoder = TierEncoder::new(&mut out);
        encoder.close()?;

        let doc = String::from_utf8(out)?;
        assert!(doc.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<TIERS "));
        assert!(doc.ends_with("</TIERS>\n"));
        assert!(!doc.contains("<TIER "));
        Ok(())
    }

    #[test]
    fn writes_tiers_with_three_decimal_spans() -> anyhow::Result<()> {
        let mut out = Vec::new();
        let mut encoder = TierEncoder::new(&mut out);

        encoder.write_tier("SPEAKER_00", &[turn(17.492, 18.492), turn(20.0, 21.5)])?;
        encoder.write_tier("SPEAKER_01", &[turn(0.5, 1.0)])?;
        encoder.close()?;

        let doc = String::from_utf8(out)?;
        assert!(doc.contains("<TIER columns=\"SPEAKER_00\">\n"));
        assert!(doc.contains("    <span start=\"17.492\" end=\"18.492\"><v></v></span>\n"));
        assert!(doc.contains("    <span start=\"20.000\" end=\"21.500\"><v></v></span>\n"));
        assert!(doc.contains("<TIER columns=\"SPEAKER_01\">\n"));
        assert_eq!(doc.matches("</TIER>\n").count(), 2);
        assert_eq!(doc.matches("<?xml").count(), 1);
        Ok(())
    }

    #[test]
    fn escapes_attribute_values() -> anyhow::Result<()> {
        let mut out = Vec::new();
        let mut encoder = TierEncoder::new(&mut out);
        encoder.write_tier("O'Brien & \"co\" <1>", &[turn(0.0, 1.0)])?;
        encoder.close()?;

        let doc = String::from_utf8(out)?;
        assert!(doc.contains(
            "<TIER columns=\"O&apos;Brien &amp; &quot;co&quot; &lt;1&gt;\">"
        ));
        Ok(())
    }

    #[test]
    fn close_is_idempotent() -> anyhow::Result<()> {
        let mut out = Vec::new();
        let mut encoder = TierEncoder::new(&mut out);
        encoder.close()?;
        encoder.close()?;

        let doc = String::from_utf8(out)?;
        assert_eq!(doc.matches("</TIERS>").count(), 1);
        Ok(())
    }

    #[test]
    fn write_after_close_errors() -> anyhow::Result<()> {
        let mut out = Vec::new();
        let mut encoder = TierEncoder::new(&mut out);
        encoder.close()?;
        let err = encoder.write_tier("late", &[turn(0.0, 1.0)]).unwrap_err();
        assert!(err.to_string().contains("already closed"));
        Ok(())
    }

    #[test]
    fn tier_file_round_trip() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("segments.xml");

        let mut turns = SpeakerTurns::new();
        turns.push("SPEAKER_00", turn(0.0, 1.25));
        write_tier_file(&path, &turns)?;

        let doc = std::fs::read_to_string(&path)?;
        assert!(doc.contains("<TIER columns=\"SPEAKER_00\">"));
        assert!(doc.contains("<span start=\"0.000\" end=\"1.250\"><v></v></span>"));
        Ok(())
    }
}
