use std::io::Cursor;

use tierscribe::Error;
use tierscribe::opts::{Mode, ModeOpts, Opts};
use tierscribe::params::ParamMap;
use tierscribe::progress::ElanProgress;
use tierscribe::tier_encoder::write_tier_file;
use tierscribe::turns::{SpeakerTurns, Turn};

fn diarization_protocol(output: &str) -> String {
    format!(
        "<param name=\"source\">recordings/O&apos;Brien session.wav</param>\n\
         <param name=\"output_segments\">{output}</param>\n\
         <param name=\"checkpoint\">models/segmentation-3.0.onnx</param>\n\
         <param name=\"embedding_model\">models/wespeaker_en_voxceleb_CAM++.onnx</param>\n\
         <param name=\"min_duration_off\">0.25</param>\n\
         <param name=\"num_speakers\">Unknown</param>\n\
         <param name=\"min_speakers\">_</param>\n\
         <param name=\"max_speakers\">2</param>\n\
         <param name=\"speaker_verification_csv\"></param>\n"
    )
}

#[test]
fn builds_diarization_opts_from_protocol_stream() -> anyhow::Result<()> {
    let params = ParamMap::from_reader(Cursor::new(diarization_protocol("out/segments.xml")))?;
    let opts = Opts::from_params(Mode::Diarization, &params)?;

    assert_eq!(opts.mode(), Mode::Diarization);
    assert_eq!(
        opts.source.to_str(),
        Some("recordings/O'Brien session.wav")
    );
    assert_eq!(opts.output_segments.to_str(), Some("out/segments.xml"));

    let ModeOpts::Diarization(diarization) = &opts.mode else {
        panic!("expected diarization options");
    };
    assert_eq!(diarization.num_speakers, None);
    assert_eq!(diarization.max_speakers, Some(2));
    assert!(diarization.speaker_verification_csv.is_none());
    Ok(())
}

#[test]
fn missing_output_parameter_is_a_typed_error() -> anyhow::Result<()> {
    let params = ParamMap::from_reader(Cursor::new(
        "<param name=\"source\">session.wav</param>\n",
    ))?;

    let err = Opts::from_params(Mode::Diarization, &params).unwrap_err();
    assert!(matches!(err, Error::MissingParam(name) if name == "output_segments"));
    Ok(())
}

#[test]
fn progress_transcript_covers_a_full_diarization_run() -> anyhow::Result<()> {
    let mut out = Vec::new();
    let mut progress = ElanProgress::new(&mut out, Mode::Diarization);

    progress.step("segmentation", 0, 1)?;
    progress.step("segmentation", 1, 1)?;
    for i in 1..=3u64 {
        progress.step("embedding", i, 3)?;
    }
    for i in 1..=3u64 {
        progress.step("clustering", i, 3)?;
    }
    progress.step("labeling", 1, 1)?;
    progress.done()?;

    let transcript = String::from_utf8(out)?;
    let lines: Vec<&str> = transcript.lines().collect();

    assert_eq!(lines.first(), Some(&"PROGRESS: 0.00 Segmentation, 0 of 1"));
    assert_eq!(lines.last(), Some(&"RESULT: DONE."));

    // Every intermediate line is a PROGRESS line and never reaches 100%.
    for line in &lines[..lines.len() - 1] {
        let fraction: f64 = line
            .strip_prefix("PROGRESS: ")
            .and_then(|rest| rest.split(' ').next())
            .expect("progress line")
            .parse()?;
        assert!((0.0..1.0).contains(&fraction));
    }
    Ok(())
}

#[test]
fn tier_file_matches_the_recognizer_output_shape() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("segments.xml");

    let mut turns = SpeakerTurns::new();
    turns.extend(
        "Tierscribe_SPEAKER_00",
        [
            Turn { start: 0.25, end: 1.5 },
            Turn { start: 3.0, end: 4.125 },
        ],
    );
    turns.extend("Tierscribe_SPEAKER_01", [Turn { start: 1.75, end: 2.5 }]);
    write_tier_file(&path, &turns)?;

    let doc = std::fs::read_to_string(&path)?;
    let expected = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <TIERS xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" \
         xsi:noNamespaceSchemaLocation=\"file:avatech-tiers.xsd\">\n\
         <TIER columns=\"Tierscribe_SPEAKER_00\">\n    \
         <span start=\"0.250\" end=\"1.500\"><v></v></span>\n    \
         <span start=\"3.000\" end=\"4.125\"><v></v></span>\n\
         </TIER>\n\
         <TIER columns=\"Tierscribe_SPEAKER_01\">\n    \
         <span start=\"1.750\" end=\"2.500\"><v></v></span>\n\
         </TIER>\n\
         </TIERS>\n";
    assert_eq!(doc, expected);
    Ok(())
}

#[test]
fn empty_run_still_writes_a_well_formed_document() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("segments.xml");

    write_tier_file(&path, &SpeakerTurns::new())?;

    let doc = std::fs::read_to_string(&path)?;
    assert!(doc.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    assert!(doc.trim_end().ends_with("</TIERS>"));
    assert!(!doc.contains("<TIER "));
    Ok(())
}

// Requires the segmentation and embedding models plus a speech sample; run
// with `cargo test -- --ignored` after placing them under ./models and
// ./tests/fixtures.
#[test]
#[ignore]
fn diarizes_a_recording_end_to_end() -> anyhow::Result<()> {
    use tierscribe::recognizer::Recognizer;

    let dir = tempfile::tempdir()?;
    let output = dir.path().join("segments.xml");

    let protocol = format!(
        "<param name=\"source\">tests/fixtures/two_speakers.wav</param>\n\
         <param name=\"output_segments\">{}</param>\n\
         <param name=\"checkpoint\">models/segmentation-3.0.onnx</param>\n\
         <param name=\"embedding_model\">models/wespeaker_en_voxceleb_CAM++.onnx</param>\n\
         <param name=\"min_duration_off\">0.0</param>\n\
         <param name=\"num_speakers\">2</param>\n\
         <param name=\"min_speakers\">_</param>\n\
         <param name=\"max_speakers\">_</param>\n",
        output.display()
    );

    let params = ParamMap::from_reader(Cursor::new(protocol))?;
    let opts = Opts::from_params(Mode::Diarization, &params)?;

    let recognizer = Recognizer::new(&opts)?;
    let mut progress_out = Vec::new();
    let mut progress = ElanProgress::new(&mut progress_out, Mode::Diarization);
    let turns = recognizer.run(&opts, &mut progress)?;

    assert!(!turns.is_empty());
    write_tier_file(&output, &turns)?;

    let doc = std::fs::read_to_string(&output)?;
    assert!(doc.contains("<TIER columns=\"Tierscribe_SPEAKER_"));
    Ok(())
}
