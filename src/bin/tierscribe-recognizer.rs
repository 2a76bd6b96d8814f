use anyhow::Result;
use clap::Parser;

use std::io;

use tierscribe::Error;
use tierscribe::logging;
use tierscribe::opts::{Mode, Opts};
use tierscribe::params::ParamMap;
use tierscribe::progress::ElanProgress;
use tierscribe::recognizer::Recognizer;
use tierscribe::tier_encoder::write_tier_file;

/// The process ELAN launches as a local recognizer.
///
/// ELAN writes the user's parameters to stdin and reads `PROGRESS:` /
/// `ERROR:` / `RESULT:` lines from stdout; everything else (the tier XML)
/// goes to the file named by the `output_segments` parameter.
#[derive(Parser, Debug)]
#[command(name = "tierscribe-recognizer")]
#[command(about = "Voice activity detection and speaker diarization as an ELAN local recognizer")]
struct Args {
    /// Which service to run; the recognizer description in ELAN selects this.
    #[arg(value_enum, ignore_case = true, default_value_t = Mode::Diarization)]
    mode: Mode,
}

fn main() -> Result<()> {
    logging::init();
    let args = Args::parse();

    let stdin = io::stdin();
    let params = ParamMap::from_reader(stdin.lock())?;

    let opts = match Opts::from_params(args.mode, &params) {
        Ok(opts) => opts,
        Err(err) => {
            report_param_error(&err);
            std::process::exit(1);
        }
    };

    let recognizer = Recognizer::new(&opts)?;

    let stdout = io::stdout();
    let mut progress = ElanProgress::new(stdout.lock(), args.mode);
    let turns = recognizer.run(&opts, &mut progress)?;

    write_tier_file(&opts.output_segments, &turns)?;

    // Only now may ELAN learn that we're done: it goes looking for the output
    // file as soon as it sees this line.
    progress.done()?;
    Ok(())
}

/// Report a configuration problem on stdout, where ELAN surfaces it.
///
/// The output parameter keeps its historical wording; other parameters get
/// the error's own message.
fn report_param_error(err: &Error) {
    match err {
        Error::MissingParam(name) if name == "output_segments" => {
            println!("ERROR: missing output parameter!");
        }
        other => println!("ERROR: {other}"),
    }
}
