//!
//! Command-line driver for multi-channel time tagger coincidence analysis.

use chrono::Local;
use clap::{Parser, Subcommand};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;

use timetag_core::TagStream;
use timetag_io::TagFileReader;
use timetag_sync::{find_clock_match, merge, MatchConfig, MergeConfig};

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    TimetagIo(#[from] timetag_io::Error),

    #[error("{0}")]
    Core(#[from] timetag_core::Error),

    #[error("{0}")]
    Sync(#[from] timetag_sync::Error),
}

/// Multi-channel time tagger coincidence analysis.
#[derive(Parser)]
#[command(name = "timetag")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge tagger dumps and extract singles and n-fold coincidences
    Coincidences {
        /// Input timestamp dump(s), one per box, in box order
        #[arg(required = true)]
        input: Vec<PathBuf>,

        /// Clock channel number (1-based)
        #[arg(long, default_value = "8")]
        clock: u16,

        /// Exact number of distinct channels per coincidence window
        #[arg(short = 'n', long, default_value = "2")]
        fold: u16,

        /// Coincidence window in TDC bins
        #[arg(short, long, default_value = "25")]
        window: u64,

        /// Per-channel offset calibration file, applied to the final stream
        #[arg(long)]
        offsets: Option<PathBuf>,

        /// Singles output path
        #[arg(long, default_value = "singles.temp")]
        singles: PathBuf,

        /// Coincidences output path
        #[arg(long, default_value = "coincidences.temp")]
        coincidences: PathBuf,

        /// Dump the final stream as ASCII to this path
        #[arg(long)]
        dump: Option<PathBuf>,

        /// Largest clock-tick lead considered while matching
        #[arg(long, default_value = "200")]
        max_shift: usize,

        /// Clock intervals compared per candidate shift
        #[arg(long, default_value = "20")]
        time_depth: usize,

        /// Largest number of clock pairs used for the drift fit
        #[arg(long, default_value = "100")]
        fit_points: usize,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show information about a tagger dump
    Info {
        /// Input timestamp dump
        input: PathBuf,

        /// Clock channel number (1-based)
        #[arg(long, default_value = "8")]
        clock: u16,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        fatal(&err);
    }
}

/// Reports a fatal error the way the acquisition scripts expect: a line in
/// `error.log`, a message on stderr, and a non-zero exit status.
fn fatal(err: &CliError) -> ! {
    eprintln!("Fatal error: {}", err);
    if let Ok(mut log) = OpenOptions::new().create(true).append(true).open("error.log") {
        let _ = writeln!(log, "{}::Fatal error::{}", Local::now().format("%c"), err);
    }
    std::process::exit(1);
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Coincidences {
            input,
            clock,
            fold,
            window,
            offsets,
            singles,
            coincidences,
            dump,
            max_shift,
            time_depth,
            fit_points,
            verbose,
        } => {
            let start = Instant::now();

            let streams = load_streams(&input, clock, verbose)?;

            let match_config = MatchConfig::new()
                .with_max_shift(max_shift)
                .with_time_depth(time_depth);
            let merge_config = MergeConfig::new().with_max_fit_points(fit_points);

            let mut streams = streams.into_iter();
            let mut merged = streams.next().expect("clap enforces at least one input");
            for next in streams {
                let anchor = find_clock_match(&merged, &next, &match_config)?;
                if verbose {
                    eprintln!("Matched clock {} on {:?}", anchor.matching_clock, anchor.side);
                }
                merged = merge(&merged, &next, &anchor, &merge_config)?;
                if verbose {
                    eprintln!("  {} events after merge", merged.len());
                }
            }

            if let Some(path) = &offsets {
                timetag_io::apply_offset_file(&mut merged, path)?;
                if verbose {
                    eprintln!("Applied offsets from {}", path.display());
                }
            }

            let tally = merged.find_n_fold_coincidences(fold, window);
            timetag_io::write_singles(&singles, &tally)?;
            timetag_io::write_coincidences(&coincidences, &tally)?;

            if let Some(path) = &dump {
                timetag_io::write_stream_dump(path, &merged)?;
            }

            timetag_io::write_completion_sentinel("done.task")?;

            println!(
                "Processed {} file(s) in {:.2}s",
                input.len(),
                start.elapsed().as_secs_f64()
            );
            println!("Events: {}", merged.len());
            println!("Coincidence tuples: {}", tally.coincidences.len());
        }

        Commands::Info { input, clock } => {
            let reader = TagFileReader::open(&input)?;
            println!("File: {}", input.display());
            println!("Size: {} bytes", reader.file_size());

            let stream = reader.read_stream(clock, 1)?;
            println!("Events: {}", stream.len());
            println!("Clock events: {}", stream.clock_timestamps().len());

            if !stream.is_empty() {
                println!("Duration: {:.6} s", stream.duration_secs());
                match stream.one_second_index() {
                    Some(index) => println!("One-second index: {}", index),
                    None => println!("One-second index: not reached"),
                }
            }
        }
    }

    Ok(())
}

/// Loads every input in parallel, one worker thread per file, and joins
/// before returning. Box numbers follow argument order, starting at 1.
fn load_streams(paths: &[PathBuf], clock: u16, verbose: bool) -> Result<Vec<TagStream>> {
    std::thread::scope(|scope| {
        let handles: Vec<_> = paths
            .iter()
            .enumerate()
            .map(|(index, path)| {
                scope.spawn(move || -> Result<TagStream> {
                    let reader = TagFileReader::open(path)?;
                    let stream = reader.read_stream(clock, index as u16 + 1)?;
                    if verbose {
                        eprintln!("Loaded {}: {} events", path.display(), stream.len());
                    }
                    Ok(stream)
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join().expect("loader thread panicked"))
            .collect()
    })
}
