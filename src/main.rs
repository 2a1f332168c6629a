extern crate pvsynth;

use anyhow::anyhow;
use clap::Parser;
use pvsynth::output::FileOutput;
use pvsynth::{load_project, run_project, CancellationToken, ProcessingMode};
use std::ffi::OsStr;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Default, Debug)]
#[clap(author, version, about, long_about = None)]
struct PvSynthArgs {
    /// CSV of climate series, one row per grid cell and timestamp
    input_file: String,
    /// JSON run configuration
    #[arg(long, short)]
    config: String,
    /// CSV of monthly PDFs of daily irradiation
    #[arg(long, short)]
    pdfs: Option<String>,
    /// Directory for the result files; defaults to that of the input file
    #[arg(long, short)]
    output_dir: Option<String>,
    /// Worker threads, overriding the configuration
    #[arg(long, short)]
    threads: Option<usize>,
    /// Also write the synthesised hourly series
    #[arg(long, default_value_t = false)]
    hourly: bool,
    #[arg(long, short, default_value_t = false)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = PvSynthArgs::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let input_path = Path::new(&args.input_file);
    let input_file_stem = input_path
        .file_stem()
        .and_then(OsStr::to_str)
        .ok_or_else(|| anyhow!("Could not take a file name from {}", args.input_file))?;
    let output_dir = match &args.output_dir {
        Some(dir) => PathBuf::from(dir),
        None => input_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default(),
    };

    let mut inputs = load_project(
        BufReader::new(File::open(input_path)?),
        BufReader::new(File::open(&args.config)?),
        args.pdfs
            .as_ref()
            .map(|pdfs| File::open(pdfs).map(BufReader::new))
            .transpose()?,
    )?;
    if let Some(threads) = args.threads {
        if threads == 0 {
            return Err(anyhow!("--threads must be at least 1"));
        }
        inputs.settings.processing_mode = ProcessingMode::from_num_threads(Some(threads));
    }

    #[cfg(feature = "indicatif")]
    let progress = indicatif::ProgressBar::new(inputs.cells.len() as u64);
    #[cfg(feature = "indicatif")]
    let advance = || progress.inc(1);
    #[cfg(feature = "indicatif")]
    let on_cell_done: Option<&(dyn Fn() + Sync)> = Some(&advance);
    #[cfg(not(feature = "indicatif"))]
    let on_cell_done: Option<&(dyn Fn() + Sync)> = None;

    let output = FileOutput::new(output_dir, format!("{input_file_stem}_{{}}.csv"));
    let summary = run_project(
        &inputs,
        &output,
        args.hourly,
        &CancellationToken::new(),
        on_cell_done,
    )?;

    #[cfg(feature = "indicatif")]
    progress.finish();

    info!(
        "{} cells written to {}, {} failed",
        summary.succeeded,
        output.path_for_key("pv")?.display(),
        summary.failed
    );
    Ok(())
}
