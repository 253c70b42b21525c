use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use lrc_fetcher::error::ConfigError;
use lrc_fetcher::logging;
use lrc_fetcher::lrclib::{LrclibClient, DEFAULT_API_URL, DEFAULT_TIMEOUT};
use lrc_fetcher::models::{Mode, RunSummary};
use lrc_fetcher::orchestrator::{Orchestrator, StopFlag, DEFAULT_WORKERS};
use lrc_fetcher::planner::{JobPlanner, PlanStats, DEFAULT_EXTENSIONS};
use lrc_fetcher::progress::{create_spinner, format_duration, set_log_only};
use lrc_fetcher::romanize::DefaultRomanizer;
use lrc_fetcher::safety::validate_library_root;
use lrc_fetcher::tags::LoftyTags;

#[derive(Parser)]
#[command(name = "lrc-fetcher")]
#[command(about = "Fetch, romanize and embed synced lyrics for a music library")]
struct Args {
    /// Root directory of the music library
    music_dir: PathBuf,

    /// Upgrade only: replace unsynced .lrc files with synced lyrics. Ignores files without lyrics.
    #[arg(long, conflicts_with = "process_existing")]
    scan_unsynced: bool,

    /// Local only: romanize and/or embed existing .lrc files
    #[arg(long)]
    process_existing: bool,

    /// Romanize Japanese and Korean lyrics
    #[arg(long)]
    romanize: bool,

    /// Embed the lyrics into the audio file's tags
    #[arg(long)]
    embed: bool,

    #[arg(long, default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    /// Audio file extensions to consider, comma-separated [default: flac,mp3,m4a,ogg,opus]
    #[arg(long, value_delimiter = ',')]
    extensions: Option<Vec<String>>,

    #[arg(long, env = "LRCLIB_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    /// HTTP timeout per request, in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT.as_secs())]
    timeout: u64,

    /// Append log lines to this file as well as stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Log-only mode: no progress spinner, periodic log lines instead
    #[arg(long)]
    log_only: bool,

    /// Write the run summary as JSON to this path
    #[arg(long)]
    summary_json: Option<PathBuf>,
}

fn print_summary(mode: Mode, args: &Args, stats: PlanStats, summary: &RunSummary, elapsed: Duration) {
    println!("\n{:=<60}", "");
    if summary.interrupted {
        println!("Interrupted! Partial summary:");
    } else {
        println!("Summary");
    }
    println!("  Audio files: {}", stats.audio_files);
    match mode {
        Mode::FetchMissing => {
            println!("  Skipped (existing LRC): {}", summary.skipped);
            println!("  Downloaded new: {}", summary.downloaded);
        }
        Mode::ScanUnsynced => {
            println!("  Skipped (already synced): {}", summary.skipped);
            println!("  Upgraded to synced: {}", summary.upgraded);
        }
        Mode::ProcessExisting => {
            println!("  Processed: {}", summary.processed);
            println!("  Unchanged: {}", summary.skipped);
        }
    }
    if args.romanize || mode == Mode::ProcessExisting {
        println!("  Romanized: {}", summary.romanized);
    }
    if args.embed {
        println!("  Embedded: {}", summary.embedded);
    }
    match mode {
        Mode::ScanUnsynced => println!("  Could not find upgrade: {}", summary.failed),
        Mode::FetchMissing => println!("  Not found / failed: {}", summary.failed),
        Mode::ProcessExisting => println!("  Failed: {}", summary.failed),
    }
    println!("  Elapsed: {}", format_duration(elapsed));
    println!("{:=<60}", "");

    if !summary.failures.is_empty() {
        println!("\nFailed files:");
        for failure in &summary.failures {
            println!("  {}", failure);
        }
    }
    if !summary.embed_failures.is_empty() {
        println!("\nLyrics written but not embedded:");
        for failure in &summary.embed_failures {
            println!("  {}", failure);
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    set_log_only(args.log_only);
    logging::init(args.log_file.as_deref())?;

    let mode = Mode::from_flags(args.scan_unsynced, args.process_existing)?;
    if args.workers == 0 {
        return Err(ConfigError::NoWorkers.into());
    }
    let extensions: Vec<String> = match &args.extensions {
        Some(list) => list
            .iter()
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .collect(),
        None => DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
    };
    if extensions.is_empty() {
        return Err(ConfigError::NoExtensions.into());
    }
    let root = validate_library_root(&args.music_dir)?;

    let stop = StopFlag::new();
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || {
            warn!("Interrupt received, finishing in-flight files...");
            stop.set();
        })
        .context("Failed to install Ctrl-C handler")?;
    }

    let client = LrclibClient::new(&args.api_url, Duration::from_secs(args.timeout.max(1)))
        .context("Failed to create HTTP client")?;
    let tags = LoftyTags;
    let romanizer = DefaultRomanizer::shared();

    let start = Instant::now();
    info!("--- {} in {} ({} workers) ---", mode.label(), root.display(), args.workers);

    let spinner = create_spinner(mode.label());
    let orchestrator = Orchestrator::new(&client, &tags, &romanizer)
        .with_stop(stop)
        .with_progress(spinner.clone());

    let mut planner = JobPlanner::new(&root, mode, args.romanize, args.embed, extensions.as_slice());
    let summary = orchestrator.run_planned(&mut planner, args.workers);
    spinner.finish_and_clear();

    print_summary(mode, &args, planner.stats(), &summary, start.elapsed());

    if let Some(path) = &args.summary_json {
        // Not fatal: the run has already finished.
        if let Err(e) = summary.write_json(path) {
            warn!("Failed to write summary to {}: {}", path.display(), e);
        }
    }

    Ok(())
}
