//! Sample Wikimedia recent-change edits into a CSV file.
//!
//! Connects to the EventStreams `recentchange` feed, keeps edit events on
//! one wiki, samples them with a seeded hash of a chosen field and writes
//! the sampled rows to CSV until the sample limit is reached.
//!
//! # Usage
//!
//! ```bash
//! # 20% of enwiki edits from the last two weeks, up to 40,000 rows
//! wikisample
//!
//! # Bot edits on dewiki, sampled by the composite key, live only
//! wikisample --wiki dewiki --bot only --sample-by composite --since-days 0 \
//!     --threshold 0.05 --sample-limit 1000 --output-file dewiki_bots.csv
//!
//! # Replay a recorded stream instead of connecting
//! curl -sN https://stream.wikimedia.org/v2/stream/recentchange > capture.sse
//! wikisample --replay capture.sse
//! ```
//!
//! # Shutdown
//!
//! Ctrl+C stops the run at the next event; rows written so far are flushed.
//! A second Ctrl+C exits immediately, e.g. when the stream has stalled.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use wikisample_core::metrics::{RUNNING, init_metrics, set_gauge, start_metrics_server};
use wikisample_core::{
    BotFilter, DEFAULT_SEED, DEFAULT_THRESHOLD, DEFAULT_WIKI, RelevanceFilter, SampleKey, Sampler,
};
use wikisample_ingest::source::DEFAULT_USER_AGENT;
use wikisample_ingest::stream::DEFAULT_SINCE_DAYS;
use wikisample_ingest::{
    CsvSink, EventSource, JsonlConfig, JsonlSource, PipelineConfig, RunStats, SinkConfig,
    SseConfig, SseSource, StopReason, StreamConfig, run_sampler,
};

/// Sample Wikimedia recent-change edits into a CSV file.
#[derive(Parser, Debug)]
#[command(name = "wikisample")]
#[command(about = "Sample Wikimedia recent-change edits into a CSV file")]
#[command(version)]
struct Args {
    /// Stream URL (default: the recentchange feed with a `since` backfill)
    #[arg(long, env = "WIKISAMPLE_URL")]
    url: Option<String>,

    /// Days of history to request when --url is not given (0 for live only)
    #[arg(
        long,
        env = "WIKISAMPLE_SINCE_DAYS",
        default_value_t = DEFAULT_SINCE_DAYS,
        value_parser = clap::value_parser!(u32).range(0..=3650)
    )]
    since_days: u32,

    /// Wiki to keep edits from
    #[arg(long, env = "WIKISAMPLE_WIKI", default_value = DEFAULT_WIKI)]
    wiki: String,

    /// Path to the output CSV file
    #[arg(
        long,
        alias = "output_file",
        env = "WIKISAMPLE_OUTPUT_FILE",
        default_value = "sampled_events.csv"
    )]
    output_file: PathBuf,

    /// Field (or dotted path) to sample by, or `composite` for namespace|timestamp|revision.
    /// The name `composite` always selects the composite key, even if events carry such a field.
    #[arg(
        long,
        alias = "sample_by",
        env = "WIKISAMPLE_SAMPLE_BY",
        default_value = "id"
    )]
    sample_by: SampleKey,

    /// Sampling probability threshold in [0, 1]
    #[arg(
        long,
        env = "WIKISAMPLE_THRESHOLD",
        default_value_t = DEFAULT_THRESHOLD,
        value_parser = parse_threshold
    )]
    threshold: f64,

    /// Maximum number of rows to write
    #[arg(
        long,
        alias = "sample_limit",
        env = "WIKISAMPLE_SAMPLE_LIMIT",
        default_value_t = 40_000,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    sample_limit: u64,

    /// Hash seed; the same seed always makes the same sampling decisions
    #[arg(long, env = "WIKISAMPLE_SEED", default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// Bot edits to keep: any, only or exclude
    #[arg(long, env = "WIKISAMPLE_BOT", default_value = "any")]
    bot: BotFilter,

    /// Omit the leading `bot` column from the CSV
    #[arg(long)]
    no_bot_column: bool,

    /// Read a recorded SSE capture (or a .jsonl dump) instead of connecting
    #[arg(long, conflicts_with = "url")]
    replay: Option<PathBuf>,

    /// User-Agent header sent to the stream
    #[arg(long, env = "WIKISAMPLE_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    user_agent: String,

    /// Connect timeout in seconds
    #[arg(long, default_value_t = 30)]
    connect_timeout_secs: u64,

    /// Log progress every N rows
    #[arg(long, default_value_t = 1000)]
    progress_interval: usize,

    /// Metrics HTTP server port (0 to disable)
    #[arg(long, env = "WIKISAMPLE_METRICS_PORT", default_value_t = 0)]
    metrics_port: u16,
}

fn parse_threshold(s: &str) -> std::result::Result<f64, String> {
    let threshold: f64 = s
        .trim()
        .parse()
        .map_err(|e| format!("not a number: {e}"))?;
    if !(0.0..=1.0).contains(&threshold) {
        return Err(format!("{threshold} is outside [0, 1]"));
    }
    Ok(threshold)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("info".parse()?)
                .add_directive("wikisample_ingest=debug".parse()?),
        )
        .init();

    let args = Args::parse();

    if args.metrics_port > 0 {
        let handle = init_metrics();
        start_metrics_server(args.metrics_port, handle)
            .context("Failed to start metrics server")?;
        set_gauge(RUNNING, 1.0);
    }

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    ctrlc::set_handler(move || {
        if !running_clone.swap(false, Ordering::SeqCst) {
            warn!("Second shutdown signal received, exiting immediately");
            std::process::exit(130);
        }
        info!("Shutdown signal received, stopping gracefully (Ctrl+C again to force)...");
    })
    .context("Failed to set Ctrl+C handler")?;

    let mut sink = CsvSink::create(
        &args.output_file,
        SinkConfig {
            include_bot: !args.no_bot_column,
        },
    )
    .with_context(|| format!("Failed to create {}", args.output_file.display()))?;

    let start = Instant::now();
    let outcome = match &args.replay {
        Some(path) if is_jsonl(path) => {
            let mut source = JsonlSource::new(JsonlConfig {
                input: path.clone(),
            });
            sample(&mut source, &args, &mut sink, &running)
        }
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open replay file {}", path.display()))?;
            let mut source =
                SseSource::from_reader(file).with_running_flag(Arc::clone(&running));
            sample(&mut source, &args, &mut sink, &running)
        }
        None => {
            let config = SseConfig {
                url: resolve_url(&args, Utc::now())?,
                user_agent: args.user_agent.clone(),
                connect_timeout: Some(Duration::from_secs(args.connect_timeout_secs)),
            };
            let mut source = SseSource::connect(&config)
                .with_context(|| format!("Failed to connect to {}", config.url))?
                .with_running_flag(Arc::clone(&running));
            info!("Streaming events from {}", source.origin());
            sample(&mut source, &args, &mut sink, &running)
        }
    };

    let stats = outcome.context("Sampling run failed")?;
    let rows = sink.finish()?;
    set_gauge(RUNNING, 0.0);

    print_summary(&args, &stats, start.elapsed());
    println!(
        "Sampling complete. {} edits written to {}",
        rows,
        args.output_file.display()
    );

    Ok(())
}

/// Build the filter and sampler from args and drive one source.
fn sample<S: EventSource>(
    source: &mut S,
    args: &Args,
    sink: &mut CsvSink,
    running: &AtomicBool,
) -> Result<RunStats> {
    let filter = RelevanceFilter::new(args.wiki.clone(), args.bot);
    let sampler = Sampler::new(args.sample_by.clone(), args.threshold, args.seed)?;
    let config = PipelineConfig {
        sample_limit: usize::try_from(args.sample_limit).context("Sample limit too large")?,
        progress_interval: args.progress_interval,
    };

    Ok(run_sampler(source, &filter, &sampler, sink, &config, running)?)
}

/// The stream URL: explicit `--url`, or recentchange with a `since` backfill.
fn resolve_url(args: &Args, now: DateTime<Utc>) -> Result<String> {
    if let Some(url) = &args.url {
        return Ok(url.clone());
    }
    let url = StreamConfig::since_days_ago(now, args.since_days).stream_url()?;
    Ok(url.to_string())
}

fn is_jsonl(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext == "jsonl" || ext == "ndjson" || ext == "json")
}

fn print_summary(args: &Args, stats: &RunStats, elapsed: Duration) {
    println!("\n══════════════════════════════════════════════════════════════════");
    println!("SUMMARY");
    println!("══════════════════════════════════════════════════════════════════\n");

    println!("Wiki:              {:>12}", args.wiki);
    println!("Sample by:         {:>12}", args.sample_by);
    println!("Threshold:         {:>12.2}", args.threshold);
    println!("Seed:              {:>12}", args.seed);
    println!();
    println!("Stream events:     {:>12}", stats.source.total_events);
    println!("Ignored events:    {:>12}", stats.source.ignored_events);
    println!("Malformed events:  {:>12}", stats.source.parse_errors);
    println!("Relevant edits:    {:>12}", stats.relevant_events);
    println!("Rows written:      {:>12}", stats.rows_written);
    if stats.relevant_events > 0 {
        let rate = stats.rows_written as f64 / stats.relevant_events as f64 * 100.0;
        println!("Observed rate:     {:>11.1}%", rate);
    }
    if let Some(bytes) = stats.source.source_metadata.bytes_read {
        println!("Bytes read:        {:>12}", bytes);
    }
    if let Some(ref id) = stats.source.source_metadata.last_event_id {
        println!("Last event id:     {}", id);
    }
    println!();

    let reason = match stats.stop_reason {
        StopReason::LimitReached => "sample limit reached",
        StopReason::Interrupted => "interrupted",
        StopReason::SourceExhausted => "stream ended",
    };
    println!("Stopped:           {:>12}", reason);
    println!("Elapsed time:      {:>12.2?}", elapsed);
    println!();
}
