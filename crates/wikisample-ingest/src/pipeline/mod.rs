//! The sampling pipeline.
//!
//! ```text
//! [EventSource] → [RelevanceFilter] → [Sampler] → [CsvSink]
//!   SSE / JSONL     edit + wiki + bot    SipHash     header + rows, ≤ limit
//! ```
//!
//! [`run_sampler`] drives one source to completion: it stops as soon as the
//! row limit is reached, when the shutdown flag is cleared, when the source
//! ends, or on the first fatal error. The sink is flushed in every case.

mod sink;

pub use sink::{CsvSink, SinkConfig};

use crate::Result;
use crate::source::{EventSource, SourceStats};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;
use wikisample_core::metrics::{self, EVENTS_RELEVANT_TOTAL, ROWS_WRITTEN_TOTAL};
use wikisample_core::{DEFAULT_SAMPLE_LIMIT, RelevanceFilter, SampledRow, Sampler};

/// Configuration for a sampling run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum number of rows to write.
    pub sample_limit: usize,

    /// Log progress every N rows.
    pub progress_interval: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_limit: DEFAULT_SAMPLE_LIMIT,
            progress_interval: 1000,
        }
    }
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The row limit was reached.
    LimitReached,
    /// The shutdown flag was cleared (Ctrl+C).
    Interrupted,
    /// The source ran out of events.
    SourceExhausted,
}

/// Statistics from a sampling run.
#[derive(Debug, Clone)]
pub struct RunStats {
    /// Statistics reported by the source.
    pub source: SourceStats,

    /// Events that passed the relevance filter.
    pub relevant_events: usize,

    /// Rows written to the sink.
    pub rows_written: usize,

    pub stop_reason: StopReason,
}

/// Run the pipeline until the limit is reached or the source stops.
///
/// Events failing the relevance filter are dropped; relevant events are
/// hashed and, if accepted, converted to a [`SampledRow`] and written. A
/// sampled event missing a required field aborts the run with
/// [`wikisample_core::Error::MissingField`] (or `InvalidField` for a
/// mistyped one) after flushing earlier rows.
pub fn run_sampler<S: EventSource>(
    source: &mut S,
    filter: &RelevanceFilter,
    sampler: &Sampler,
    sink: &mut CsvSink,
    config: &PipelineConfig,
    running: &AtomicBool,
) -> Result<RunStats> {
    let limit = config.sample_limit;
    let progress_interval = config.progress_interval.max(1);
    let mut relevant_events = 0usize;
    let mut stop_reason = StopReason::SourceExhausted;

    let include_bot = sink.config().include_bot;

    info!(
        "Sampling {:.0}% of '{}' edits on {} (bot={}, seed={}) from {} source, limit {}",
        sampler.threshold() * 100.0,
        sampler.key(),
        filter.wiki,
        filter.bot,
        sampler.seed(),
        source.name(),
        limit
    );

    let outcome = if limit == 0 {
        stop_reason = StopReason::LimitReached;
        Ok(SourceStats::default())
    } else {
        source.process(|event| {
            if !running.load(Ordering::SeqCst) {
                stop_reason = StopReason::Interrupted;
                return Ok(false);
            }

            if !filter.matches(&event) {
                return Ok(true);
            }
            relevant_events += 1;
            metrics::increment(EVENTS_RELEVANT_TOTAL, 1);

            if !sampler.should_sample(&event) {
                return Ok(true);
            }

            let row = SampledRow::from_event(&event, include_bot)?;
            sink.write_row(&row)?;
            metrics::increment(ROWS_WRITTEN_TOTAL, 1);
            let rows_written = sink.rows_written();

            if rows_written.is_multiple_of(progress_interval) {
                info!(
                    "Progress: {}/{} rows ({:.1}%), {} relevant events seen",
                    rows_written,
                    limit,
                    rows_written as f64 / limit as f64 * 100.0,
                    relevant_events
                );
            }

            if rows_written >= limit {
                stop_reason = StopReason::LimitReached;
                return Ok(false);
            }
            Ok(true)
        })
    };

    // Flush before surfacing any error so earlier rows survive.
    let flushed = sink.flush();
    let source_stats = outcome?;
    flushed?;

    let rows_written = sink.rows_written();
    info!(
        "Wrote {} rows to {} ({:?})",
        rows_written,
        sink.path().display(),
        stop_reason
    );

    Ok(RunStats {
        source: source_stats,
        relevant_events,
        rows_written,
        stop_reason,
    })
}
