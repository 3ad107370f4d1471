//! Event source adapters.
//!
//! This module provides adapters that feed recentchange events into the
//! sampling pipeline. Each source yields parsed [`ChangeEvent`]s; malformed
//! payloads and non-`message` stream events are skipped and counted.
//!
//! # Available Sources
//!
//! - [`SseSource`] - Live EventStreams connection (or a recorded SSE capture)
//! - [`JsonlSource`] - Reads JSONL dumps (one JSON event per line)
//!
//! # Architecture
//!
//! All sources implement the [`EventSource`] trait, which provides a uniform
//! interface for the pipeline to consume events regardless of their origin.

mod jsonl;
mod sse;

pub use jsonl::{JsonlConfig, JsonlSource};
pub use sse::{DEFAULT_USER_AGENT, SseConfig, SseSource};

use crate::Result;
use wikisample_core::ChangeEvent;
use wikisample_core::metrics::{self, EVENTS_MALFORMED_TOTAL, EVENTS_TOTAL};

/// A source of recentchange events.
pub trait EventSource {
    /// Human-readable name for this source (used in logs).
    fn name(&self) -> &'static str;

    /// Process events from this source, calling the handler for each parsed event.
    ///
    /// The handler returns `Ok(true)` to continue processing, `Ok(false)` to
    /// stop gracefully, or `Err` to abort with an error.
    ///
    /// # Returns
    ///
    /// Statistics about the processing run.
    fn process<F>(&mut self, handler: F) -> Result<SourceStats>
    where
        F: FnMut(ChangeEvent) -> Result<bool>;
}

/// Statistics from processing an event source.
#[derive(Debug, Clone, Default)]
pub struct SourceStats {
    /// Total raw events encountered (SSE events or non-empty lines).
    pub total_events: usize,

    /// Events parsed into a [`ChangeEvent`] and passed to the handler.
    pub valid_events: usize,

    /// SSE events skipped because their type is not `message`.
    pub ignored_events: usize,

    /// Payloads skipped because they are not valid JSON.
    pub parse_errors: usize,

    /// Source-specific metadata.
    pub source_metadata: SourceMetadata,
}

/// Source-specific metadata.
#[derive(Debug, Clone, Default)]
pub struct SourceMetadata {
    /// Total bytes read from the stream or file.
    pub bytes_read: Option<usize>,

    /// For SSE sources: the last event id seen (usable as a resume point).
    pub last_event_id: Option<String>,
}

/// Parse a payload and hand it to the handler.
///
/// Returns the handler's continue flag. Payloads that are not valid JSON are
/// counted and skipped without reaching the handler.
pub(crate) fn dispatch_payload<F>(
    payload: &str,
    stats: &mut SourceStats,
    handler: &mut F,
) -> Result<bool>
where
    F: FnMut(ChangeEvent) -> Result<bool>,
{
    let event = match ChangeEvent::from_json(payload) {
        Ok(event) => event,
        Err(e) => {
            tracing::trace!("Skipping malformed payload: {}", e);
            stats.parse_errors += 1;
            metrics::increment(EVENTS_MALFORMED_TOTAL, 1);
            return Ok(true);
        }
    };

    stats.valid_events += 1;
    handler(event)
}

/// Record a raw event in stats and metrics.
pub(crate) fn count_raw_event(stats: &mut SourceStats) {
    stats.total_events += 1;
    metrics::increment(EVENTS_TOTAL, 1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_skips_malformed() {
        let mut stats = SourceStats::default();
        let mut calls = 0;
        let mut handler = |_event: ChangeEvent| {
            calls += 1;
            Ok(true)
        };

        assert!(dispatch_payload("{not json", &mut stats, &mut handler).unwrap());
        assert!(dispatch_payload("", &mut stats, &mut handler).unwrap());
        assert!(
            dispatch_payload(r#"{"type":"edit","length":"big"}"#, &mut stats, &mut handler).unwrap()
        );
        assert!(dispatch_payload(r#"{"type":"edit"}"#, &mut stats, &mut handler).unwrap());

        assert_eq!(stats.parse_errors, 2);
        assert_eq!(stats.valid_events, 2);
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_dispatch_propagates_handler_result() {
        let mut stats = SourceStats::default();
        let mut stop = |_event: ChangeEvent| Ok(false);
        assert!(!dispatch_payload("{}", &mut stats, &mut stop).unwrap());

        let mut fail = |_event: ChangeEvent| -> Result<bool> {
            Err(std::io::Error::other("handler failed").into())
        };
        assert!(dispatch_payload("{}", &mut stats, &mut fail).is_err());
    }
}
