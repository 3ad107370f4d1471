//! Server-sent events source adapter.
//!
//! Opens a long-lived HTTP connection to a Wikimedia EventStreams endpoint
//! and parses the response body as SSE. Reads block until the next event
//! arrives; a dropped connection or HTTP error ends the run with an error.
//! There is no reconnect.

use super::{EventSource, SourceMetadata, SourceStats, count_raw_event, dispatch_payload};
use crate::sse::SseReader;
use crate::Result;
use reqwest::header::{ACCEPT, HeaderValue};
use std::io::{BufRead, BufReader, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use wikisample_core::ChangeEvent;
use wikisample_core::metrics::{self, EVENTS_IGNORED_TOTAL};

/// User agent sent when none is configured. Wikimedia asks clients to identify themselves.
pub const DEFAULT_USER_AGENT: &str = concat!("wikisample/", env!("CARGO_PKG_VERSION"));

/// Configuration for the SSE source.
#[derive(Debug, Clone)]
pub struct SseConfig {
    /// Stream URL, including any `since` query parameter.
    pub url: String,

    /// Value of the `User-Agent` header.
    pub user_agent: String,

    /// TCP connect timeout. The stream itself has no read timeout.
    pub connect_timeout: Option<Duration>,
}

impl Default for SseConfig {
    fn default() -> Self {
        Self {
            url: crate::stream::RECENTCHANGE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            connect_timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// SSE event source.
pub struct SseSource {
    reader: SseReader<Box<dyn BufRead>>,
    origin: String,
    running: Option<Arc<AtomicBool>>,
}

impl SseSource {
    /// Connect to the configured stream.
    ///
    /// Fails if the connection cannot be established or the server answers
    /// with a non-success status.
    pub fn connect(config: &SseConfig) -> Result<Self> {
        let mut builder = reqwest::blocking::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(None);
        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let client = builder.build()?;

        tracing::info!("Connecting to {}", config.url);
        let response = client
            .get(&config.url)
            .header(ACCEPT, HeaderValue::from_static("text/event-stream"))
            .send()?
            .error_for_status()?;
        tracing::info!("Connected: HTTP {}", response.status());

        let mut source = Self::from_reader(response);
        source.origin = config.url.clone();
        Ok(source)
    }

    /// Parse SSE from an arbitrary reader, e.g. a recorded capture.
    pub fn from_reader<R: Read + 'static>(reader: R) -> Self {
        let reader: Box<dyn BufRead> = Box::new(BufReader::new(reader));
        Self {
            reader: SseReader::new(reader),
            origin: "reader".to_string(),
            running: None,
        }
    }

    /// Stop at the next stream event once `running` is cleared, including
    /// events the handler never sees.
    pub fn with_running_flag(mut self, running: Arc<AtomicBool>) -> Self {
        self.running = Some(running);
        self
    }

    fn shutdown_requested(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|running| !running.load(Ordering::SeqCst))
    }

    /// Where events come from (URL or `reader`).
    pub fn origin(&self) -> &str {
        &self.origin
    }
}

impl EventSource for SseSource {
    fn name(&self) -> &'static str {
        "sse"
    }

    fn process<F>(&mut self, mut handler: F) -> Result<SourceStats>
    where
        F: FnMut(ChangeEvent) -> Result<bool>,
    {
        let mut stats = SourceStats::default();

        while !self.shutdown_requested() {
            let Some(raw) = self.reader.next() else {
                break;
            };
            let raw = raw?;
            if self.shutdown_requested() {
                break;
            }
            count_raw_event(&mut stats);

            if !raw.is_message() {
                tracing::debug!("Ignoring '{}' event", raw.event);
                stats.ignored_events += 1;
                metrics::increment(EVENTS_IGNORED_TOTAL, 1);
                continue;
            }

            if !dispatch_payload(&raw.data, &mut stats, &mut handler)? {
                tracing::info!("Handler signaled stop");
                break;
            }
        }

        stats.source_metadata = SourceMetadata {
            bytes_read: Some(self.reader.bytes_read()),
            last_event_id: self.reader.last_event_id().map(str::to_string),
        };

        Ok(stats)
    }
}
