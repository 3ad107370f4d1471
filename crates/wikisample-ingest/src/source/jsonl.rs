//! JSONL event source adapter.
//!
//! Replays recentchange events from a JSONL dump (one JSON event per line),
//! e.g. a capture made with `curl ... | sed -n 's/^data: //p'`.

use super::{EventSource, SourceMetadata, SourceStats, count_raw_event, dispatch_payload};
use crate::Result;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use wikisample_core::ChangeEvent;

/// Configuration for the JSONL source.
#[derive(Debug, Clone, Default)]
pub struct JsonlConfig {
    /// Input file path.
    pub input: PathBuf,
}

/// JSONL file event source.
pub struct JsonlSource {
    config: JsonlConfig,
}

impl JsonlSource {
    pub fn new(config: JsonlConfig) -> Self {
        Self { config }
    }
}

impl EventSource for JsonlSource {
    fn name(&self) -> &'static str {
        "jsonl"
    }

    fn process<F>(&mut self, mut handler: F) -> Result<SourceStats>
    where
        F: FnMut(ChangeEvent) -> Result<bool>,
    {
        let mut stats = SourceStats::default();
        let mut bytes_read = 0usize;

        tracing::info!("Replaying events from {}", self.config.input.display());
        let reader = BufReader::new(File::open(&self.config.input)?);

        for line in reader.lines() {
            let line = line?;
            bytes_read += line.len() + 1;

            if line.trim().is_empty() {
                continue;
            }

            count_raw_event(&mut stats);
            if !dispatch_payload(&line, &mut stats, &mut handler)? {
                tracing::info!("Handler signaled stop");
                break;
            }
        }

        stats.source_metadata = SourceMetadata {
            bytes_read: Some(bytes_read),
            ..Default::default()
        };

        Ok(stats)
    }
}
