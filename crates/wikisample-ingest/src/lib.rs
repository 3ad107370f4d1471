//! Wikisample ingestion pipeline.
//!
//! This crate consumes the Wikimedia EventStreams `recentchange` feed,
//! keeps edit events on one wiki, samples them with a seeded hash and writes
//! the sampled fields to CSV.
//!
//! # Modules
//!
//! - [`sse`] - Server-sent events wire parser
//! - [`source`] - Event source adapters (live SSE, recorded SSE, JSONL)
//! - [`pipeline`] - Sampling driver and CSV sink
//! - [`stream`] - Stream URL construction (`since` backfill)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  Event Source   │  EventStreams SSE, recorded capture, JSONL dump
//! └────────┬────────┘
//!          │  ChangeEvent (malformed / non-message skipped)
//!          ▼
//! ┌─────────────────┐
//! │ RelevanceFilter │  type == edit, wiki, bot flag
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │     Sampler     │  SipHash(key) % 100 / 100 < threshold
//! └────────┬────────┘
//!          │  SampledRow
//!          ▼
//! ┌─────────────────┐
//! │     CsvSink     │  header + rows, stops at sample limit
//! └─────────────────┘
//! ```

pub mod error;
pub mod pipeline;
pub mod source;
pub mod sse;
pub mod stream;

pub use error::{Error, Result};

pub use pipeline::{CsvSink, PipelineConfig, RunStats, SinkConfig, StopReason, run_sampler};

pub use source::{
    EventSource, JsonlConfig, JsonlSource, SourceMetadata, SourceStats, SseConfig, SseSource,
};

pub use sse::{SseEvent, SseReader};
pub use stream::StreamConfig;
