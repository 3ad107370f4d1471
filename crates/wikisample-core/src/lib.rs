//! Core types and decisions for the wikisample pipeline.
//!
//! This crate provides:
//! - The typed [`ChangeEvent`] record parsed from recentchange payloads
//! - [`SampledRow`], the flat record written to CSV
//! - The relevance filter (edit type, target wiki, bot flag)
//! - The seeded hash [`Sampler`]
//! - Prometheus metrics helpers
//! - Shared error types

mod error;
mod event;
mod filter;
pub mod metrics;
mod sample;

// ═══════════════════════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════════════════════

/// Wiki targeted when none is configured.
pub const DEFAULT_WIKI: &str = "enwiki";

/// Default sampling threshold (20% of relevant events).
pub const DEFAULT_THRESHOLD: f64 = 0.2;

/// Default maximum number of rows written per run.
pub const DEFAULT_SAMPLE_LIMIT: usize = 40_000;

pub use error::{Error, Result};
pub use event::{ChangeEvent, SampledRow, ValuePair, render_key};
pub use filter::{BotFilter, RelevanceFilter, is_relevant};
pub use sample::{DEFAULT_SEED, SampleKey, Sampler, hash_fraction, should_sample};
