//! Prometheus metrics helpers for wikisample.
//!
//! # Usage
//!
//! ```rust,ignore
//! use wikisample_core::metrics::{init_metrics, start_metrics_server};
//!
//! let handle = init_metrics();
//! start_metrics_server(9091, handle)?;
//!
//! metrics::counter!("wikisample_rows_written_total").increment(1);
//! ```
//!
//! # Metric Naming Conventions
//!
//! - Prefix: `wikisample_`
//! - Suffix: unit or type (`_total`, `_bytes`)

use axum::{Router, routing::get};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::{SocketAddr, TcpListener};
use std::thread::JoinHandle;

pub const EVENTS_TOTAL: &str = "wikisample_events_total";
pub const EVENTS_IGNORED_TOTAL: &str = "wikisample_events_ignored_total";
pub const EVENTS_MALFORMED_TOTAL: &str = "wikisample_events_malformed_total";
pub const EVENTS_RELEVANT_TOTAL: &str = "wikisample_events_relevant_total";
pub const ROWS_WRITTEN_TOTAL: &str = "wikisample_rows_written_total";
pub const RUNNING: &str = "wikisample_running";

/// Initialize the Prometheus metrics recorder.
///
/// This must be called once at startup before any metrics are recorded.
///
/// # Panics
///
/// Panics if called more than once (the recorder can only be installed once).
pub fn init_metrics() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder");

    register_metrics();

    handle
}

/// Like [`init_metrics`] but returns `None` if a recorder is already installed.
pub fn try_init_metrics() -> Option<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder().ok()?;
    register_metrics();
    Some(handle)
}

/// Start the Prometheus metrics HTTP server on its own thread.
///
/// The pipeline itself is synchronous, so the `/metrics` endpoint runs on a
/// dedicated current-thread tokio runtime. The port is bound before
/// returning so that bind errors surface to the caller.
pub fn start_metrics_server(
    port: u16,
    handle: PrometheusHandle,
) -> Result<JoinHandle<()>, std::io::Error> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)?;
    listener.set_nonblocking(true)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .build()?;

    tracing::info!("Metrics server listening on http://{}/metrics", addr);

    let app = Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    );

    Ok(std::thread::spawn(move || {
        runtime.block_on(async move {
            let listener = match tokio::net::TcpListener::from_std(listener) {
                Ok(listener) => listener,
                Err(e) => {
                    tracing::warn!("Metrics listener setup failed: {}", e);
                    return;
                }
            };
            if let Err(e) = axum::serve(listener, app).await {
                tracing::warn!("Metrics server stopped: {}", e);
            }
        });
    }))
}

fn register_metrics() {
    describe_counter!(EVENTS_TOTAL, "Total SSE events read from the stream");
    describe_counter!(
        EVENTS_IGNORED_TOTAL,
        "SSE events skipped because their type is not 'message'"
    );
    describe_counter!(
        EVENTS_MALFORMED_TOTAL,
        "Message payloads skipped because they are not valid change events"
    );
    describe_counter!(
        EVENTS_RELEVANT_TOTAL,
        "Edit events on the target wiki that passed the relevance filter"
    );
    describe_counter!(ROWS_WRITTEN_TOTAL, "Sampled rows written to the CSV file");
    describe_gauge!(
        RUNNING,
        "Whether a sampling run is in progress (1=yes, 0=no)"
    );
}

/// Increment a counter.
#[inline]
pub fn increment(name: &'static str, count: u64) {
    metrics::counter!(name).increment(count);
}

/// Set a gauge value.
#[inline]
pub fn set_gauge(name: &'static str, value: f64) {
    metrics::gauge!(name).set(value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Once;

    static INIT: Once = Once::new();

    fn ensure_metrics_init() {
        INIT.call_once(|| {
            let _ = try_init_metrics();
        });
    }

    #[test]
    fn test_try_init_metrics_idempotent() {
        let handle1 = try_init_metrics();
        let handle2 = try_init_metrics();
        assert!(handle1.is_none() || handle2.is_none());
    }

    #[test]
    fn test_increment_does_not_panic() {
        ensure_metrics_init();
        increment(EVENTS_TOTAL, 0);
        increment(EVENTS_TOTAL, 1);
        increment(ROWS_WRITTEN_TOTAL, 100);
    }

    #[test]
    fn test_set_gauge_does_not_panic() {
        ensure_metrics_init();
        set_gauge(RUNNING, 1.0);
        set_gauge(RUNNING, 0.0);
    }

    #[test]
    fn test_register_metrics_repeatable() {
        ensure_metrics_init();
        register_metrics();
        register_metrics();
    }
}
