//! EventStreams URL construction.

use crate::Result;
use chrono::{DateTime, TimeDelta, Utc};
use url::Url;

/// The Wikimedia recentchange stream.
pub const RECENTCHANGE_URL: &str = "https://stream.wikimedia.org/v2/stream/recentchange";

/// Default backfill window in days.
pub const DEFAULT_SINCE_DAYS: u32 = 14;

/// Where to read the stream from, computed once at startup.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Stream endpoint without the `since` parameter.
    pub base_url: String,

    /// Request historical events from this instant on.
    pub since: Option<DateTime<Utc>>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            base_url: RECENTCHANGE_URL.to_string(),
            since: None,
        }
    }
}

impl StreamConfig {
    /// Backfill the given number of days before `now`; zero disables backfill.
    pub fn since_days_ago(now: DateTime<Utc>, days: u32) -> Self {
        let since = (days > 0).then(|| now - TimeDelta::days(i64::from(days)));
        Self {
            since,
            ..Default::default()
        }
    }

    /// Full stream URL, with `since` in epoch milliseconds when set.
    pub fn stream_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)?;
        if let Some(since) = self.since {
            url.query_pairs_mut()
                .append_pair("since", &since.timestamp_millis().to_string());
        }
        Ok(url)
    }
}
