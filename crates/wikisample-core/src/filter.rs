//! Relevance filtering for recentchange events.

use crate::event::ChangeEvent;
use std::fmt;
use std::str::FromStr;

/// Returns `true` iff the event is an edit on the given wiki.
pub fn is_relevant(event: &ChangeEvent, wiki: &str) -> bool {
    event.is_edit() && event.wiki.as_deref() == Some(wiki)
}

/// Condition on the `bot` flag of an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BotFilter {
    /// Bot and human edits alike.
    #[default]
    Any,
    /// Only edits flagged as bot edits.
    Only,
    /// Only edits not flagged as bot edits. A missing flag counts as human.
    Exclude,
}

impl BotFilter {
    pub fn matches(self, bot: Option<bool>) -> bool {
        match self {
            BotFilter::Any => true,
            BotFilter::Only => bot == Some(true),
            BotFilter::Exclude => bot != Some(true),
        }
    }
}

impl FromStr for BotFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "any" => Ok(BotFilter::Any),
            "only" => Ok(BotFilter::Only),
            "exclude" => Ok(BotFilter::Exclude),
            other => Err(format!(
                "unknown bot filter '{other}' (expected any, only or exclude)"
            )),
        }
    }
}

impl fmt::Display for BotFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            BotFilter::Any => "any",
            BotFilter::Only => "only",
            BotFilter::Exclude => "exclude",
        })
    }
}

/// The full relevance predicate: edit type, target wiki and bot condition.
#[derive(Debug, Clone)]
pub struct RelevanceFilter {
    pub wiki: String,
    pub bot: BotFilter,
}

impl RelevanceFilter {
    pub fn new(wiki: impl Into<String>, bot: BotFilter) -> Self {
        Self {
            wiki: wiki.into(),
            bot,
        }
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        is_relevant(event, &self.wiki) && self.bot.matches(event.bot)
    }
}

impl Default for RelevanceFilter {
    fn default() -> Self {
        Self::new(crate::DEFAULT_WIKI, BotFilter::Any)
    }
}
