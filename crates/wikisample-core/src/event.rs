//! Typed recentchange events and the CSV row derived from them.
//!
//! The recentchange stream mixes edits, new pages, log entries and category
//! changes, so every field of [`ChangeEvent`] is optional. A field of the
//! wrong type reads as absent. Required fields are only enforced when an
//! event is turned into a [`SampledRow`].

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// An `{old, new}` pair as used by the `length` and `revision` fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ValuePair {
    pub old: Option<u64>,
    pub new: Option<u64>,
}

/// A parsed recentchange event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChangeEvent {
    /// Change type: `edit`, `new`, `log`, `categorize`, ...
    #[serde(rename = "type", default, deserialize_with = "lenient")]
    pub kind: Option<String>,

    /// Wiki database name, e.g. `enwiki`.
    #[serde(default, deserialize_with = "lenient")]
    pub wiki: Option<String>,

    /// Whether the change was flagged as made by a bot account.
    #[serde(default, deserialize_with = "lenient")]
    pub bot: Option<bool>,

    #[serde(default, deserialize_with = "lenient")]
    pub user: Option<String>,

    /// Unix timestamp in seconds.
    #[serde(default, deserialize_with = "lenient")]
    pub timestamp: Option<i64>,

    #[serde(default, deserialize_with = "lenient")]
    pub namespace: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub comment: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub length: Option<ValuePair>,
    #[serde(default, deserialize_with = "lenient")]
    pub revision: Option<ValuePair>,

    /// The full payload, kept for arbitrary key lookups.
    #[serde(skip)]
    pub(crate) raw: Value,
}

impl ChangeEvent {
    /// Parse an event from its JSON payload.
    ///
    /// Only malformed JSON fails. A payload that is not an object yields an
    /// event with no fields set.
    pub fn from_json(payload: &str) -> Result<Self> {
        let raw: Value = serde_json::from_str(payload)?;
        Self::from_value(raw)
    }

    /// Build an event from an already parsed JSON value.
    pub fn from_value(raw: Value) -> Result<Self> {
        let mut event = if raw.is_object() {
            ChangeEvent::deserialize(&raw)?
        } else {
            ChangeEvent::default()
        };
        event.raw = raw;
        Ok(event)
    }

    /// Returns `true` if this is an `edit` change.
    pub fn is_edit(&self) -> bool {
        self.kind.as_deref() == Some("edit")
    }

    /// Look up a field by name or dotted path (`meta.id`, `revision.new`).
    pub fn field(&self, path: &str) -> Option<&Value> {
        if let Some(value) = self.raw.get(path) {
            return Some(value);
        }
        path.split('.')
            .try_fold(&self.raw, |value, segment| value.get(segment))
    }
}

/// Deserialize an optional field, reading a value of the wrong type as `None`.
fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).ok())
}

/// Render a JSON value as sampling key text.
///
/// Null and empty strings yield `None`; strings are used verbatim and all
/// other values in their compact JSON form.
pub fn render_key(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// The flat record written for each sampled event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampledRow {
    /// Only guaranteed to be set when the `bot` column is written.
    pub bot: Option<bool>,
    pub user: String,
    pub timestamp: i64,
    pub namespace: i64,
    pub title: String,
    pub comment: String,
    pub length_old: u64,
    pub length_new: u64,
    pub revision_old: u64,
    pub revision_new: u64,
}

impl SampledRow {
    /// CSV columns, excluding the optional leading `bot` column.
    pub const COLUMNS: [&'static str; 9] = [
        "user",
        "timestamp",
        "namespace",
        "title",
        "comment",
        "length_old",
        "length_new",
        "revision_old",
        "revision_new",
    ];

    /// Extract the row fields from an event.
    ///
    /// `comment` defaults to an empty string and `bot` is only required when
    /// `include_bot` is set. Every other field is required: an absent field
    /// yields [`Error::MissingField`], a mistyped one [`Error::InvalidField`].
    pub fn from_event(event: &ChangeEvent, include_bot: bool) -> Result<Self> {
        let length = required(event, event.length, "length").or_else(absent_pair)?;
        let revision = required(event, event.revision, "revision").or_else(absent_pair)?;

        Ok(Self {
            bot: if include_bot {
                Some(required(event, event.bot, "bot")?)
            } else {
                event.bot
            },
            user: required(event, event.user.clone(), "user")?,
            timestamp: required(event, event.timestamp, "timestamp")?,
            namespace: required(event, event.namespace, "namespace")?,
            title: required(event, event.title.clone(), "title")?,
            comment: event.comment.clone().unwrap_or_default(),
            length_old: required(event, length.old, "length.old")?,
            length_new: required(event, length.new, "length.new")?,
            revision_old: required(event, revision.old, "revision.old")?,
            revision_new: required(event, revision.new, "revision.new")?,
        })
    }

    /// Header row for the given column layout.
    pub fn header(include_bot: bool) -> Vec<&'static str> {
        let mut header = Vec::with_capacity(Self::COLUMNS.len() + 1);
        if include_bot {
            header.push("bot");
        }
        header.extend_from_slice(&Self::COLUMNS);
        header
    }

    /// Field values in header order.
    pub fn to_record(&self, include_bot: bool) -> Vec<String> {
        let mut record = Vec::with_capacity(Self::COLUMNS.len() + 1);
        if include_bot {
            record.push(self.bot.map(|bot| bot.to_string()).unwrap_or_default());
        }
        record.extend([
            self.user.clone(),
            self.timestamp.to_string(),
            self.namespace.to_string(),
            self.title.clone(),
            self.comment.clone(),
            self.length_old.to_string(),
            self.length_new.to_string(),
            self.revision_old.to_string(),
            self.revision_new.to_string(),
        ]);
        record
    }
}

fn required<T>(event: &ChangeEvent, value: Option<T>, field: &'static str) -> Result<T> {
    value.ok_or_else(|| {
        if event.field(field).is_some_and(|v| !v.is_null()) {
            Error::InvalidField { field }
        } else {
            Error::MissingField { field }
        }
    })
}

/// An absent pair reports its missing member (`length.old`), not the pair.
fn absent_pair(err: Error) -> Result<ValuePair> {
    match err {
        Error::MissingField { .. } => Ok(ValuePair::default()),
        other => Err(other),
    }
}
