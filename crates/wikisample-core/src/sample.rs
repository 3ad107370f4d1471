//! Deterministic hash-based sampling.
//!
//! Each relevant event is reduced to a key string, the key is hashed with
//! SipHash-2-4 under explicit keys derived from a seed, and the hash is
//! mapped to a fraction `hash % 100 / 100` in `[0, 1)`. The event is kept iff
//! the fraction is below the threshold. Equal keys always get the same
//! decision for the same seed, across runs and machines.

use crate::error::{Error, Result};
use crate::event::{ChangeEvent, render_key};
use siphasher::sip::SipHasher24;
use std::fmt;
use std::hash::Hasher;
use std::str::FromStr;

/// Seed used when none is configured.
pub const DEFAULT_SEED: u64 = 0;

/// Name selecting [`SampleKey::Composite`] when parsing. It shadows any
/// event field of the same name.
const COMPOSITE_KEY_NAME: &str = "composite";

/// How the sampling key is built from an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleKey {
    /// A single field, by name or dotted path.
    Field(String),
    /// `namespace|timestamp|revision.new`.
    Composite,
}

impl SampleKey {
    /// Build the key text for an event, or `None` if it has no usable key.
    pub fn extract(&self, event: &ChangeEvent) -> Option<String> {
        match self {
            SampleKey::Field(path) => event.field(path).and_then(render_key),
            SampleKey::Composite => {
                let namespace = event.namespace?;
                let timestamp = event.timestamp?;
                let revision = event.revision?.new?;
                Some(format!("{namespace}|{timestamp}|{revision}"))
            }
        }
    }
}

impl Default for SampleKey {
    fn default() -> Self {
        SampleKey::Field("id".to_string())
    }
}

impl FromStr for SampleKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() || s.split('.').any(str::is_empty) {
            return Err(Error::InvalidSampleKey(s.to_string()));
        }
        if s.eq_ignore_ascii_case(COMPOSITE_KEY_NAME) {
            return Ok(SampleKey::Composite);
        }
        Ok(SampleKey::Field(s.to_string()))
    }
}

impl fmt::Display for SampleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleKey::Field(path) => f.pad(path),
            SampleKey::Composite => f.pad(COMPOSITE_KEY_NAME),
        }
    }
}

/// Map a key to its sampling fraction in `[0, 1)`.
pub fn hash_fraction(key: &str, seed: u64) -> f64 {
    let mut hasher = SipHasher24::new_with_keys(seed, !seed);
    hasher.write(key.as_bytes());
    (hasher.finish() % 100) as f64 / 100.0
}

/// Sampling decision with the default seed.
pub fn should_sample(event: &ChangeEvent, key: &SampleKey, threshold: f64) -> bool {
    key.extract(event)
        .is_some_and(|key| hash_fraction(&key, DEFAULT_SEED) < threshold)
}

/// A configured sampler.
#[derive(Debug, Clone)]
pub struct Sampler {
    key: SampleKey,
    threshold: f64,
    seed: u64,
}

impl Sampler {
    /// Create a sampler. The threshold must lie within `[0, 1]`.
    pub fn new(key: SampleKey, threshold: f64, seed: u64) -> Result<Self> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::InvalidThreshold(threshold));
        }
        Ok(Self {
            key,
            threshold,
            seed,
        })
    }

    pub fn key(&self) -> &SampleKey {
        &self.key
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Fraction for the event's key, or `None` if the event has no key.
    pub fn fraction(&self, event: &ChangeEvent) -> Option<f64> {
        self.key
            .extract(event)
            .map(|key| hash_fraction(&key, self.seed))
    }

    pub fn should_sample(&self, event: &ChangeEvent) -> bool {
        self.fraction(event)
            .is_some_and(|fraction| fraction < self.threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ValuePair;

    fn event_with_id(id: u64) -> ChangeEvent {
        ChangeEvent::from_value(serde_json::json!({
            "id": id,
            "type": "edit",
            "wiki": "enwiki",
            "namespace": 0,
            "timestamp": 1_700_000_000 + id as i64,
            "revision": {"old": id, "new": id + 1},
        }))
        .unwrap()
    }

    #[test]
    fn test_fraction_in_unit_interval() {
        for i in 0..1000 {
            let fraction = hash_fraction(&format!("key-{i}"), DEFAULT_SEED);
            assert!((0.0..1.0).contains(&fraction));
            // Two decimal places: hash % 100 / 100.
            assert_eq!((fraction * 100.0).round() / 100.0, fraction);
        }
    }

    #[test]
    fn test_should_sample_is_deterministic() {
        let key = SampleKey::default();
        for id in 0..200 {
            let event = event_with_id(id);
            let first = should_sample(&event, &key, 0.2);
            let second = should_sample(&event, &key, 0.2);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_hash_is_stable_across_sampler_instances() {
        let a = Sampler::new(SampleKey::default(), 0.5, 7).unwrap();
        let b = Sampler::new(SampleKey::default(), 0.5, 7).unwrap();
        for id in 0..200 {
            let event = event_with_id(id);
            assert_eq!(a.fraction(&event), b.fraction(&event));
        }
    }

    #[test]
    fn test_seed_changes_decisions() {
        let differing = (0..100)
            .filter(|i| {
                let key = format!("key-{i}");
                hash_fraction(&key, 0) != hash_fraction(&key, 1)
            })
            .count();
        assert!(differing > 50);
    }

    #[test]
    fn test_threshold_bounds() {
        let key = SampleKey::default();
        for id in 0..200 {
            let event = event_with_id(id);
            assert!(!should_sample(&event, &key, 0.0));
            assert!(should_sample(&event, &key, 1.0));
        }
    }

    #[test]
    fn test_sampling_rate_converges() {
        for threshold in [0.1, 0.2, 0.5] {
            let sampler = Sampler::new(SampleKey::default(), threshold, DEFAULT_SEED).unwrap();
            let population = 20_000;
            let sampled = (0..population)
                .filter(|&id| sampler.should_sample(&event_with_id(id)))
                .count();
            let rate = sampled as f64 / population as f64;
            assert!(
                (rate - threshold).abs() < 0.02,
                "rate {rate} too far from threshold {threshold}"
            );
        }
    }

    #[test]
    fn test_missing_or_empty_key_never_sampled() {
        let event = ChangeEvent::from_value(serde_json::json!({
            "type": "edit",
            "title": "",
            "comment": null,
        }))
        .unwrap();

        for field in ["id", "title", "comment", "meta.id"] {
            let key = SampleKey::Field(field.to_string());
            assert_eq!(key.extract(&event), None);
            assert!(!should_sample(&event, &key, 1.0));
        }
    }

    #[test]
    fn test_dotted_field_key() {
        let event = ChangeEvent::from_value(serde_json::json!({
            "meta": {"id": "abc-123"},
        }))
        .unwrap();
        let key = SampleKey::Field("meta.id".to_string());
        assert_eq!(key.extract(&event), Some("abc-123".to_string()));
    }

    #[test]
    fn test_composite_key() {
        let event = event_with_id(5);
        assert_eq!(
            SampleKey::Composite.extract(&event),
            Some("0|1700000005|6".to_string())
        );

        let mut partial = event.clone();
        partial.revision = Some(ValuePair {
            old: Some(5),
            new: None,
        });
        assert_eq!(SampleKey::Composite.extract(&partial), None);
    }

    #[test]
    fn test_sample_key_parse() {
        assert_eq!(
            "id".parse::<SampleKey>().unwrap(),
            SampleKey::Field("id".to_string())
        );
        assert_eq!(
            "Composite".parse::<SampleKey>().unwrap(),
            SampleKey::Composite
        );
        assert_eq!(
            " meta.id ".parse::<SampleKey>().unwrap(),
            SampleKey::Field("meta.id".to_string())
        );
        assert!("".parse::<SampleKey>().is_err());
        assert!("meta.".parse::<SampleKey>().is_err());
        assert_eq!(SampleKey::Composite.to_string(), "composite");
        assert_eq!(
            "COMPOSITE".parse::<SampleKey>().unwrap(),
            SampleKey::Composite
        );
    }

    #[test]
    fn test_sampler_rejects_invalid_threshold() {
        for threshold in [-0.1, 1.01, f64::NAN, f64::INFINITY] {
            let result = Sampler::new(SampleKey::default(), threshold, DEFAULT_SEED);
            assert!(matches!(result, Err(Error::InvalidThreshold(_))));
        }
        assert!(Sampler::new(SampleKey::default(), 0.0, DEFAULT_SEED).is_ok());
        assert!(Sampler::new(SampleKey::default(), 1.0, DEFAULT_SEED).is_ok());
    }
}
