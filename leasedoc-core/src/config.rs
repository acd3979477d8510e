//! Per-collection configuration.
//!
//! A [`CollectionConfig`] is the small per-kind object a typed client is built from: the
//! collection name, the triggers every write in that collection runs, and the retry policy
//! used by `patch_with_lease`. Configs deserialize from JSON with every field optional except
//! the name.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{
    document::Document,
    error::{DocumentStoreError, DocumentStoreResult},
};

/// Retry policy for the optimistic read-modify-write loop.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct LeasePolicy {
    /// Total number of Replace attempts, including the first.
    pub max_attempts: u32,
    /// Upper bound of the delay before the second attempt.
    #[serde(with = "millis")]
    pub initial_backoff: Duration,
    /// Cap applied to every delay.
    #[serde(with = "millis")]
    pub max_backoff: Duration,
    /// Growth factor between consecutive delays.
    pub multiplier: f64,
}

impl Default for LeasePolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_secs(1),
            multiplier: 2.0,
        }
    }
}

impl LeasePolicy {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Upper bound of the delay after the given failed attempt (1-based).
    pub fn backoff_ceiling(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(30) as i32;
        let factor = self.multiplier.max(1.0).powi(exponent);
        let ceiling = self.initial_backoff.as_nanos() as f64 * factor;

        Duration::from_nanos(ceiling.min(self.max_backoff.as_nanos() as f64) as u64)
    }

    /// Picks a delay uniformly in `[0, backoff_ceiling(attempt)]`.
    pub fn jittered_backoff(&self, attempt: u32) -> Duration {
        let ceiling = self.backoff_ceiling(attempt).as_micros() as u64;
        if ceiling == 0 {
            return Duration::ZERO;
        }

        Duration::from_micros(rand::thread_rng().gen_range(0..=ceiling))
    }

    pub fn validate(&self) -> DocumentStoreResult<()> {
        if self.max_attempts == 0 {
            return Err(DocumentStoreError::Validation(
                "lease policy needs at least one attempt".into(),
            ));
        }

        if !self.multiplier.is_finite() {
            return Err(DocumentStoreError::Validation(
                "lease policy multiplier must be finite".into(),
            ));
        }

        Ok(())
    }
}

/// Configuration for one document kind.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CollectionConfig {
    pub name: String,
    /// Triggers run before every write, ahead of any per-call `pre_triggers`.
    #[serde(default)]
    pub default_pre_triggers: Vec<String>,
    #[serde(default)]
    pub lease: LeasePolicy,
}

impl CollectionConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_pre_triggers: Vec::new(),
            lease: LeasePolicy::default(),
        }
    }

    /// Default configuration for a document type, named after its collection.
    pub fn for_document<D: Document>() -> Self {
        Self::new(D::collection_name())
    }

    pub fn with_default_pre_trigger(mut self, name: impl Into<String>) -> Self {
        self.default_pre_triggers.push(name.into());
        self
    }

    pub fn with_lease_policy(mut self, lease: LeasePolicy) -> Self {
        self.lease = lease;
        self
    }

    pub fn validate(&self) -> DocumentStoreResult<()> {
        if self.name.is_empty() {
            return Err(DocumentStoreError::Validation("collection name must not be empty".into()));
        }

        self.lease.validate()
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_then_caps() {
        let policy = LeasePolicy::default()
            .with_backoff(Duration::from_millis(10), Duration::from_millis(50));

        assert_eq!(policy.backoff_ceiling(1), Duration::from_millis(10));
        assert_eq!(policy.backoff_ceiling(2), Duration::from_millis(20));
        assert_eq!(policy.backoff_ceiling(3), Duration::from_millis(40));
        assert_eq!(policy.backoff_ceiling(4), Duration::from_millis(50));
        assert_eq!(policy.backoff_ceiling(400), Duration::from_millis(50));
    }

    #[test]
    fn jitter_stays_under_ceiling() {
        let policy = LeasePolicy::default();
        for attempt in 1..8 {
            assert!(policy.jittered_backoff(attempt) <= policy.backoff_ceiling(attempt));
        }
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: CollectionConfig = serde_json::from_str(
            r#"{"name":"OpenShiftClusters","defaultPreTriggers":["renewLease"],"lease":{"maxAttempts":3,"initialBackoff":5}}"#,
        )
        .unwrap();

        assert_eq!(config.default_pre_triggers, vec!["renewLease"]);
        assert_eq!(config.lease.max_attempts, 3);
        assert_eq!(config.lease.initial_backoff, Duration::from_millis(5));
        assert_eq!(config.lease.max_backoff, LeasePolicy::default().max_backoff);
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let config = CollectionConfig::new("c")
            .with_lease_policy(LeasePolicy::default().with_max_attempts(0));
        assert!(matches!(config.validate(), Err(DocumentStoreError::Validation(_))));
        assert!(CollectionConfig::new("").validate().is_err());
    }
}
