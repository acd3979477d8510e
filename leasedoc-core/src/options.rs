//! Per-call options recognized by the store operations.

use serde::{Deserialize, Serialize};

/// Consistency the caller would like for a read. Advisory only.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum ConsistencyHint {
    Strong,
    BoundedStaleness,
    Session,
    Eventual,
}

/// Options accepted by every client operation.
///
/// - `pre_triggers` run in order, after the collection's default triggers, before a write
/// - `continuation` resumes a `list` at a previously returned cursor, or a change feed at a
///   previously returned checkpoint
/// - `partition_key` scopes a `list` to a single partition; `None` lists the collection
/// - `consistency_hint` is passed through to backends that understand it
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Options {
    #[serde(default, rename = "PreTriggers")]
    pub pre_triggers: Vec<String>,
    #[serde(default, rename = "continuationToken")]
    pub continuation: Option<String>,
    #[serde(default)]
    pub partition_key: Option<String>,
    #[serde(default)]
    pub consistency_hint: Option<ConsistencyHint>,
}

impl Options {
    pub fn builder() -> OptionsBuilder {
        OptionsBuilder::default()
    }

    /// Shorthand for options that only carry pre-triggers.
    pub fn with_pre_triggers<I, S>(triggers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pre_triggers: triggers.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Default)]
pub struct OptionsBuilder {
    options: Options,
}

impl OptionsBuilder {
    /// Appends a trigger to run before the write is committed.
    pub fn pre_trigger(mut self, name: impl Into<String>) -> Self {
        self.options.pre_triggers.push(name.into());
        self
    }

    pub fn continuation(mut self, continuation: impl Into<String>) -> Self {
        self.options.continuation = Some(continuation.into());
        self
    }

    pub fn partition_key(mut self, partition_key: impl Into<String>) -> Self {
        self.options.partition_key = Some(partition_key.into());
        self
    }

    pub fn consistency_hint(mut self, hint: ConsistencyHint) -> Self {
        self.options.consistency_hint = Some(hint);
        self
    }

    pub fn build(self) -> Options {
        self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_keeps_trigger_order() {
        let options = Options::builder()
            .pre_trigger("setCreationTime")
            .pre_trigger("renewLease")
            .continuation("4")
            .build();

        assert_eq!(options.pre_triggers, vec!["setCreationTime", "renewLease"]);
        assert_eq!(options.continuation.as_deref(), Some("4"));
        assert_eq!(options.partition_key, None);
    }

    #[test]
    fn deserializes_wire_key_names() {
        let options: Options = serde_json::from_str(
            r#"{"PreTriggers":["renewLease"],"continuationToken":"2","consistencyHint":"Eventual"}"#,
        )
        .unwrap();

        assert_eq!(options.pre_triggers, vec!["renewLease"]);
        assert_eq!(options.continuation.as_deref(), Some("2"));
        assert_eq!(options.consistency_hint, Some(ConsistencyHint::Eventual));
    }
}
