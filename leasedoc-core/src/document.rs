//! Core traits and types for document representation and serialization.
//!
//! This module provides the trait every stored document implements, the opaque
//! [`VersionToken`] used for optimistic concurrency, and helpers for converting documents
//! between their typed form and the BSON/JSON representations the backends work with.

use bson::{Bson, de::deserialize_from_bson, ser::serialize_to_bson};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, from_value, to_value};
use std::fmt;
use uuid::Uuid;

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Characters the remote store refuses inside a document id.
const FORBIDDEN_ID_CHARS: [char; 4] = ['/', '\\', '?', '#'];

/// Opaque value assigned by the store on every successful write.
///
/// Two tokens are only ever compared for equality; their content carries no meaning.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionToken(String);

impl VersionToken {
    /// Generates a fresh, never-before-seen token.
    pub fn generate() -> Self {
        Self(format!("\"{}\"", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for VersionToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for VersionToken {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Core trait that all documents stored in a document store must implement.
///
/// A document has an id that is unique within its partition, belongs to exactly one
/// collection, and carries the [`VersionToken`] it was last read with. The token is what
/// makes `replace` a compare-and-set rather than a blind overwrite, so implementations must
/// round-trip it faithfully.
///
/// # Example
///
/// ```ignore
/// use leasedoc::prelude::*;
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct ClusterDocument {
///     pub id: String,
///     pub provisioning_state: String,
///     #[serde(rename = "_etag", default, skip_serializing_if = "Option::is_none")]
///     pub etag: Option<VersionToken>,
/// }
///
/// impl Document for ClusterDocument {
///     fn id(&self) -> &str { &self.id }
///     fn collection_name() -> &'static str { "OpenShiftClusters" }
///     fn version_token(&self) -> Option<&VersionToken> { self.etag.as_ref() }
///     fn set_version_token(&mut self, token: VersionToken) { self.etag = Some(token); }
/// }
/// ```
pub trait Document: Serialize + for<'de> Deserialize<'de> + Send + Sync + Clone + 'static {
    /// Returns this document's id, unique within its partition.
    fn id(&self) -> &str;

    /// Returns the name of the collection this document kind is stored in.
    fn collection_name() -> &'static str;

    /// Returns the version token this copy was read with, if any.
    fn version_token(&self) -> Option<&VersionToken>;

    /// Records the version token assigned by the store.
    fn set_version_token(&mut self, token: VersionToken);

    /// Records the time of the last successful write. Ignored unless overridden.
    fn set_modified_at(&mut self, _at: DateTime<Utc>) {}
}

/// Extension trait providing serialization/deserialization utilities for documents.
///
/// This trait is automatically implemented for all types that implement [`Document`].
pub trait DocumentExt: Document {
    /// Converts this document to a BSON value for storage.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Validation`] if the document does not serialize to an
    /// object, or a serialization error if encoding fails.
    fn to_bson(&self) -> DocumentStoreResult<Bson>;

    /// Creates a document from a BSON value.
    fn from_bson(bson: Bson) -> DocumentStoreResult<Self>;

    /// Converts this document to a JSON value.
    fn to_json(&self) -> DocumentStoreResult<Value>;

    /// Creates a document from a JSON value.
    fn from_json(value: Value) -> DocumentStoreResult<Self>;
}

impl<D: Document> DocumentExt for D {
    fn to_bson(&self) -> DocumentStoreResult<Bson> {
        let bson = serialize_to_bson(self)?;

        if bson.as_document().is_none() {
            return Err(DocumentStoreError::Validation(format!(
                "document {} in {} must serialize to an object",
                self.id(),
                Self::collection_name()
            )));
        }

        Ok(bson)
    }

    fn from_bson(bson: Bson) -> DocumentStoreResult<Self> {
        Ok(deserialize_from_bson(bson)?)
    }

    fn to_json(&self) -> DocumentStoreResult<Value> {
        Ok(to_value(self)?)
    }

    fn from_json(value: Value) -> DocumentStoreResult<Self> {
        Ok(from_value(value)?)
    }
}

/// Checks that `id` is acceptable as a document id.
pub fn validate_id(id: &str) -> DocumentStoreResult<()> {
    if id.is_empty() {
        return Err(DocumentStoreError::Validation("document id must not be empty".into()));
    }

    if let Some(c) = id.chars().find(|c| FORBIDDEN_ID_CHARS.contains(c)) {
        return Err(DocumentStoreError::Validation(format!(
            "document id {id:?} contains forbidden character {c:?}"
        )));
    }

    Ok(())
}

/// Checks that `partition_key` is acceptable as a partition key.
pub fn validate_partition_key(partition_key: &str) -> DocumentStoreResult<()> {
    if partition_key.is_empty() {
        return Err(DocumentStoreError::Validation("partition key must not be empty".into()));
    }

    Ok(())
}
