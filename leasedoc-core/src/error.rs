//! Error types and result types for document store operations.
//!
//! Every fallible operation in this crate returns a [`DocumentStoreResult<T>`]. The variants of
//! [`DocumentStoreError`] form the error surface a caller has to handle:
//!
//! - [`DocumentStoreError::NotFound`] - the referenced document is absent
//! - [`DocumentStoreError::Conflict`] - id collision, stale version token, or a secondary
//!   uniqueness violation
//! - [`DocumentStoreError::NotImplemented`] - unregistered trigger or query name, or an
//!   unsupported capability such as the change feed
//! - [`DocumentStoreError::Transport`] - backend or network fault, including injected test faults
//! - [`DocumentStoreError::Validation`] - malformed document, id or partition key

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// HTTP-style status reported for id collisions and secondary uniqueness violations.
pub const STATUS_CONFLICT: u16 = 409;
/// HTTP-style status reported when a version token does not match the stored one.
pub const STATUS_PRECONDITION_FAILED: u16 = 412;

/// Message used for id collisions, matching what the remote store reports.
pub const ALREADY_EXISTS_MESSAGE: &str =
    "Entity with the specified id already exists in the system";

/// Represents all possible errors that can occur when interacting with a document store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentStoreError {
    /// The requested document was not found in the collection.
    #[error("Document {id} not found in collection {collection}")]
    NotFound {
        /// Id of the missing document.
        id: String,
        /// Collection that was searched.
        collection: String,
    },
    /// The write collided with the current state of the store.
    ///
    /// `status_code` is `409` for id or secondary-key collisions and `412` for a stale
    /// or missing version token.
    #[error("Conflict ({status_code}): {message}")]
    Conflict {
        /// HTTP-style status code equivalent.
        status_code: u16,
        /// Human readable reason.
        message: String,
    },
    /// A trigger, query or capability was requested that nothing has been wired to provide.
    #[error("Not implemented: {0}")]
    NotImplemented(String),
    /// An error occurred in the underlying storage backend or its transport.
    #[error("Backend error: {0}")]
    Transport(String),
    /// The document, id or partition key is malformed.
    #[error("Invalid document: {0}")]
    Validation(String),
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// The operation was cancelled or its deadline expired before it could complete.
    #[error("Operation cancelled: {0}")]
    Cancelled(String),
}

impl DocumentStoreError {
    /// Builds a `409` conflict with the given message.
    pub fn conflict(message: impl Into<String>) -> Self {
        DocumentStoreError::Conflict {
            status_code: STATUS_CONFLICT,
            message: message.into(),
        }
    }

    /// Builds the `409` conflict reported when an id is already taken.
    pub fn already_exists() -> Self {
        DocumentStoreError::conflict(ALREADY_EXISTS_MESSAGE)
    }

    /// Builds a `412` conflict, used for version token mismatches.
    pub fn precondition_failed(message: impl Into<String>) -> Self {
        DocumentStoreError::Conflict {
            status_code: STATUS_PRECONDITION_FAILED,
            message: message.into(),
        }
    }

    pub fn not_found(id: impl Into<String>, collection: impl Into<String>) -> Self {
        DocumentStoreError::NotFound {
            id: id.into(),
            collection: collection.into(),
        }
    }

    /// Returns the HTTP-style status code equivalent of this error.
    pub fn status_code(&self) -> u16 {
        match self {
            DocumentStoreError::NotFound { .. } => 404,
            DocumentStoreError::Conflict { status_code, .. } => *status_code,
            DocumentStoreError::NotImplemented(_) => 501,
            DocumentStoreError::Transport(_) => 503,
            DocumentStoreError::Validation(_) => 400,
            DocumentStoreError::Serialization(_) => 500,
            DocumentStoreError::Cancelled(_) => 499,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DocumentStoreError::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, DocumentStoreError::Conflict { .. })
    }

    pub fn is_not_implemented(&self) -> bool {
        matches!(self, DocumentStoreError::NotImplemented(_))
    }
}

/// A specialized `Result` type for document store operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}
