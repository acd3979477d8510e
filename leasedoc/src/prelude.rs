//! Convenient re-exports of commonly used types from leasedoc.
//!
//! ```ignore
//! use leasedoc::prelude::*;
//! ```

pub use leasedoc_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    client::{ChangeFeed, DocumentClient, DocumentClientBuilder},
    config::{CollectionConfig, LeasePolicy},
    context::{CancelHandle, Context},
    document::{Document, DocumentExt, VersionToken},
    error::{DocumentStoreError, DocumentStoreResult},
    iterator::{BoxDocumentIterator, DocumentIterator, MaxItemCount, SnapshotIterator},
    options::{ConsistencyHint, Options},
    page::Page,
    query::{QueryDescriptor, QueryHandler},
    store::DocumentStore,
    trigger::Trigger,
};
