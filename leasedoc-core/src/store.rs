//! Entry point tying a backend to typed clients.
//!
//! A [`DocumentStore`] owns one backend and hands out [`DocumentClient`] builders for each
//! document kind. Every client built from the same store shares the backend, but nothing
//! else: triggers, queries, sorters and conflict checks are per client.
//!
//! # Example
//!
//! ```ignore
//! use leasedoc::{prelude::*, memory::InMemoryStore};
//!
//! let store = DocumentStore::new(InMemoryStore::new());
//! let clusters = store.client::<ClusterDocument>().build()?;
//! let billing = store
//!     .client::<BillingDocument>()
//!     .config(CollectionConfig::new("Billing").with_default_pre_trigger("setCreationBillingTimeStamp"))
//!     .trigger("setCreationBillingTimeStamp", stamp_creation)
//!     .build()?;
//! ```

use std::sync::Arc;

use crate::{
    backend::StoreBackend,
    client::{DocumentClient, DocumentClientBuilder},
    document::Document,
    error::DocumentStoreResult,
};

#[derive(Debug, Clone)]
pub struct DocumentStore {
    backend: Arc<dyn StoreBackend>,
}

impl DocumentStore {
    /// Creates a new document store with the given backend.
    pub fn new(backend: impl StoreBackend + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    /// Creates a document store over a backend that is already shared.
    pub fn from_shared(backend: Arc<dyn StoreBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn StoreBackend> {
        &self.backend
    }

    /// Starts building a client for documents of type `D`.
    ///
    /// The collection defaults to `D::collection_name()`.
    pub fn client<D: Document>(&self) -> DocumentClientBuilder<D> {
        DocumentClient::builder(self.backend.clone())
    }

    /// Builds a client for `D` with default configuration and no triggers or queries.
    pub fn default_client<D: Document>(&self) -> DocumentStoreResult<DocumentClient<D>> {
        self.client::<D>().build()
    }
}
