//! Main leasedoc crate providing a typed document-store layer for control-plane state.
//!
//! This crate is the primary entry point for users of leasedoc. It re-exports the core types
//! from `leasedoc-core` and provides access to the bundled storage backends.
//!
//! # Features
//!
//! - **Typed clients** - One generic client per document kind, configured per collection
//! - **Optimistic concurrency** - Version tokens and a lease-based patch with bounded retries
//! - **Pre-commit triggers** - Named hooks that rewrite or veto writes
//! - **Named queries** - Register handlers for the queries your application issues
//! - **Pagination and change feed** - Continuation-driven iterators
//!
//! # Quick Start
//!
//! ```ignore
//! use leasedoc::{prelude::*, memory::InMemoryStore};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct ClusterDocument {
//!     pub id: String,
//!     pub infra_id: Option<String>,
//!     #[serde(rename = "_etag", default, skip_serializing_if = "Option::is_none")]
//!     pub etag: Option<VersionToken>,
//! }
//!
//! impl Document for ClusterDocument {
//!     fn id(&self) -> &str { &self.id }
//!     fn collection_name() -> &'static str { "OpenShiftClusters" }
//!     fn version_token(&self) -> Option<&VersionToken> { self.etag.as_ref() }
//!     fn set_version_token(&mut self, token: VersionToken) { self.etag = Some(token); }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), DocumentStoreError> {
//!     let store = DocumentStore::new(InMemoryStore::builder().build().await?);
//!     let clusters = store.client::<ClusterDocument>().build()?;
//!     let ctx = Context::background();
//!
//!     let cluster = ClusterDocument { id: "cluster-1".into(), infra_id: None, etag: None };
//!     clusters.create(&ctx, "sub-1", &cluster, &Options::default()).await?;
//!
//!     // Any number of workers may run this concurrently.
//!     let patched = clusters
//!         .patch_with_lease(&ctx, "sub-1", "cluster-1", |doc| {
//!             doc.infra_id.get_or_insert_with(|| "cluster-x7k2p".into());
//!             Ok(())
//!         })
//!         .await?;
//!
//!     println!("infra id: {:?}", patched.infra_id);
//!     Ok(())
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing

pub mod prelude;

pub use leasedoc_core::{
    backend, client, config, context, document, error, iterator, lease, options, page, query, store,
    trigger,
};

// Re-exported for implementing query handlers and reading raw pages
pub use async_trait::async_trait;
pub use bson;
pub use serde_json;

/// In-memory storage backend implementations.
pub mod memory {
    pub use leasedoc_memory::{InMemoryStore, InMemoryStoreBuilder};
}
