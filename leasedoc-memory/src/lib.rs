//! In-memory storage backend for leasedoc.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait,
//! intended as the test double for code written against the remote document store. It keeps
//! the contract that matters for correctness under concurrency: conditional replaces on
//! version tokens, atomic secondary-uniqueness checks and a change feed.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using an async-aware RwLock
//! - **Type-erased storage** - Stores documents as BSON, addressed by partition key and id
//! - **Version tokens** - Every write assigns a fresh token; replaces compare against it
//! - **Change feed** - Per-collection sequence numbers, can be switched off
//! - **Fault injection** - Make every operation fail with a chosen error
//!
//! # Quick Start
//!
//! ```ignore
//! use leasedoc::{prelude::*, memory::InMemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = InMemoryStore::builder().build().await?;
//!     let store = DocumentStore::new(backend.clone());
//!     let clusters = store.client::<ClusterDocument>().build()?;
//!
//!     backend.set_error(Some(DocumentStoreError::Transport("injected".into()))).await;
//!     assert!(clusters.list_all(&Context::background(), &Options::default()).await.is_err());
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as leasedoc_memory;

pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
