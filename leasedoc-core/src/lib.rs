//! Typed document-store layer for control-plane state.
//!
//! This crate is the core of the leasedoc project and provides:
//!
//! - **Documents** ([`document`]) - the trait every stored type implements, and version tokens
//! - **Backend abstraction** ([`backend`]) - the untyped storage contract backends implement
//! - **Typed clients** ([`client`]) - per-kind CRUD, listing, queries and change feed
//! - **Lease-based patching** ([`lease`]) - optimistic read-modify-write with bounded retries
//! - **Triggers** ([`trigger`]) - named pre-commit hooks
//! - **Query dispatch** ([`query`]) - named query handlers
//! - **Iterators** ([`iterator`], [`page`]) - paginated result sequences with continuations
//! - **Configuration** ([`config`], [`options`]) - per-collection and per-call settings
//! - **Cancellation** ([`context`]) - deadlines and cancellation for every operation
//! - **Error handling** ([`error`]) - error types and result types
//! - **Document store** ([`store`]) - ties a backend to typed clients
//!
//! # Example
//!
//! ```ignore
//! use leasedoc::prelude::*;
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
//! let updated = clusters
//!     .patch_with_lease(&ctx, "sub-1", "cluster-1", |doc| {
//!         doc.infra_id = Some("abc-x7k2p".into());
//!         Ok(())
//!     })
//!     .await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as leasedoc_core;

pub mod backend;
pub mod client;
pub mod config;
pub mod context;
pub mod document;
pub mod error;
pub mod iterator;
pub mod lease;
pub mod options;
pub mod page;
pub mod query;
pub mod store;
pub mod trigger;
