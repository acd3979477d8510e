//! Named query dispatch.
//!
//! The remote store runs a declarative query engine that an in-memory backend cannot
//! reproduce in general. Instead, each logical query the application issues is registered
//! under a stable name together with a [`QueryHandler`] that produces its results. Asking for
//! a name nobody registered fails with [`DocumentStoreError::NotImplemented`] rather than
//! returning an empty result.
//!
//! # Example
//!
//! ```ignore
//! struct ByProvisioningState;
//!
//! #[async_trait]
//! impl QueryHandler<ClusterDocument> for ByProvisioningState {
//!     async fn execute(
//!         &self,
//!         ctx: &Context,
//!         client: &DocumentClient<ClusterDocument>,
//!         query: &QueryDescriptor,
//!         options: &Options,
//!     ) -> DocumentStoreResult<BoxDocumentIterator<ClusterDocument>> {
//!         let state: String = query.parameter("@state")?;
//!         let matching = client
//!             .list_all(ctx, options)
//!             .await?
//!             .into_iter()
//!             .filter(|doc| doc.provisioning_state == state)
//!             .collect();
//!         Ok(Box::new(SnapshotIterator::new(matching)))
//!     }
//! }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::{collections::HashMap, fmt, sync::Arc};

use crate::{
    client::DocumentClient,
    context::Context,
    document::Document,
    error::{DocumentStoreError, DocumentStoreResult},
    iterator::BoxDocumentIterator,
    options::Options,
};

/// A named query parameter, e.g. `@state`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct QueryParameter {
    pub name: String,
    pub value: Value,
}

/// Query text plus parameters, as sent to the remote store.
///
/// Handlers read parameters back with [`QueryDescriptor::parameter`].
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct QueryDescriptor {
    #[serde(rename = "query")]
    pub text: String,
    #[serde(default)]
    pub parameters: Vec<QueryParameter>,
}

impl QueryDescriptor {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parameters: Vec::new(),
        }
    }

    /// Adds a parameter, serializing `value` to JSON.
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Serialize) -> DocumentStoreResult<Self> {
        self.parameters.push(QueryParameter {
            name: name.into(),
            value: serde_json::to_value(value)?,
        });

        Ok(self)
    }

    pub fn raw_parameter(&self, name: &str) -> Option<&Value> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }

    /// Reads a parameter back into `T`.
    ///
    /// # Errors
    ///
    /// [`DocumentStoreError::Validation`] if the parameter is missing, a serialization error if
    /// it does not decode as `T`.
    pub fn parameter<T: DeserializeOwned>(&self, name: &str) -> DocumentStoreResult<T> {
        let value = self.raw_parameter(name).ok_or_else(|| {
            DocumentStoreError::Validation(format!("query parameter {name} is missing"))
        })?;

        Ok(serde_json::from_value(value.clone())?)
    }
}

/// Produces the results of one logical query.
#[async_trait]
pub trait QueryHandler<D: Document>: Send + Sync {
    async fn execute(
        &self,
        ctx: &Context,
        client: &DocumentClient<D>,
        query: &QueryDescriptor,
        options: &Options,
    ) -> DocumentStoreResult<BoxDocumentIterator<D>>;
}

/// Exact-name lookup table of query handlers, owned by a single client.
pub struct QueryRegistry<D: Document> {
    handlers: HashMap<String, Arc<dyn QueryHandler<D>>>,
}

impl<D: Document> QueryRegistry<D> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registers `handler` under `name`, replacing any previous registration.
    pub fn register(&mut self, name: impl Into<String>, handler: impl QueryHandler<D> + 'static) {
        self.handlers.insert(name.into(), Arc::new(handler));
    }

    pub fn unregister(&mut self, name: &str) -> bool {
        self.handlers.remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Resolves `name` to its handler.
    pub fn resolve(&self, name: &str) -> DocumentStoreResult<Arc<dyn QueryHandler<D>>> {
        self.handlers.get(name).cloned().ok_or_else(|| {
            DocumentStoreError::NotImplemented(format!(
                "query {name:?} is not registered for {}",
                D::collection_name()
            ))
        })
    }
}

impl<D: Document> Default for QueryRegistry<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Document> fmt::Debug for QueryRegistry<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryRegistry")
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
