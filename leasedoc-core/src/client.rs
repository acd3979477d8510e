//! Typed client for one document kind.
//!
//! A [`DocumentClient<D>`] is the per-entity surface application code talks to. It wraps a
//! shared [`StoreBackend`] with everything that is specific to the document type: encoding,
//! the trigger pipeline, named queries, the optional test sorter and the optional secondary
//! uniqueness check. One generic implementation serves every document kind; the per-kind
//! differences live in a [`CollectionConfig`].
//!
//! # Example
//!
//! ```ignore
//! use leasedoc::{prelude::*, memory::InMemoryStore};
//!
//! let store = DocumentStore::new(InMemoryStore::new());
//! let clusters = store
//!     .client::<ClusterDocument>()
//!     .trigger("renewLease", |doc: &mut ClusterDocument| -> DocumentStoreResult<()> {
//!         doc.lease_renewals += 1;
//!         Ok(())
//!     })
//!     .build()?;
//!
//! let ctx = Context::background();
//! let stored = clusters.create(&ctx, "sub-1", &cluster, &Options::default()).await?;
//! let fetched = clusters.get(&ctx, "sub-1", stored.id(), &Options::default()).await?;
//! ```

use std::{fmt, sync::Arc};

use crate::{
    backend::{StoreBackend, StoredRecord, WriteRecord},
    config::CollectionConfig,
    context::Context,
    document::{Document, DocumentExt, validate_id, validate_partition_key},
    error::{DocumentStoreError, DocumentStoreResult},
    iterator::{BoxDocumentIterator, SnapshotIterator},
    options::Options,
    query::{QueryDescriptor, QueryHandler, QueryRegistry},
    trigger::{Trigger, TriggerRegistry},
};

/// Orders listed documents, for tests that need deterministic pages.
pub type Sorter<D> = Arc<dyn Fn(&mut [D]) + Send + Sync>;

/// Returns `true` when `existing` and `candidate` collide on a secondary unique key.
pub type ConflictChecker<D> = Arc<dyn Fn(&D, &D) -> bool + Send + Sync>;

/// Documents written after a checkpoint, plus the checkpoint to resume from next time.
pub struct ChangeFeed<D: Document> {
    pub documents: BoxDocumentIterator<D>,
    pub checkpoint: String,
}

struct ClientInner<D: Document> {
    backend: Arc<dyn StoreBackend>,
    config: CollectionConfig,
    triggers: TriggerRegistry<D>,
    queries: QueryRegistry<D>,
    sorter: Option<Sorter<D>>,
    conflict_checker: Option<ConflictChecker<D>>,
}

/// Typed CRUD, listing, query and change-feed access to one collection.
///
/// Cloning is cheap; clones share the backend, configuration and registries.
pub struct DocumentClient<D: Document> {
    inner: Arc<ClientInner<D>>,
}

impl<D: Document> Clone for DocumentClient<D> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<D: Document> fmt::Debug for DocumentClient<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentClient")
            .field("config", &self.inner.config)
            .field("triggers", &self.inner.triggers)
            .field("queries", &self.inner.queries)
            .field("sorter", &self.inner.sorter.is_some())
            .field("conflict_checker", &self.inner.conflict_checker.is_some())
            .finish()
    }
}

impl<D: Document> DocumentClient<D> {
    pub fn builder(backend: Arc<dyn StoreBackend>) -> DocumentClientBuilder<D> {
        DocumentClientBuilder::new(backend)
    }

    /// Returns the name of the collection this client reads and writes.
    pub fn collection(&self) -> &str {
        &self.inner.config.name
    }

    pub fn config(&self) -> &CollectionConfig {
        &self.inner.config
    }

    pub fn backend(&self) -> &Arc<dyn StoreBackend> {
        &self.inner.backend
    }

    /// Creates a document.
    ///
    /// # Errors
    ///
    /// A `409` [`DocumentStoreError::Conflict`] if the id already exists in the partition or the
    /// secondary conflict check matches another document.
    pub async fn create(
        &self,
        ctx: &Context,
        partition_key: &str,
        document: &D,
        options: &Options,
    ) -> DocumentStoreResult<D> {
        let prepared = self.prepare(ctx, partition_key, document, options).await?;
        let probe = self.conflict_probe(&prepared);
        let record = WriteRecord::new(partition_key, prepared.id(), prepared.to_bson()?)
            .with_conflict_probe(probe.as_deref());

        let stored = self
            .inner
            .backend
            .create_record(ctx, self.collection(), record)
            .await?;

        tracing::trace!(collection = self.collection(), partition_key, id = %stored.id, version = %stored.version, "created document");

        self.decode(stored)
    }

    /// Replaces a document, provided nobody else wrote it since `document` was read.
    ///
    /// The version token carried by `document` is compared with the stored one; a missing
    /// token never matches.
    ///
    /// # Errors
    ///
    /// [`DocumentStoreError::NotFound`] if the document is absent, a `412` conflict if the token
    /// is missing or stale, a `409` conflict if the secondary conflict check matches.
    pub async fn replace(
        &self,
        ctx: &Context,
        partition_key: &str,
        document: &D,
        options: &Options,
    ) -> DocumentStoreResult<D> {
        let expected = document.version_token().cloned().ok_or_else(|| {
            DocumentStoreError::precondition_failed(format!(
                "replace of {} in {} requires the version token of a previous read",
                document.id(),
                self.collection()
            ))
        })?;

        let prepared = self.prepare(ctx, partition_key, document, options).await?;
        let probe = self.conflict_probe(&prepared);
        let record = WriteRecord::new(partition_key, prepared.id(), prepared.to_bson()?)
            .with_conflict_probe(probe.as_deref());

        let stored = self
            .inner
            .backend
            .replace_record(ctx, self.collection(), record, &expected)
            .await?;

        tracing::trace!(collection = self.collection(), partition_key, id = %stored.id, version = %stored.version, "replaced document");

        self.decode(stored)
    }

    pub async fn get(
        &self,
        ctx: &Context,
        partition_key: &str,
        id: &str,
        _options: &Options,
    ) -> DocumentStoreResult<D> {
        ctx.check()?;
        validate_partition_key(partition_key)?;
        validate_id(id)?;

        let stored = self
            .inner
            .backend
            .get_record(ctx, self.collection(), partition_key, id)
            .await?;

        self.decode(stored)
    }

    /// Deletes a document.
    ///
    /// Triggers run against a copy and may veto the delete. If `document` carries a version
    /// token it must still be current.
    pub async fn delete(
        &self,
        ctx: &Context,
        partition_key: &str,
        document: &D,
        options: &Options,
    ) -> DocumentStoreResult<()> {
        let prepared = self.prepare(ctx, partition_key, document, options).await?;

        self.inner
            .backend
            .delete_record(
                ctx,
                self.collection(),
                partition_key,
                prepared.id(),
                document.version_token(),
            )
            .await?;

        tracing::trace!(collection = self.collection(), partition_key, id = prepared.id(), "deleted document");

        Ok(())
    }

    /// Lists the documents in `options.partition_key`, or the whole collection.
    ///
    /// The sequence is captured when this call returns. Its order is unspecified unless a
    /// sorter was installed. `options.continuation` resumes at a cursor returned by an earlier
    /// page.
    pub async fn list(&self, ctx: &Context, options: &Options) -> DocumentStoreResult<BoxDocumentIterator<D>> {
        ctx.check()?;

        if let Some(partition_key) = options.partition_key.as_deref() {
            validate_partition_key(partition_key)?;
        }

        let records = self
            .inner
            .backend
            .list_records(ctx, self.collection(), options.partition_key.as_deref())
            .await?;

        let mut documents = records
            .into_iter()
            .map(|record| self.decode(record))
            .collect::<DocumentStoreResult<Vec<D>>>()?;

        if let Some(sorter) = &self.inner.sorter {
            sorter(documents.as_mut_slice());
        }

        Ok(Box::new(SnapshotIterator::from_continuation(
            documents,
            options.continuation.as_deref(),
        )?))
    }

    /// Lists and drains in one call.
    pub async fn list_all(&self, ctx: &Context, options: &Options) -> DocumentStoreResult<Vec<D>> {
        self.list(ctx, options).await?.drain(ctx).await
    }

    /// Reads the documents written after the checkpoint in `options.continuation`.
    ///
    /// # Errors
    ///
    /// [`DocumentStoreError::NotImplemented`] when the backend has no change feed.
    pub async fn change_feed(&self, ctx: &Context, options: &Options) -> DocumentStoreResult<ChangeFeed<D>> {
        ctx.check()?;

        let since = options
            .continuation
            .as_deref()
            .map(|token| {
                token.parse::<u64>().map_err(|_| {
                    DocumentStoreError::Validation(format!("malformed change feed checkpoint {token:?}"))
                })
            })
            .transpose()?;

        let batch = self
            .inner
            .backend
            .read_change_feed(ctx, self.collection(), since)
            .await?;

        let documents = batch
            .records
            .into_iter()
            .filter(|record| match options.partition_key.as_deref() {
                Some(partition_key) => record.partition_key == partition_key,
                None => true,
            })
            .map(|record| self.decode(record))
            .collect::<DocumentStoreResult<Vec<D>>>()?;

        Ok(ChangeFeed {
            documents: Box::new(SnapshotIterator::new(documents)),
            checkpoint: batch.checkpoint.to_string(),
        })
    }

    /// Runs the query registered under `name`.
    ///
    /// # Errors
    ///
    /// [`DocumentStoreError::NotImplemented`] if no handler is registered under `name`.
    pub async fn query(
        &self,
        ctx: &Context,
        name: &str,
        query: &QueryDescriptor,
        options: &Options,
    ) -> DocumentStoreResult<BoxDocumentIterator<D>> {
        ctx.check()?;

        let handler = self.inner.queries.resolve(name)?;
        handler.execute(ctx, self, query, options).await
    }

    /// Runs a query and drains its results.
    pub async fn query_all(
        &self,
        ctx: &Context,
        name: &str,
        query: &QueryDescriptor,
        options: &Options,
    ) -> DocumentStoreResult<Vec<D>> {
        self.query(ctx, name, query, options)
            .await?
            .drain(ctx)
            .await
    }

    /// Validates the addressing of `document` and runs the trigger pipeline on a copy.
    async fn prepare(
        &self,
        ctx: &Context,
        partition_key: &str,
        document: &D,
        options: &Options,
    ) -> DocumentStoreResult<D> {
        ctx.check()?;
        validate_partition_key(partition_key)?;
        validate_id(document.id())?;

        let mut prepared = document.clone();
        let names = self
            .inner
            .config
            .default_pre_triggers
            .iter()
            .chain(options.pre_triggers.iter())
            .map(String::as_str);

        self.inner
            .triggers
            .run(ctx, names, &mut prepared)
            .await?;

        if prepared.id() != document.id() {
            return Err(DocumentStoreError::Validation(format!(
                "pre-triggers changed document id from {} to {}",
                document.id(),
                prepared.id()
            )));
        }

        Ok(prepared)
    }

    fn conflict_probe<'a>(
        &'a self,
        candidate: &'a D,
    ) -> Option<Box<dyn Fn(&StoredRecord) -> DocumentStoreResult<bool> + Send + Sync + 'a>> {
        let checker = self.inner.conflict_checker.as_ref()?;

        Some(Box::new(move |record: &StoredRecord| -> DocumentStoreResult<bool> {
            let mut existing = D::from_bson(record.body.clone())?;
            existing.set_version_token(record.version.clone());
            existing.set_modified_at(record.modified_at);
            Ok(checker(&existing, candidate))
        }))
    }

    fn decode(&self, record: StoredRecord) -> DocumentStoreResult<D> {
        let mut document = D::from_bson(record.body)?;
        document.set_version_token(record.version);
        document.set_modified_at(record.modified_at);

        Ok(document)
    }
}

/// Builder for [`DocumentClient`].
///
/// Triggers, query handlers, the sorter and the conflict checker are fixed at construction,
/// so independently configured clients never see each other's wiring.
pub struct DocumentClientBuilder<D: Document> {
    backend: Arc<dyn StoreBackend>,
    config: CollectionConfig,
    triggers: TriggerRegistry<D>,
    queries: QueryRegistry<D>,
    sorter: Option<Sorter<D>>,
    conflict_checker: Option<ConflictChecker<D>>,
}

impl<D: Document> DocumentClientBuilder<D> {
    pub fn new(backend: Arc<dyn StoreBackend>) -> Self {
        Self {
            backend,
            config: CollectionConfig::for_document::<D>(),
            triggers: TriggerRegistry::new(),
            queries: QueryRegistry::new(),
            sorter: None,
            conflict_checker: None,
        }
    }

    /// Replaces the default configuration derived from `D::collection_name()`.
    pub fn config(mut self, config: CollectionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn trigger(mut self, name: impl Into<String>, trigger: impl Trigger<D> + 'static) -> Self {
        self.triggers.register(name, trigger);
        self
    }

    pub fn query(mut self, name: impl Into<String>, handler: impl QueryHandler<D> + 'static) -> Self {
        self.queries.register(name, handler);
        self
    }

    pub fn sorter<F>(mut self, sorter: F) -> Self
    where
        F: Fn(&mut [D]) + Send + Sync + 'static,
    {
        self.sorter = Some(Arc::new(sorter));
        self
    }

    /// Installs a secondary uniqueness check, called as `checker(existing, candidate)`.
    pub fn conflict_checker<F>(mut self, checker: F) -> Self
    where
        F: Fn(&D, &D) -> bool + Send + Sync + 'static,
    {
        self.conflict_checker = Some(Arc::new(checker));
        self
    }

    pub fn build(self) -> DocumentStoreResult<DocumentClient<D>> {
        self.config.validate()?;

        tracing::debug!(
            collection = %self.config.name,
            default_pre_triggers = ?self.config.default_pre_triggers,
            "built document client"
        );

        Ok(DocumentClient {
            inner: Arc::new(ClientInner {
                backend: self.backend,
                config: self.config,
                triggers: self.triggers,
                queries: self.queries,
                sorter: self.sorter,
                conflict_checker: self.conflict_checker,
            }),
        })
    }
}
