//! In-memory storage implementation for document stores.
//!
//! Records live in HashMaps keyed by `(partition_key, id)`, one map per collection, behind a
//! single async-aware read-write lock. Every write holds the write lock for its whole
//! check-then-mutate sequence, which is what makes conditional replaces and the secondary
//! conflict probe atomic.

use async_trait::async_trait;
use chrono::Utc;
use mea::rwlock::RwLock;
use std::{collections::HashMap, sync::Arc};

use leasedoc_core::{
    backend::{ChangeBatch, StoreBackend, StoreBackendBuilder, StoredRecord, WriteRecord},
    context::Context,
    document::VersionToken,
    error::{DocumentStoreError, DocumentStoreResult},
};

type RecordKey = (String, String);

#[derive(Debug, Default)]
struct CollectionState {
    records: HashMap<RecordKey, StoredRecord>,
    /// Sequence number of the last write to this collection.
    lsn: u64,
}

impl CollectionState {
    fn next_lsn(&mut self) -> u64 {
        self.lsn += 1;
        self.lsn
    }

    /// Fails with a `409` conflict if `probe` reports a collision with any record other than
    /// the one at `key`.
    fn check_conflicts(&self, key: &RecordKey, record: &WriteRecord<'_>) -> DocumentStoreResult<()> {
        let Some(probe) = record.conflict_probe else {
            return Ok(());
        };

        for (other_key, other) in &self.records {
            if other_key != key && probe(other)? {
                return Err(DocumentStoreError::conflict(format!(
                    "{} conflicts with existing document {}",
                    record.id, other.id
                )));
            }
        }

        Ok(())
    }
}

type StoreMap = HashMap<String, CollectionState>;

fn record_key(partition_key: &str, id: &str) -> RecordKey {
    (partition_key.to_string(), id.to_string())
}

/// Thread-safe in-memory document storage backend.
///
/// `InMemoryStore` is cloneable and uses `Arc`-wrapped internal state, so clones share the
/// same data. Tests typically keep one clone to inject faults while the clients under test
/// own another.
///
/// Listing scans the whole collection; there are no indexes.
#[derive(Clone, Debug)]
pub struct InMemoryStore {
    /// collection name -> records and sequence counter
    store: Arc<RwLock<StoreMap>>,
    /// Error returned by every operation while set
    fault: Arc<RwLock<Option<DocumentStoreError>>>,
    change_feed: bool,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store with the change feed enabled.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
            fault: Arc::new(RwLock::new(None)),
            change_feed: true,
        }
    }

    /// Creates a builder for constructing an `InMemoryStore` with custom options.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use leasedoc_memory::InMemoryStore;
    ///
    /// let store = InMemoryStore::builder().without_change_feed().build().await?;
    /// ```
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Makes every subsequent operation fail with `error`, or restores normal behaviour
    /// when `None`.
    pub async fn set_error(&self, error: Option<DocumentStoreError>) {
        if let Some(err) = &error {
            tracing::debug!(error = %err, "injecting store fault");
        }

        *self.fault.write().await = error;
    }

    pub async fn clear_error(&self) {
        self.set_error(None).await;
    }

    /// Number of records currently stored in `collection`.
    pub async fn len(&self, collection: &str) -> usize {
        self.store
            .read()
            .await
            .get(collection)
            .map_or(0, |state| state.records.len())
    }

    pub async fn is_empty(&self, collection: &str) -> bool {
        self.len(collection).await == 0
    }

    /// Checks the context and the injected fault before an operation touches the store.
    async fn admit(&self, ctx: &Context) -> DocumentStoreResult<()> {
        ctx.check()?;

        match self.fault.read().await.as_ref() {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn create_record(
        &self,
        ctx: &Context,
        collection: &str,
        record: WriteRecord<'_>,
    ) -> DocumentStoreResult<StoredRecord> {
        self.admit(ctx).await?;

        let mut store = ctx.guard(self.store.write()).await?;
        ctx.check()?;

        let state = store.entry(collection.to_string()).or_default();
        let key = record_key(record.partition_key, record.id);

        if state.records.contains_key(&key) {
            return Err(DocumentStoreError::already_exists());
        }

        state.check_conflicts(&key, &record)?;

        let stored = StoredRecord {
            id: record.id.to_string(),
            partition_key: record.partition_key.to_string(),
            version: VersionToken::generate(),
            lsn: state.next_lsn(),
            modified_at: Utc::now(),
            body: record.body,
        };

        state.records.insert(key, stored.clone());
        tracing::trace!(collection, id = %stored.id, lsn = stored.lsn, "stored new record");

        Ok(stored)
    }

    async fn replace_record(
        &self,
        ctx: &Context,
        collection: &str,
        record: WriteRecord<'_>,
        expected: &VersionToken,
    ) -> DocumentStoreResult<StoredRecord> {
        self.admit(ctx).await?;

        let mut store = ctx.guard(self.store.write()).await?;
        ctx.check()?;

        let state = store
            .get_mut(collection)
            .ok_or_else(|| DocumentStoreError::not_found(record.id, collection))?;
        let key = record_key(record.partition_key, record.id);

        let current = state
            .records
            .get(&key)
            .ok_or_else(|| DocumentStoreError::not_found(record.id, collection))?;

        if &current.version != expected {
            return Err(DocumentStoreError::precondition_failed(format!(
                "version token {expected} of {} is stale",
                record.id
            )));
        }

        state.check_conflicts(&key, &record)?;

        let stored = StoredRecord {
            id: record.id.to_string(),
            partition_key: record.partition_key.to_string(),
            version: VersionToken::generate(),
            lsn: state.next_lsn(),
            modified_at: Utc::now(),
            body: record.body,
        };

        state.records.insert(key, stored.clone());
        tracing::trace!(collection, id = %stored.id, lsn = stored.lsn, "replaced record");

        Ok(stored)
    }

    async fn get_record(
        &self,
        ctx: &Context,
        collection: &str,
        partition_key: &str,
        id: &str,
    ) -> DocumentStoreResult<StoredRecord> {
        self.admit(ctx).await?;

        let store = ctx.guard(self.store.read()).await?;

        store
            .get(collection)
            .and_then(|state| state.records.get(&record_key(partition_key, id)))
            .cloned()
            .ok_or_else(|| DocumentStoreError::not_found(id, collection))
    }

    async fn delete_record(
        &self,
        ctx: &Context,
        collection: &str,
        partition_key: &str,
        id: &str,
        expected: Option<&VersionToken>,
    ) -> DocumentStoreResult<()> {
        self.admit(ctx).await?;

        let mut store = ctx.guard(self.store.write()).await?;
        ctx.check()?;

        let key = record_key(partition_key, id);
        let state = store
            .get_mut(collection)
            .filter(|state| state.records.contains_key(&key))
            .ok_or_else(|| DocumentStoreError::not_found(id, collection))?;

        if let Some(expected) = expected {
            if state.records.get(&key).is_some_and(|current| &current.version != expected) {
                return Err(DocumentStoreError::precondition_failed(format!(
                    "version token {expected} of {id} is stale"
                )));
            }
        }

        state.records.remove(&key);
        state.next_lsn();
        tracing::trace!(collection, id, "deleted record");

        Ok(())
    }

    async fn list_records(
        &self,
        ctx: &Context,
        collection: &str,
        partition_key: Option<&str>,
    ) -> DocumentStoreResult<Vec<StoredRecord>> {
        self.admit(ctx).await?;

        let store = ctx.guard(self.store.read()).await?;
        let Some(state) = store.get(collection) else {
            return Ok(vec![]);
        };

        Ok(state
            .records
            .values()
            .filter(|record| partition_key.is_none_or(|pk| record.partition_key == pk))
            .cloned()
            .collect())
    }

    async fn read_change_feed(
        &self,
        ctx: &Context,
        collection: &str,
        since: Option<u64>,
    ) -> DocumentStoreResult<ChangeBatch> {
        self.admit(ctx).await?;

        if !self.change_feed {
            return Err(DocumentStoreError::NotImplemented(format!(
                "change feed for {collection} is disabled"
            )));
        }

        let store = ctx.guard(self.store.read()).await?;
        let since = since.unwrap_or(0);

        let Some(state) = store.get(collection) else {
            return Ok(ChangeBatch {
                records: vec![],
                checkpoint: since,
            });
        };

        let mut records = state
            .records
            .values()
            .filter(|record| record.lsn > since)
            .cloned()
            .collect::<Vec<_>>();
        records.sort_by_key(|record| record.lsn);

        Ok(ChangeBatch {
            records,
            checkpoint: state.lsn.max(since),
        })
    }
}

/// Builder for [`InMemoryStore`].
#[derive(Debug, Clone)]
pub struct InMemoryStoreBuilder {
    change_feed: bool,
}

impl Default for InMemoryStoreBuilder {
    fn default() -> Self {
        Self { change_feed: true }
    }
}

impl InMemoryStoreBuilder {
    /// Builds a store whose change feed reports not-implemented, like a backend without one.
    pub fn without_change_feed(mut self) -> Self {
        self.change_feed = false;
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(InMemoryStore {
            change_feed: self.change_feed,
            ..InMemoryStore::new()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{Bson, doc};

    const COLLECTION: &str = "clusters";

    fn body(n: i32) -> Bson {
        Bson::Document(doc! { "id": "a", "n": n })
    }

    async fn seeded() -> (InMemoryStore, StoredRecord) {
        let store = InMemoryStore::new();
        let stored = store
            .create_record(&Context::background(), COLLECTION, WriteRecord::new("pk", "a", body(1)))
            .await
            .unwrap();
        (store, stored)
    }

    #[tokio::test]
    async fn create_rejects_duplicate_ids_within_a_partition() {
        let (store, first) = seeded().await;
        let ctx = Context::background();

        let err = store
            .create_record(&ctx, COLLECTION, WriteRecord::new("pk", "a", body(2)))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 409);

        let current = store.get_record(&ctx, COLLECTION, "pk", "a").await.unwrap();
        assert_eq!(current, first);

        store
            .create_record(&ctx, COLLECTION, WriteRecord::new("other", "a", body(3)))
            .await
            .unwrap();
        assert_eq!(store.len(COLLECTION).await, 2);
    }

    #[tokio::test]
    async fn replace_requires_the_current_token() {
        let (store, first) = seeded().await;
        let ctx = Context::background();

        let second = store
            .replace_record(&ctx, COLLECTION, WriteRecord::new("pk", "a", body(2)), &first.version)
            .await
            .unwrap();
        assert_ne!(second.version, first.version);
        assert!(second.lsn > first.lsn);

        let err = store
            .replace_record(&ctx, COLLECTION, WriteRecord::new("pk", "a", body(3)), &first.version)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 412);

        let current = store.get_record(&ctx, COLLECTION, "pk", "a").await.unwrap();
        assert_eq!(current.body, body(2));
    }

    #[tokio::test]
    async fn replace_of_missing_record_is_not_found() {
        let (store, first) = seeded().await;

        let err = store
            .replace_record(
                &Context::background(),
                COLLECTION,
                WriteRecord::new("pk", "b", body(2)),
                &first.version,
            )
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn conflict_probe_skips_the_record_being_replaced() {
        let (store, first) = seeded().await;
        let ctx = Context::background();
        let collides = |_: &StoredRecord| -> DocumentStoreResult<bool> { Ok(true) };

        let replaced = store
            .replace_record(
                &ctx,
                COLLECTION,
                WriteRecord::new("pk", "a", body(2)).with_conflict_probe(Some(&collides)),
                &first.version,
            )
            .await;
        assert!(replaced.is_ok());

        let err = store
            .create_record(
                &ctx,
                COLLECTION,
                WriteRecord::new("pk", "b", body(1)).with_conflict_probe(Some(&collides)),
            )
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 409);
        assert_eq!(store.len(COLLECTION).await, 1);
    }

    #[tokio::test]
    async fn delete_checks_token_only_when_given() {
        let (store, first) = seeded().await;
        let ctx = Context::background();

        store
            .replace_record(&ctx, COLLECTION, WriteRecord::new("pk", "a", body(2)), &first.version)
            .await
            .unwrap();

        let err = store
            .delete_record(&ctx, COLLECTION, "pk", "a", Some(&first.version))
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        store.delete_record(&ctx, COLLECTION, "pk", "a", None).await.unwrap();
        assert!(store.is_empty(COLLECTION).await);

        let err = store.delete_record(&ctx, COLLECTION, "pk", "a", None).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn injected_fault_fails_every_operation_until_cleared() {
        let (store, _) = seeded().await;
        let ctx = Context::background();
        let fault = DocumentStoreError::Transport("connection reset".into());

        store.set_error(Some(fault.clone())).await;
        assert_eq!(store.get_record(&ctx, COLLECTION, "pk", "a").await.unwrap_err(), fault);
        assert_eq!(store.list_records(&ctx, COLLECTION, None).await.unwrap_err(), fault);
        assert_eq!(
            store
                .create_record(&ctx, COLLECTION, WriteRecord::new("pk", "b", body(1)))
                .await
                .unwrap_err(),
            fault
        );

        store.clear_error().await;
        assert!(store.get_record(&ctx, COLLECTION, "pk", "a").await.is_ok());
        assert_eq!(store.len(COLLECTION).await, 1);
    }

    #[tokio::test]
    async fn change_feed_returns_latest_versions_in_write_order() {
        let store = InMemoryStore::new();
        let ctx = Context::background();

        let a = store
            .create_record(&ctx, COLLECTION, WriteRecord::new("pk", "a", body(1)))
            .await
            .unwrap();
        store
            .create_record(&ctx, COLLECTION, WriteRecord::new("pk", "b", body(1)))
            .await
            .unwrap();

        let first = store.read_change_feed(&ctx, COLLECTION, None).await.unwrap();
        assert_eq!(first.records.len(), 2);
        assert_eq!(first.records[0].id, "a");

        store
            .replace_record(&ctx, COLLECTION, WriteRecord::new("pk", "a", body(2)), &a.version)
            .await
            .unwrap();

        let second = store
            .read_change_feed(&ctx, COLLECTION, Some(first.checkpoint))
            .await
            .unwrap();
        assert_eq!(second.records.len(), 1);
        assert_eq!(second.records[0].body, body(2));
        assert!(second.checkpoint > first.checkpoint);

        let empty = store
            .read_change_feed(&ctx, COLLECTION, Some(second.checkpoint))
            .await
            .unwrap();
        assert!(empty.records.is_empty());
        assert_eq!(empty.checkpoint, second.checkpoint);
    }

    #[tokio::test]
    async fn disabled_change_feed_is_not_implemented() {
        let store = InMemoryStore::builder().without_change_feed().build().await.unwrap();

        let err = store
            .read_change_feed(&Context::background(), COLLECTION, None)
            .await
            .unwrap_err();
        assert!(err.is_not_implemented());
    }

    #[tokio::test]
    async fn cancelled_context_leaves_store_untouched() {
        let store = InMemoryStore::new();
        let ctx = Context::background();
        ctx.cancel_handle().cancel();

        let err = store
            .create_record(&ctx, COLLECTION, WriteRecord::new("pk", "a", body(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentStoreError::Cancelled(_)));
        assert!(store.is_empty(COLLECTION).await);
    }
}
