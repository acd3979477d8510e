//! Storage backend abstraction for the document store.
//!
//! A [`StoreBackend`] stores untyped records: a BSON body addressed by collection, partition
//! key and id, together with the system properties the store assigns on every write (version
//! token, change sequence number, modification time). Typed access, triggers, query dispatch
//! and the lease loop all live above this trait in [`DocumentClient`](crate::client::DocumentClient),
//! so a backend only has to get the storage contract right:
//!
//! - `create_record` fails with a `409` conflict if `(partition_key, id)` already exists
//! - `replace_record` fails with not-found if the record is absent and with a `412` conflict
//!   unless the expected token equals the stored one
//! - the optional [`ConflictProbe`] is evaluated against every *other* record of the collection
//!   and vetoes the write with a `409` conflict when it reports a collision
//! - every write is atomic: either the new record is fully visible or nothing changed
//!
//! # Thread Safety
//!
//! Implementations are shared between any number of concurrent callers. Whatever exclusion
//! they use internally must cover only bookkeeping, never network-bound work.

use async_trait::async_trait;
use bson::Bson;
use chrono::{DateTime, Utc};
use std::{fmt::Debug, sync::Arc};

use crate::{
    context::Context,
    document::VersionToken,
    error::{DocumentStoreError, DocumentStoreResult},
};

/// A record as held by the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub id: String,
    pub partition_key: String,
    /// Token assigned by the write that produced this record.
    pub version: VersionToken,
    /// Collection-wide change sequence number of that write.
    pub lsn: u64,
    pub modified_at: DateTime<Utc>,
    pub body: Bson,
}

/// Secondary uniqueness check, called with each other stored record of the collection.
///
/// Returns `Ok(true)` if the record collides with the one being written.
pub type ConflictProbe<'a> = &'a (dyn Fn(&StoredRecord) -> DocumentStoreResult<bool> + Send + Sync + 'a);

/// A record about to be written.
pub struct WriteRecord<'a> {
    pub partition_key: &'a str,
    pub id: &'a str,
    pub body: Bson,
    pub conflict_probe: Option<ConflictProbe<'a>>,
}

impl<'a> WriteRecord<'a> {
    pub fn new(partition_key: &'a str, id: &'a str, body: Bson) -> Self {
        Self {
            partition_key,
            id,
            body,
            conflict_probe: None,
        }
    }

    pub fn with_conflict_probe(mut self, probe: Option<ConflictProbe<'a>>) -> Self {
        self.conflict_probe = probe;
        self
    }
}

/// Records changed after a checkpoint, oldest change first.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeBatch {
    pub records: Vec<StoredRecord>,
    /// Checkpoint to pass as `since` to read only later changes.
    pub checkpoint: u64,
}

#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Stores a new record.
    async fn create_record(
        &self,
        ctx: &Context,
        collection: &str,
        record: WriteRecord<'_>,
    ) -> DocumentStoreResult<StoredRecord>;

    /// Overwrites an existing record if its current version is `expected`.
    async fn replace_record(
        &self,
        ctx: &Context,
        collection: &str,
        record: WriteRecord<'_>,
        expected: &VersionToken,
    ) -> DocumentStoreResult<StoredRecord>;

    async fn get_record(
        &self,
        ctx: &Context,
        collection: &str,
        partition_key: &str,
        id: &str,
    ) -> DocumentStoreResult<StoredRecord>;

    /// Removes a record. When `expected` is given the stored version must match it.
    async fn delete_record(
        &self,
        ctx: &Context,
        collection: &str,
        partition_key: &str,
        id: &str,
        expected: Option<&VersionToken>,
    ) -> DocumentStoreResult<()>;

    /// Returns every record of the collection, or of one partition, in no particular order.
    async fn list_records(
        &self,
        ctx: &Context,
        collection: &str,
        partition_key: Option<&str>,
    ) -> DocumentStoreResult<Vec<StoredRecord>>;

    /// Returns the latest version of every record written after `since`.
    ///
    /// Backends without a change feed keep the default, which reports
    /// [`DocumentStoreError::NotImplemented`].
    async fn read_change_feed(
        &self,
        ctx: &Context,
        collection: &str,
        _since: Option<u64>,
    ) -> DocumentStoreResult<ChangeBatch> {
        ctx.check()?;

        Err(DocumentStoreError::NotImplemented(format!(
            "change feed for {collection}"
        )))
    }
}

#[async_trait]
impl<B> StoreBackend for Arc<B>
where
    B: StoreBackend + ?Sized,
{
    async fn create_record(
        &self,
        ctx: &Context,
        collection: &str,
        record: WriteRecord<'_>,
    ) -> DocumentStoreResult<StoredRecord> {
        (**self).create_record(ctx, collection, record).await
    }

    async fn replace_record(
        &self,
        ctx: &Context,
        collection: &str,
        record: WriteRecord<'_>,
        expected: &VersionToken,
    ) -> DocumentStoreResult<StoredRecord> {
        (**self)
            .replace_record(ctx, collection, record, expected)
            .await
    }

    async fn get_record(
        &self,
        ctx: &Context,
        collection: &str,
        partition_key: &str,
        id: &str,
    ) -> DocumentStoreResult<StoredRecord> {
        (**self)
            .get_record(ctx, collection, partition_key, id)
            .await
    }

    async fn delete_record(
        &self,
        ctx: &Context,
        collection: &str,
        partition_key: &str,
        id: &str,
        expected: Option<&VersionToken>,
    ) -> DocumentStoreResult<()> {
        (**self)
            .delete_record(ctx, collection, partition_key, id, expected)
            .await
    }

    async fn list_records(
        &self,
        ctx: &Context,
        collection: &str,
        partition_key: Option<&str>,
    ) -> DocumentStoreResult<Vec<StoredRecord>> {
        (**self)
            .list_records(ctx, collection, partition_key)
            .await
    }

    async fn read_change_feed(
        &self,
        ctx: &Context,
        collection: &str,
        since: Option<u64>,
    ) -> DocumentStoreResult<ChangeBatch> {
        (**self)
            .read_change_feed(ctx, collection, since)
            .await
    }
}

#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
