//! Lazy, forward-only result sequences with continuation cursors.
//!
//! `list`, `query` and `change_feed` all hand back a [`DocumentIterator`]. The caller pulls
//! pages with [`DocumentIterator::next`], either bounded ([`MaxItemCount::Limit`]) or draining
//! everything that is left ([`MaxItemCount::Unbounded`], the `-1` sentinel on the wire).
//!
//! An iterator is either active or exhausted. It becomes exhausted on the call that leaves
//! nothing behind, after which every further `next` returns an empty page rather than an
//! error. There is no way back to the active state.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;

use crate::{
    context::Context,
    document::{Document, DocumentExt},
    error::{DocumentStoreError, DocumentStoreResult},
    page::Page,
};

/// How many items a single `next` call may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxItemCount {
    /// At most this many items.
    Limit(usize),
    /// Everything that is left.
    Unbounded,
}

impl MaxItemCount {
    /// Wire value meaning "drain everything".
    pub const UNBOUNDED_SENTINEL: i64 = -1;
}

impl TryFrom<i64> for MaxItemCount {
    type Error = DocumentStoreError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            Self::UNBOUNDED_SENTINEL => Ok(MaxItemCount::Unbounded),
            n if n >= 0 => Ok(MaxItemCount::Limit(n as usize)),
            n => Err(DocumentStoreError::Validation(format!(
                "max item count must be non-negative or {}, got {n}",
                Self::UNBOUNDED_SENTINEL
            ))),
        }
    }
}

impl From<usize> for MaxItemCount {
    fn from(value: usize) -> Self {
        MaxItemCount::Limit(value)
    }
}

#[async_trait]
pub trait DocumentIterator<D: Document>: Send {
    /// Pulls the next page.
    ///
    /// Returns an empty page once the iterator is exhausted.
    async fn next(&mut self, ctx: &Context, max_item_count: MaxItemCount) -> DocumentStoreResult<Page<D>>;

    /// Pulls the next page as raw JSON values.
    async fn next_raw(&mut self, ctx: &Context, max_item_count: MaxItemCount) -> DocumentStoreResult<Page<Value>> {
        self.next(ctx, max_item_count)
            .await?
            .try_map(|doc| doc.to_json())
    }

    /// Cursor marking the position after the last returned item, `None` once nothing is left.
    fn continuation(&self) -> Option<String>;

    fn is_exhausted(&self) -> bool;

    /// Returns every remaining item and exhausts the iterator.
    async fn drain(&mut self, ctx: &Context) -> DocumentStoreResult<Vec<D>> {
        Ok(self.next(ctx, MaxItemCount::Unbounded).await?.items)
    }
}

pub type BoxDocumentIterator<D> = Box<dyn DocumentIterator<D>>;

/// Iterator over a sequence captured when the iterator was created.
///
/// The continuation is the absolute offset of the next item, rendered in decimal. It is only
/// meaningful against a snapshot with the same ordering, so callers that resume across
/// `list` calls need a deterministic sort.
#[derive(Debug)]
pub struct SnapshotIterator<D> {
    remaining: VecDeque<D>,
    position: usize,
    exhausted: bool,
}

impl<D> SnapshotIterator<D> {
    pub fn new(documents: Vec<D>) -> Self {
        Self::resume(documents, 0)
    }

    /// Starts at `offset`, skipping the items before it.
    pub fn resume(documents: Vec<D>, offset: usize) -> Self {
        let mut remaining = VecDeque::from(documents);
        let skipped = offset.min(remaining.len());
        remaining.drain(..skipped);

        Self {
            remaining,
            position: skipped,
            exhausted: false,
        }
    }

    /// Starts at the position encoded in `continuation`, or at the beginning for `None`.
    pub fn from_continuation(documents: Vec<D>, continuation: Option<&str>) -> DocumentStoreResult<Self> {
        let offset = match continuation {
            Some(token) => parse_continuation(token)?,
            None => 0,
        };

        Ok(Self::resume(documents, offset))
    }

    fn take(&mut self, max_item_count: MaxItemCount) -> Page<D> {
        if self.exhausted {
            return Page::default();
        }

        let count = match max_item_count {
            MaxItemCount::Unbounded => self.remaining.len(),
            MaxItemCount::Limit(n) => n.min(self.remaining.len()),
        };

        let items: Vec<D> = self.remaining.drain(..count).collect();
        self.position += count;

        let continuation = self.cursor();
        if continuation.is_none() {
            self.exhausted = true;
        }

        Page::new(items, continuation)
    }

    fn cursor(&self) -> Option<String> {
        if self.remaining.is_empty() {
            None
        } else {
            Some(self.position.to_string())
        }
    }
}

#[async_trait]
impl<D: Document> DocumentIterator<D> for SnapshotIterator<D> {
    async fn next(&mut self, ctx: &Context, max_item_count: MaxItemCount) -> DocumentStoreResult<Page<D>> {
        ctx.check()?;

        Ok(self.take(max_item_count))
    }

    fn continuation(&self) -> Option<String> {
        self.cursor()
    }

    fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

pub(crate) fn parse_continuation(token: &str) -> DocumentStoreResult<usize> {
    token
        .parse::<usize>()
        .map_err(|_| DocumentStoreError::Validation(format!("malformed continuation token {token:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn sentinel_means_unbounded() {
        assert_eq!(MaxItemCount::try_from(MaxItemCount::UNBOUNDED_SENTINEL).unwrap(), MaxItemCount::Unbounded);
        assert_eq!(MaxItemCount::try_from(3i64).unwrap(), MaxItemCount::Limit(3));
        assert!(matches!(MaxItemCount::try_from(-2i64), Err(DocumentStoreError::Validation(_))));
    }

    #[test]
    fn bounded_then_unbounded_then_empty() {
        let mut iter = SnapshotIterator::new(vec!["a", "b", "c", "d"]);

        let first = iter.take(MaxItemCount::Limit(1));
        assert_eq!(first.items, vec!["a"]);
        assert_eq!(first.continuation.as_deref(), Some("1"));
        assert!(!iter.exhausted);

        let rest = iter.take(MaxItemCount::Unbounded);
        assert_eq!(rest.items, vec!["b", "c", "d"]);
        assert_eq!(rest.continuation, None);
        assert!(iter.exhausted);

        assert_eq!(iter.take(MaxItemCount::Limit(10)), Page::default());
        assert_eq!(iter.take(MaxItemCount::Unbounded), Page::default());
    }

    #[test]
    fn empty_snapshot_exhausts_on_first_call() {
        let mut iter = SnapshotIterator::<u8>::new(vec![]);
        assert!(!iter.exhausted);
        assert!(iter.take(MaxItemCount::Limit(5)).is_empty());
        assert!(iter.exhausted);
    }

    #[test]
    fn zero_limit_does_not_advance() {
        let mut iter = SnapshotIterator::new(vec![1, 2]);
        let page = iter.take(MaxItemCount::Limit(0));
        assert!(page.is_empty());
        assert_eq!(page.continuation.as_deref(), Some("0"));
        assert!(!iter.exhausted);
    }

    #[test]
    fn malformed_continuation_is_rejected() {
        let result = SnapshotIterator::from_continuation(vec![1], Some("x"));
        assert!(matches!(result, Err(DocumentStoreError::Validation(_))));
    }

    proptest! {
        #[test]
        fn pages_partition_the_snapshot(len in 0usize..64, page_size in 1usize..10) {
            let items: Vec<usize> = (0..len).collect();
            let mut iter = SnapshotIterator::new(items.clone());
            let mut seen = Vec::new();
            let mut pages = 0;

            while !iter.exhausted {
                let page = iter.take(MaxItemCount::Limit(page_size));
                pages += 1;
                prop_assert!(page.count <= page_size);
                match &page.continuation {
                    Some(cursor) => prop_assert_eq!(cursor.clone(), (seen.len() + page.count).to_string()),
                    None => prop_assert_eq!(seen.len() + page.count, len),
                }
                seen.extend(page.items);
            }

            prop_assert_eq!(seen, items);
            prop_assert_eq!(pages, len.div_ceil(page_size).max(1));
        }

        #[test]
        fn resuming_yields_the_suffix(len in 0usize..32, offset in 0usize..40) {
            let items: Vec<usize> = (0..len).collect();
            let mut iter = SnapshotIterator::from_continuation(items.clone(), Some(&offset.to_string())).unwrap();
            let rest = iter.take(MaxItemCount::Unbounded);

            prop_assert_eq!(rest.items, items[offset.min(len)..].to_vec());
            prop_assert!(iter.exhausted);
        }
    }
}
