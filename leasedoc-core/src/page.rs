//! Page type returned by iterators.

use serde::{Deserialize, Serialize};

use crate::error::DocumentStoreResult;

/// One batch of results pulled from a [`DocumentIterator`](crate::iterator::DocumentIterator).
///
/// `continuation` is the cursor to resume after this page, or `None` when the sequence has
/// been fully consumed.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// The items contained in this page.
    pub items: Vec<T>,
    /// Number of items in this page.
    pub count: usize,
    /// Cursor to resume after this page.
    pub continuation: Option<String>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, continuation: Option<String>) -> Self {
        Self {
            count: items.len(),
            items,
            continuation,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Converts every item, failing on the first conversion error.
    pub fn try_map<U, F>(self, f: F) -> DocumentStoreResult<Page<U>>
    where
        F: FnMut(T) -> DocumentStoreResult<U>,
    {
        Ok(Page {
            items: self
                .items
                .into_iter()
                .map(f)
                .collect::<DocumentStoreResult<Vec<U>>>()?,
            count: self.count,
            continuation: self.continuation,
        })
    }
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            count: 0,
            continuation: None,
        }
    }
}

impl<T> IntoIterator for Page<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
