use std::fmt;

use contracts::{Record, RecordPage};

/// Tag carried by every list request.
///
/// Tokens increase monotonically per controller; only the response whose
/// token still equals the most recently issued one may land in visible
/// state. Everything older is superseded and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct RequestToken(u64);

impl RequestToken {
    pub fn next(self) -> RequestToken {
        RequestToken(self.0 + 1)
    }
}

impl fmt::Display for RequestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The records currently backing the screen.
///
/// Transitions consume the snapshot and return a new value; the owner swaps
/// the whole value under its lock, so readers never observe a half-applied
/// change. `total_count` counts matching records across all pages, not the
/// length of `records`.
#[derive(Debug, Clone)]
pub struct CollectionSnapshot<R> {
    pub records: Vec<R>,
    pub total_count: usize,
    pub fetched_at_token: RequestToken,
}

impl<R> Default for CollectionSnapshot<R> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            total_count: 0,
            fetched_at_token: RequestToken::default(),
        }
    }
}

impl<R> CollectionSnapshot<R> {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_page(page: RecordPage<R>, token: RequestToken) -> Self {
        Self {
            records: page.records,
            total_count: page.total_count,
            fetched_at_token: token,
        }
    }

    pub fn page_count(&self, page_size: usize) -> usize {
        if page_size == 0 {
            return 0;
        }
        self.total_count.div_ceil(page_size)
    }

    /// Append a record and count it.
    pub fn with_appended(mut self, record: R) -> Self {
        self.records.push(record);
        self.total_count += 1;
        self
    }

    /// Replace the record at `index` in place; counts are unchanged.
    pub fn with_replaced(mut self, index: usize, record: R) -> Self {
        if index < self.records.len() {
            self.records[index] = record;
        }
        self
    }

    /// Remove the record at `index` and uncount it.
    pub fn with_removed(mut self, index: usize) -> Self {
        if index < self.records.len() {
            self.records.remove(index);
            self.total_count = self.total_count.saturating_sub(1);
        }
        self
    }

    /// Insert a record at `index` (clamped to the end) and count it.
    pub fn with_inserted(mut self, index: usize, record: R) -> Self {
        let index = index.min(self.records.len());
        self.records.insert(index, record);
        self.total_count += 1;
        self
    }
}

impl<R: Record> CollectionSnapshot<R> {
    pub fn position_of(&self, id: &R::Id) -> Option<usize> {
        self.records.iter().position(|r| r.id() == *id)
    }
}
