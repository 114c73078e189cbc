use serde::{Deserialize, Serialize};

/// One page of a remote collection, as returned by a record service.
///
/// `total_count` is the size of the whole result set under the current
/// search/filters, not the size of this page. Pagination math runs on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPage<R> {
    pub records: Vec<R>,
    pub total_count: usize,
}

impl<R> RecordPage<R> {
    pub fn new(records: Vec<R>, total_count: usize) -> Self {
        Self {
            records,
            total_count,
        }
    }

    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
            total_count: 0,
        }
    }
}
