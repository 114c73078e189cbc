use std::time::Duration;

use contracts::query::DEFAULT_PAGE_SIZE;
use contracts::SortSpec;

/// Delay between the last search edit and the refetch it triggers.
pub const DEFAULT_SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// Tuning knobs for a collection controller.
///
/// `min_search_len` mirrors what the back-office screens do with text
/// filters: a trimmed search term shorter than the threshold behaves like an
/// empty one. The default of 0 disables the threshold.
#[derive(Debug, Clone)]
pub struct CollectionOptions {
    pub page_size: usize,
    pub search_debounce: Duration,
    pub min_search_len: usize,
    pub sort: Option<SortSpec>,
}

impl Default for CollectionOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            search_debounce: DEFAULT_SEARCH_DEBOUNCE,
            min_search_len: 0,
            sort: None,
        }
    }
}
