//! Client-side narrowing of an already fetched page (search, structured
//! filters, sorting). Screens use these to refine the current page without
//! another round trip; pagination and counts stay server-authoritative, so
//! nothing here feeds back into the controller.

use contracts::{Filterable, Query, Searchable, SortSpec, Sortable};

/// Keep the records matching the query's search term and structured filters.
///
/// A trimmed search term shorter than `min_search_len` is treated as empty,
/// matching how the back-office screens gate their text filters.
pub fn filter_records<R: Searchable + Filterable + Clone>(
    records: Vec<R>,
    query: &Query,
    min_search_len: usize,
) -> Vec<R> {
    let search = query.search.trim();
    let search_active = !search.is_empty() && search.len() >= min_search_len;
    if !search_active && query.filters.is_empty() {
        return records;
    }

    records
        .into_iter()
        .filter(|record| !search_active || record.matches_search(search))
        .filter(|record| {
            query
                .filters
                .iter()
                .all(|(name, value)| record.matches_filter(name, value))
        })
        .collect()
}

/// Sort the records in place by the requested field and direction.
pub fn sort_records<R: Sortable>(records: &mut Vec<R>, sort: &SortSpec) {
    records.sort_by(|a, b| {
        let cmp = a.compare_by_field(b, &sort.field);
        if sort.direction.is_ascending() {
            cmp
        } else {
            cmp.reverse()
        }
    });
}
