use std::cmp::Ordering;
use std::fmt::Debug;
use std::hash::Hash;

use serde_json::Value;

/// Identity-bearing item of a remote collection.
///
/// The controller treats everything except the id as an opaque payload; two
/// records denote the same entity if and only if their ids are equal, and an
/// id is never reassigned after creation.
///
/// `Draft` is the payload submitted on create/update. The two constructors
/// let the controller stage optimistic rows without knowing any domain
/// fields: [`Record::provisional`] builds a placeholder row for a create
/// that has not been confirmed yet (implementations mint their own
/// temporary id, typically `Uuid::new_v4`), and [`Record::merged`] produces
/// the locally merged row shown while an update is in flight.
pub trait Record: Clone + Send + Sync + 'static {
    /// Stable, unique, comparable key of the record.
    type Id: Clone + Eq + Hash + Debug + Send + Sync + 'static;

    /// Payload submitted on create/update.
    type Draft: Clone + Debug + Send + Sync + 'static;

    fn id(&self) -> Self::Id;

    /// Build a provisional record from a draft, with a fresh temporary id.
    fn provisional(draft: &Self::Draft) -> Self;

    /// Produce the record as it would look with the draft applied.
    fn merged(&self, draft: &Self::Draft) -> Self;
}

/// Free-text matching for server- or client-side search.
pub trait Searchable {
    /// Whether the record matches the search term (already trimmed,
    /// non-empty; case handling is up to the implementation).
    fn matches_search(&self, search: &str) -> bool;
}

/// Structured filter matching (filter name → JSON value).
///
/// The default accepts everything, so screens without structured filters
/// implement nothing.
pub trait Filterable {
    fn matches_filter(&self, name: &str, value: &Value) -> bool {
        let _ = (name, value);
        true
    }
}

/// Field-named comparison for server- or client-side ordering.
pub trait Sortable {
    /// Compare two records by the given field; unknown fields should
    /// return `Ordering::Equal`.
    fn compare_by_field(&self, other: &Self, field: &str) -> Ordering;
}
