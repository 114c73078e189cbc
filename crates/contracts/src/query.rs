use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default page size used when a screen does not configure one.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Direction of a single-field sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn is_ascending(self) -> bool {
        matches!(self, SortDirection::Ascending)
    }

    pub fn reversed(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }
}

/// Field + direction pair for server-side ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }
}

/// Parameters of one list request: page, free-text search, structured
/// filters and sort spec.
///
/// Pure data: setters update the value and report whether anything
/// changed, nothing else. Every setter except [`Query::go_to_page`] resets
/// `page_index` to 0, because changing the result set invalidates the
/// notion of "current page".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    pub page_index: usize,
    pub page_size: usize,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub search: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub filters: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortSpec>,
}

impl Default for Query {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl Query {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_index: 0,
            page_size: page_size.max(1),
            search: String::new(),
            filters: BTreeMap::new(),
            sort: None,
        }
    }

    /// Set the free-text search term. Returns whether the query changed.
    pub fn set_search(&mut self, text: impl Into<String>) -> bool {
        let text = text.into();
        if self.search == text {
            return false;
        }
        self.search = text;
        self.page_index = 0;
        true
    }

    /// Set a structured filter; `Value::Null` removes it.
    pub fn set_filter(&mut self, name: impl Into<String>, value: Value) -> bool {
        let name = name.into();
        let changed = if value.is_null() {
            self.filters.remove(&name).is_some()
        } else if self.filters.get(&name) == Some(&value) {
            false
        } else {
            self.filters.insert(name, value);
            true
        };
        if changed {
            self.page_index = 0;
        }
        changed
    }

    pub fn set_sort(&mut self, field: impl Into<String>, direction: SortDirection) -> bool {
        let spec = SortSpec {
            field: field.into(),
            direction,
        };
        if self.sort.as_ref() == Some(&spec) {
            return false;
        }
        self.sort = Some(spec);
        self.page_index = 0;
        true
    }

    /// Sort ascending by `field`, or flip the direction when the query is
    /// already sorted by it. A toggle always changes the query.
    pub fn toggle_sort(&mut self, field: impl Into<String>) -> bool {
        let field = field.into();
        self.sort = Some(match self.sort.take() {
            Some(spec) if spec.field == field => SortSpec {
                direction: spec.direction.reversed(),
                field,
            },
            _ => SortSpec::ascending(field),
        });
        self.page_index = 0;
        true
    }

    pub fn clear_sort(&mut self) -> bool {
        if self.sort.take().is_none() {
            return false;
        }
        self.page_index = 0;
        true
    }

    /// Set the page size; `0` is ignored (page size must stay positive).
    pub fn set_page_size(&mut self, n: usize) -> bool {
        if n == 0 || self.page_size == n {
            return false;
        }
        self.page_size = n;
        self.page_index = 0;
        true
    }

    /// Jump to a page, clamped into `[0, page_count - 1]` when `page_count`
    /// is known and positive; otherwise to 0.
    pub fn go_to_page(&mut self, index: usize, page_count: usize) -> bool {
        let target = if page_count > 0 {
            index.min(page_count - 1)
        } else {
            0
        };
        if self.page_index == target {
            return false;
        }
        self.page_index = target;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_setters_reset_page_index() {
        let mut q = Query::new(50);
        q.go_to_page(3, 10);
        assert_eq!(q.page_index, 3);
        assert!(q.set_search("abc"));
        assert_eq!(q.page_index, 0);

        q.go_to_page(3, 10);
        assert!(q.set_filter("status", json!("open")));
        assert_eq!(q.page_index, 0);

        q.go_to_page(3, 10);
        assert!(q.set_sort("name", SortDirection::Descending));
        assert_eq!(q.page_index, 0);

        q.go_to_page(3, 10);
        assert!(q.set_page_size(25));
        assert_eq!(q.page_index, 0);
    }

    #[test]
    fn test_unchanged_value_is_a_noop() {
        let mut q = Query::new(50);
        q.set_search("abc");
        q.go_to_page(2, 5);
        assert!(!q.set_search("abc"));
        assert_eq!(q.page_index, 2, "no-op setter must not reset the page");
        assert!(!q.set_page_size(50));
        assert!(!q.set_page_size(0), "zero page size is ignored");
        assert_eq!(q.page_size, 50);
    }

    #[test]
    fn test_null_filter_removes() {
        let mut q = Query::default();
        assert!(!q.set_filter("status", Value::Null), "removing an absent filter changes nothing");
        assert!(q.set_filter("status", json!("open")));
        assert!(!q.set_filter("status", json!("open")));
        assert!(q.set_filter("status", Value::Null));
        assert!(q.filters.is_empty());
    }

    #[test]
    fn test_toggle_sort_flips_direction() {
        let mut q = Query::new(50);
        assert!(q.toggle_sort("holder"));
        assert_eq!(q.sort, Some(SortSpec::ascending("holder")));

        q.go_to_page(2, 5);
        assert!(q.toggle_sort("holder"));
        assert_eq!(q.sort, Some(SortSpec::descending("holder")));
        assert_eq!(q.page_index, 0);

        assert!(q.toggle_sort("iban"), "a new field starts ascending");
        assert_eq!(q.sort, Some(SortSpec::ascending("iban")));
    }

    #[test]
    fn test_go_to_page_clamps() {
        let mut q = Query::new(50);
        assert!(q.go_to_page(5, 3));
        assert_eq!(q.page_index, 2);
        assert!(!q.go_to_page(7, 3), "already clamped to the last page");
    }

    #[test]
    fn test_go_to_page_without_pages_goes_to_zero() {
        let mut q = Query::new(50);
        q.go_to_page(2, 5);
        assert_eq!(q.page_index, 2);
        assert!(q.go_to_page(4, 0));
        assert_eq!(q.page_index, 0);
    }

    #[test]
    fn test_serialized_shape_is_camel_case() {
        let q = Query::new(50);
        let v = serde_json::to_value(&q).unwrap();
        assert_eq!(v, json!({"pageIndex": 0, "pageSize": 50}));
    }
}
