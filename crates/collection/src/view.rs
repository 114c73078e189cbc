use std::collections::HashSet;

use contracts::{Record, ServiceError};

/// Lifecycle phase of a list instance, derived from the flags below.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListPhase {
    /// Nothing fetched yet and nothing in flight.
    Idle,
    /// A list fetch is outstanding.
    Loading,
    /// The last settled fetch succeeded.
    Ready,
    /// The last settled fetch (or mutation) failed; stale items stay visible.
    Error,
}

/// Read-only projection handed to the rendering layer.
///
/// Derived on demand from the controller's internal state and never stored;
/// renderers re-read it after a change notification. `submitting` holds the
/// targets of in-flight mutations so a screen can disable a single row
/// without blocking the list; `provisional` holds the ids of optimistic
/// creates the server has not confirmed yet.
#[derive(Debug, Clone)]
pub struct ViewState<R: Record> {
    pub items: Vec<R>,
    pub loading: bool,
    pub loaded: bool,
    pub error: Option<ServiceError>,
    pub page: usize,
    pub page_size: usize,
    pub page_count: usize,
    pub total_count: usize,
    pub submitting: HashSet<R::Id>,
    pub provisional: HashSet<R::Id>,
}

impl<R: Record> ViewState<R> {
    pub fn phase(&self) -> ListPhase {
        if self.loading {
            ListPhase::Loading
        } else if self.error.is_some() {
            ListPhase::Error
        } else if self.loaded {
            ListPhase::Ready
        } else {
            ListPhase::Idle
        }
    }

    pub fn is_submitting(&self, id: &R::Id) -> bool {
        self.submitting.contains(id)
    }

    pub fn is_provisional(&self, id: &R::Id) -> bool {
        self.provisional.contains(id)
    }

    pub fn has_pending_mutations(&self) -> bool {
        !self.submitting.is_empty()
    }
}
