//! Remote collection view-state controller.
//!
//! One [`CollectionController`] drives one paginated list screen backed by a
//! remote [`contracts::RecordService`]: it owns the query parameters, tags
//! every fetch with a monotonic request token so late responses cannot
//! overwrite newer ones, applies create/update/delete optimistically with
//! exact rollback, and derives the read-only [`ViewState`] a renderer draws
//! from. The crate is framework-agnostic; anything that can spawn a future
//! and await a `watch` channel can render it.

pub mod controller;
pub mod memory;
pub mod narrow;
pub mod notify;
pub mod options;
mod pending;
mod snapshot;
pub mod testing;
pub mod view;

// Re-exports
pub use controller::CollectionController;
pub use options::CollectionOptions;
pub use view::{ListPhase, ViewState};
pub use pending::MutationKind;
pub use notify::{ListNotifier, LogNotifier, NoopNotifier};
pub use memory::{MemoryService, ServiceCall};
pub use narrow::{filter_records, sort_records};
