//! Shared boundary types for remote collection screens.
//!
//! Everything a list screen and the service behind it have to agree on lives
//! here: the [`Record`] identity contract, the [`Query`] a screen sends, the
//! [`RecordPage`] a service answers with, the [`ServiceError`] taxonomy, and
//! the [`RecordService`] trait itself. The controller that drives the screen
//! lives in the `collection` crate and depends only on these types.

pub mod error;
pub mod page;
pub mod query;
pub mod record;
pub mod service;

// Re-exports
pub use error::{ErrorClassification, FieldRejection, ServiceError};
pub use page::RecordPage;
pub use query::{Query, SortDirection, SortSpec};
pub use record::{Filterable, Record, Searchable, Sortable};
pub use service::RecordService;
