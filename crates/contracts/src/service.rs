use async_trait::async_trait;

use crate::error::ServiceError;
use crate::page::RecordPage;
use crate::query::Query;
use crate::record::Record;

/// Boundary to the remote record store.
///
/// The store holds authority over record content and collection membership:
/// results returned from these calls supersede any locally predicted state.
/// Implementations classify their transport failures into [`ServiceError`]
/// and must not panic on malformed responses.
#[async_trait]
pub trait RecordService<R: Record>: Send + Sync {
    /// Fetch one page of records matching `query`, together with the total
    /// count of matching records across all pages.
    async fn list(&self, query: &Query) -> Result<RecordPage<R>, ServiceError>;

    /// Create a record from `draft`. Returns the authoritative stored record,
    /// including any server-assigned fields.
    async fn create(&self, draft: &R::Draft) -> Result<R, ServiceError>;

    /// Apply `draft` to the record identified by `id`. Returns the
    /// authoritative updated record, or `None` when the server acknowledged
    /// the write without returning a body.
    async fn update(&self, id: &R::Id, draft: &R::Draft) -> Result<Option<R>, ServiceError>;

    /// Delete the record identified by `id`.
    async fn remove(&self, id: &R::Id) -> Result<(), ServiceError>;
}
