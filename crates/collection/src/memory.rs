use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use contracts::{
    ErrorClassification, Filterable, Query, Record, RecordPage, RecordService, Searchable,
    ServiceError, Sortable,
};
use parking_lot::Mutex;

use crate::narrow::{filter_records, sort_records};

/// The four service operations, used to address fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceCall {
    List,
    Create,
    Update,
    Remove,
}

/// Complete in-memory record service.
///
/// Server-authoritative in the same way a real backend is: search, filters,
/// sorting, and page slicing happen here, and `total_count` counts matches
/// across all pages. Exists for tests and demos, not as a storage engine.
pub struct MemoryService<R: Record> {
    records: Mutex<Vec<R>>,
    failures: Mutex<HashMap<ServiceCall, VecDeque<ServiceError>>>,
}

impl<R: Record> MemoryService<R> {
    pub fn new() -> Self {
        Self::with_records(Vec::new())
    }

    pub fn with_records(records: Vec<R>) -> Self {
        Self {
            records: Mutex::new(records),
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Queue an error for the next call of the given operation. Queued
    /// errors are consumed in order, one per call.
    pub fn fail_next(&self, call: ServiceCall, error: ServiceError) {
        self.failures.lock().entry(call).or_default().push_back(error);
    }

    /// Current stored records, for assertions.
    pub fn stored(&self) -> Vec<R> {
        self.records.lock().clone()
    }

    fn take_failure(&self, call: ServiceCall) -> Option<ServiceError> {
        self.failures.lock().get_mut(&call).and_then(|queue| queue.pop_front())
    }
}

impl<R: Record> Default for MemoryService<R> {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found() -> ServiceError {
    ServiceError::with_message(ErrorClassification::NotFound, "no record with the given id")
}

#[async_trait]
impl<R> RecordService<R> for MemoryService<R>
where
    R: Record + Searchable + Filterable + Sortable,
{
    async fn list(&self, query: &Query) -> Result<RecordPage<R>, ServiceError> {
        if let Some(error) = self.take_failure(ServiceCall::List) {
            return Err(error);
        }

        let all = self.records.lock().clone();
        let mut matching = filter_records(all, query, 0);
        if let Some(sort) = &query.sort {
            sort_records(&mut matching, sort);
        }

        let total_count = matching.len();
        let start = query.page_index.saturating_mul(query.page_size);
        let page: Vec<R> = matching
            .into_iter()
            .skip(start)
            .take(query.page_size)
            .collect();
        Ok(RecordPage::new(page, total_count))
    }

    async fn create(&self, draft: &R::Draft) -> Result<R, ServiceError> {
        if let Some(error) = self.take_failure(ServiceCall::Create) {
            return Err(error);
        }

        // the store mints the authoritative id
        let record = R::provisional(draft);
        self.records.lock().push(record.clone());
        Ok(record)
    }

    async fn update(&self, id: &R::Id, draft: &R::Draft) -> Result<Option<R>, ServiceError> {
        if let Some(error) = self.take_failure(ServiceCall::Update) {
            return Err(error);
        }

        let mut records = self.records.lock();
        match records.iter().position(|r| r.id() == *id) {
            Some(index) => {
                let updated = records[index].merged(draft);
                records[index] = updated.clone();
                Ok(Some(updated))
            }
            None => Err(not_found()),
        }
    }

    async fn remove(&self, id: &R::Id) -> Result<(), ServiceError> {
        if let Some(error) = self.take_failure(ServiceCall::Remove) {
            return Err(error);
        }

        let mut records = self.records.lock();
        match records.iter().position(|r| r.id() == *id) {
            Some(index) => {
                records.remove(index);
                Ok(())
            }
            None => Err(not_found()),
        }
    }
}

#[cfg(test)]
mod tests {
    use contracts::{SortDirection, SortSpec};

    use super::*;
    use crate::testing::{BankAccount, BankAccountDraft, BankAccountId, sample_accounts};

    fn service_with(count: usize) -> MemoryService<BankAccount> {
        MemoryService::with_records(sample_accounts(count))
    }

    #[tokio::test]
    async fn test_list_slices_pages_with_full_total() {
        let service = service_with(120);
        let mut query = Query::new(50);
        query.go_to_page(2, 3);

        let page = service.list(&query).await.unwrap();
        assert_eq!(page.records.len(), 20);
        assert_eq!(page.total_count, 120);
    }

    #[tokio::test]
    async fn test_list_search_narrows_total() {
        let service = service_with(12);
        let needle = service.stored()[5].holder.clone();

        let mut query = Query::new(50);
        query.set_search(needle);
        let page = service.list(&query).await.unwrap();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.records.len(), 1);
    }

    #[tokio::test]
    async fn test_list_applies_sort() {
        let service = service_with(8);
        let mut query = Query::new(50);
        query.set_sort("holder", SortDirection::Descending);
        assert_eq!(query.sort, Some(SortSpec::descending("holder")));

        let page = service.list(&query).await.unwrap();
        let max = service
            .stored()
            .iter()
            .map(|a| a.holder.clone())
            .max()
            .unwrap();
        assert_eq!(page.records[0].holder, max);
    }

    #[tokio::test]
    async fn test_update_missing_id_is_not_found() {
        let service = service_with(3);
        let draft = BankAccountDraft {
            holder: "Ghost Holder".into(),
            iban: "LV21HABA000000000000".into(),
            currency: "EUR".into(),
        };

        let err = service
            .update(&BankAccountId::new_v4(), &draft)
            .await
            .unwrap_err();
        assert_eq!(err.classification(), ErrorClassification::NotFound);
    }

    #[tokio::test]
    async fn test_fail_next_hits_one_call() {
        let service = service_with(3);
        service.fail_next(
            ServiceCall::List,
            ServiceError::new(ErrorClassification::NetworkUnavailable),
        );

        let query = Query::new(50);
        let err = service.list(&query).await.unwrap_err();
        assert_eq!(err.classification(), ErrorClassification::NetworkUnavailable);

        // the queued failure is spent
        assert!(service.list(&query).await.is_ok());
    }

    #[tokio::test]
    async fn test_create_stores_and_returns_the_same_record() {
        let service = service_with(0);
        let draft = BankAccountDraft {
            holder: "Nordsee Terminal GmbH".into(),
            iban: "DE89370400440532013000".into(),
            currency: "EUR".into(),
        };

        let created = service.create(&draft).await.unwrap();
        let stored = service.stored();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0], created);
    }
}
