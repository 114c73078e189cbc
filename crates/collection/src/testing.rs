//! Fixtures and scripted doubles for exercising collection controllers.
//!
//! Everything here is deterministic on purpose: `sample_accounts` cycles a
//! fixed name pool, and [`ScriptedService`] answers nothing on its own. Each
//! call parks until the test releases it, which is how the out-of-order and
//! rollback scenarios are driven.

use std::cmp::Ordering;

use chrono::{DateTime, Duration, Utc};
use contracts::{
    ErrorClassification, Filterable, Query, Record, RecordPage, RecordService, Searchable,
    ServiceError, Sortable,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::notify::ListNotifier;
use crate::pending::MutationKind;

// ============================================================================
// ID Type
// ============================================================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BankAccountId(pub Uuid);

impl BankAccountId {
    pub fn new(value: Uuid) -> Self {
        Self(value)
    }

    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn value(&self) -> Uuid {
        self.0
    }
}

// ============================================================================
// Fixture Record
// ============================================================================

/// Broker bank account, the fixture record of the test suites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankAccount {
    pub id: BankAccountId,
    pub holder: String,
    pub iban: String,
    pub currency: String,
    pub opened_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankAccountDraft {
    pub holder: String,
    pub iban: String,
    pub currency: String,
}

impl Record for BankAccount {
    type Id = BankAccountId;
    type Draft = BankAccountDraft;

    fn id(&self) -> BankAccountId {
        self.id
    }

    fn provisional(draft: &BankAccountDraft) -> Self {
        Self {
            id: BankAccountId::new_v4(),
            holder: draft.holder.clone(),
            iban: draft.iban.clone(),
            currency: draft.currency.clone(),
            opened_at: Utc::now(),
        }
    }

    fn merged(&self, draft: &BankAccountDraft) -> Self {
        Self {
            id: self.id,
            holder: draft.holder.clone(),
            iban: draft.iban.clone(),
            currency: draft.currency.clone(),
            opened_at: self.opened_at,
        }
    }
}

impl Searchable for BankAccount {
    fn matches_search(&self, search: &str) -> bool {
        let needle = search.to_lowercase();
        self.holder.to_lowercase().contains(&needle)
            || self.iban.to_lowercase().contains(&needle)
            || self.currency.to_lowercase().contains(&needle)
    }
}

impl Filterable for BankAccount {
    fn matches_filter(&self, name: &str, value: &Value) -> bool {
        match name {
            "currency" => value.as_str() == Some(self.currency.as_str()),
            "holder" => value
                .as_str()
                .is_some_and(|v| self.holder.to_lowercase().contains(&v.to_lowercase())),
            _ => true,
        }
    }
}

impl Sortable for BankAccount {
    fn compare_by_field(&self, other: &Self, field: &str) -> Ordering {
        match field {
            "holder" => self.holder.cmp(&other.holder),
            "iban" => self.iban.cmp(&other.iban),
            "currency" => self.currency.cmp(&other.currency),
            "opened_at" => self.opened_at.cmp(&other.opened_at),
            _ => Ordering::Equal,
        }
    }
}

const HOLDER_POOL: [&str; 8] = [
    "Alfa Cargo SIA",
    "Baltic Freight OU",
    "Caspian Lines LLC",
    "Danube Route Kft",
    "Ems Logistik GmbH",
    "Fjord Carriers AS",
    "Gdansk Shipping Sp",
    "Hanse Spedition KG",
];

/// Deterministic fixture accounts; holders are unique per index.
pub fn sample_accounts(count: usize) -> Vec<BankAccount> {
    (0..count)
        .map(|index| BankAccount {
            id: BankAccountId::new_v4(),
            holder: format!("{} {:03}", HOLDER_POOL[index % HOLDER_POOL.len()], index),
            iban: format!("LV21HABA{:012}", 100_000 + index),
            currency: "EUR".to_string(),
            opened_at: DateTime::UNIX_EPOCH + Duration::days(19_000 + index as i64),
        })
        .collect()
}

// ============================================================================
// Scripted Service
// ============================================================================

/// One end of a parked service call; consuming it settles the call.
pub struct Reply<T>(oneshot::Sender<Result<T, ServiceError>>);

impl<T> Reply<T> {
    pub fn ok(self, value: T) {
        let _ = self.0.send(Ok(value));
    }

    pub fn err(self, error: ServiceError) {
        let _ = self.0.send(Err(error));
    }
}

/// A service call waiting for the test to settle it.
pub enum PendingCall<R: Record> {
    List {
        query: Query,
        reply: Reply<RecordPage<R>>,
    },
    Create {
        draft: R::Draft,
        reply: Reply<R>,
    },
    Update {
        id: R::Id,
        draft: R::Draft,
        reply: Reply<Option<R>>,
    },
    Remove {
        id: R::Id,
        reply: Reply<()>,
    },
}

impl<R: Record> PendingCall<R> {
    fn kind_name(&self) -> &'static str {
        match self {
            PendingCall::List { .. } => "list",
            PendingCall::Create { .. } => "create",
            PendingCall::Update { .. } => "update",
            PendingCall::Remove { .. } => "remove",
        }
    }
}

/// Record service whose every call parks until the test releases it through
/// the paired [`ScriptedHandle`]. Calls arrive at the handle in the order the
/// controller issued them; the test settles them in any order it wants.
pub struct ScriptedService<R: Record> {
    calls: mpsc::UnboundedSender<PendingCall<R>>,
}

pub struct ScriptedHandle<R: Record> {
    calls: mpsc::UnboundedReceiver<PendingCall<R>>,
}

impl<R: Record> ScriptedService<R> {
    pub fn new() -> (Self, ScriptedHandle<R>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { calls: tx }, ScriptedHandle { calls: rx })
    }

    async fn park<T>(
        &self,
        call: impl FnOnce(Reply<T>) -> PendingCall<R>,
    ) -> Result<T, ServiceError> {
        let (tx, rx) = oneshot::channel();
        if self.calls.send(call(Reply(tx))).is_err() {
            return Err(script_gone());
        }
        rx.await.unwrap_or_else(|_| Err(script_gone()))
    }
}

fn script_gone() -> ServiceError {
    ServiceError::with_message(ErrorClassification::Unknown, "scripted call dropped")
}

#[async_trait::async_trait]
impl<R: Record> RecordService<R> for ScriptedService<R> {
    async fn list(&self, query: &Query) -> Result<RecordPage<R>, ServiceError> {
        let query = query.clone();
        self.park(|reply| PendingCall::List { query, reply }).await
    }

    async fn create(&self, draft: &R::Draft) -> Result<R, ServiceError> {
        let draft = draft.clone();
        self.park(|reply| PendingCall::Create { draft, reply }).await
    }

    async fn update(&self, id: &R::Id, draft: &R::Draft) -> Result<Option<R>, ServiceError> {
        let id = id.clone();
        let draft = draft.clone();
        self.park(|reply| PendingCall::Update { id, draft, reply }).await
    }

    async fn remove(&self, id: &R::Id) -> Result<(), ServiceError> {
        let id = id.clone();
        self.park(|reply| PendingCall::Remove { id, reply }).await
    }
}

impl<R: Record> ScriptedHandle<R> {
    /// Wait for the next call the controller makes.
    ///
    /// Panics if the service side is gone; tests hold the controller alive.
    pub async fn next_call(&mut self) -> PendingCall<R> {
        match self.calls.recv().await {
            Some(call) => call,
            None => panic!("scripted service dropped with no further calls"),
        }
    }

    /// The next call if one has already arrived, without waiting.
    pub fn try_next_call(&mut self) -> Option<PendingCall<R>> {
        self.calls.try_recv().ok()
    }

    pub async fn expect_list(&mut self) -> (Query, Reply<RecordPage<R>>) {
        match self.next_call().await {
            PendingCall::List { query, reply } => (query, reply),
            other => panic!("expected a list call, got {}", other.kind_name()),
        }
    }

    pub async fn expect_create(&mut self) -> (R::Draft, Reply<R>) {
        match self.next_call().await {
            PendingCall::Create { draft, reply } => (draft, reply),
            other => panic!("expected a create call, got {}", other.kind_name()),
        }
    }

    pub async fn expect_update(&mut self) -> (R::Id, R::Draft, Reply<Option<R>>) {
        match self.next_call().await {
            PendingCall::Update { id, draft, reply } => (id, draft, reply),
            other => panic!("expected an update call, got {}", other.kind_name()),
        }
    }

    pub async fn expect_remove(&mut self) -> (R::Id, Reply<()>) {
        match self.next_call().await {
            PendingCall::Remove { id, reply } => (id, reply),
            other => panic!("expected a remove call, got {}", other.kind_name()),
        }
    }
}

// ============================================================================
// Recording Notifier
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifierEvent {
    FetchFailed(ErrorClassification),
    MutationFailed(MutationKind, ErrorClassification),
    OutOfSync,
}

/// Captures every notification for later assertions.
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<NotifierEvent>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<NotifierEvent> {
        self.events.lock().clone()
    }
}

impl ListNotifier for RecordingNotifier {
    fn fetch_failed(&self, error: &ServiceError) {
        self.events
            .lock()
            .push(NotifierEvent::FetchFailed(error.classification()));
    }

    fn mutation_failed(&self, kind: MutationKind, error: &ServiceError) {
        self.events
            .lock()
            .push(NotifierEvent::MutationFailed(kind, error.classification()));
    }

    fn out_of_sync(&self) {
        self.events.lock().push(NotifierEvent::OutOfSync);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provisional_mints_fresh_ids() {
        let draft = BankAccountDraft {
            holder: "Alfa Cargo SIA".into(),
            iban: "LV21HABA000000000001".into(),
            currency: "EUR".into(),
        };
        let a = BankAccount::provisional(&draft);
        let b = BankAccount::provisional(&draft);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_merged_keeps_identity() {
        let original = sample_accounts(1).remove(0);
        let merged = original.merged(&BankAccountDraft {
            holder: "Renamed Holder".into(),
            iban: original.iban.clone(),
            currency: "USD".into(),
        });
        assert_eq!(merged.id, original.id);
        assert_eq!(merged.opened_at, original.opened_at);
        assert_eq!(merged.holder, "Renamed Holder");
        assert_eq!(merged.currency, "USD");
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let account = sample_accounts(1).remove(0);
        assert!(account.matches_search("alfa cargo"));
        assert!(account.matches_search("ALFA"));
        assert!(!account.matches_search("nordic"));
    }
}
