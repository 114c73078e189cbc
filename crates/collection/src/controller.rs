//! The controller behind every remote list screen: one query, one snapshot,
//! one pending-mutation ledger, all behind a short-hold lock. Fetches are
//! tagged with monotonic request tokens so overlapping responses cannot
//! land out of order; optimistic mutations serialize per record id and roll
//! back exactly on failure.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use contracts::{Query, Record, RecordService, ServiceError, SortDirection};
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};

use crate::notify::{ListNotifier, NoopNotifier};
use crate::options::CollectionOptions;
use crate::pending::{MutationKind, PendingMutation};
use crate::snapshot::{CollectionSnapshot, RequestToken};
use crate::view::ViewState;

/// Payload of the query-change channel watched by [`CollectionController::run`].
///
/// Both counters only ever grow; a search edit bumps `generation` alone,
/// every other query change bumps both. The loop compares against what it
/// last saw, so coalesced notifications lose nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct QuerySignal {
    generation: u64,
    immediate_generation: u64,
    closed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueryChange {
    Immediate,
    Debounced,
}

struct ListState<R: Record> {
    query: Query,
    snapshot: CollectionSnapshot<R>,
    last_token: RequestToken,
    loading: bool,
    loaded: bool,
    error: Option<ServiceError>,
    pending: Vec<PendingMutation<R>>,
    detached: bool,
}

struct Inner<R: Record> {
    service: Arc<dyn RecordService<R>>,
    notifier: Arc<dyn ListNotifier>,
    options: CollectionOptions,
    state: Mutex<ListState<R>>,
    // per-id mutation gates, created lazily and dropped once idle
    gates: Mutex<HashMap<R::Id, Arc<tokio::sync::Mutex<()>>>>,
    query_signal: watch::Sender<QuerySignal>,
    version: watch::Sender<u64>,
    mutation_seq: AtomicU64,
}

/// View-state controller for one remote collection screen.
///
/// Cheap to clone; all clones share the same state. The typical lifecycle:
/// create it at mount, spawn [`run`](Self::run) for automatic refetching,
/// render from [`view_state`](Self::view_state) after every change signalled
/// through [`subscribe`](Self::subscribe), call
/// [`detach`](Self::detach) at unmount.
pub struct CollectionController<R: Record> {
    inner: Arc<Inner<R>>,
}

impl<R: Record> Clone for CollectionController<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: Record> CollectionController<R> {
    pub fn new(service: Arc<dyn RecordService<R>>) -> Self {
        Self::new_with(service, CollectionOptions::default(), Arc::new(NoopNotifier))
    }

    pub fn new_with(
        service: Arc<dyn RecordService<R>>,
        options: CollectionOptions,
        notifier: Arc<dyn ListNotifier>,
    ) -> Self {
        let mut query = Query::new(options.page_size);
        query.sort = options.sort.clone();

        let (query_signal, _) = watch::channel(QuerySignal::default());
        let (version, _) = watch::channel(0u64);

        Self {
            inner: Arc::new(Inner {
                service,
                notifier,
                options,
                state: Mutex::new(ListState {
                    query,
                    snapshot: CollectionSnapshot::empty(),
                    last_token: RequestToken::default(),
                    loading: false,
                    loaded: false,
                    error: None,
                    pending: Vec::new(),
                    detached: false,
                }),
                gates: Mutex::new(HashMap::new()),
                query_signal,
                version,
                mutation_seq: AtomicU64::new(0),
            }),
        }
    }

    /// The current query, by value.
    pub fn query(&self) -> Query {
        self.inner.state.lock().query.clone()
    }

    /// Set the free-text search term; the refetch waits out the debounce
    /// window. A trimmed term shorter than the configured minimum behaves
    /// like an empty one. Returns whether the query changed.
    pub fn set_search(&self, text: impl Into<String>) -> bool {
        let text = text.into();
        let effective = if text.trim().len() < self.inner.options.min_search_len {
            String::new()
        } else {
            text
        };
        self.inner
            .edit_query(QueryChange::Debounced, |query| query.set_search(effective))
    }

    /// Set or remove (`Value::Null`) a structured filter; refetches
    /// immediately.
    pub fn set_filter(&self, name: impl Into<String>, value: Value) -> bool {
        let name = name.into();
        self.inner
            .edit_query(QueryChange::Immediate, |query| query.set_filter(name, value))
    }

    pub fn set_sort(&self, field: impl Into<String>, direction: SortDirection) -> bool {
        let field = field.into();
        self.inner
            .edit_query(QueryChange::Immediate, |query| query.set_sort(field, direction))
    }

    /// Sort by `field`, flipping the direction when already sorted by it;
    /// refetches immediately.
    pub fn toggle_sort(&self, field: impl Into<String>) -> bool {
        let field = field.into();
        self.inner
            .edit_query(QueryChange::Immediate, |query| query.toggle_sort(field))
    }

    pub fn clear_sort(&self) -> bool {
        self.inner
            .edit_query(QueryChange::Immediate, |query| query.clear_sort())
    }

    /// Change the page size; zero is ignored. Resets to the first page.
    pub fn set_page_size(&self, page_size: usize) -> bool {
        self.inner
            .edit_query(QueryChange::Immediate, |query| query.set_page_size(page_size))
    }

    /// Go to a page, clamped into the range the last fetch reported.
    pub fn go_to_page(&self, index: usize) -> bool {
        self.inner.go_to_page(index)
    }

    /// Fetch the current page once and wait for the result to settle.
    /// Outcomes land in the view state; a superseded response is dropped.
    pub async fn refresh(&self) {
        self.inner.fetch_once().await;
    }

    /// Create a record optimistically and submit it.
    ///
    /// A provisional row (temporary id, flagged in the view state) shows
    /// immediately; on success it is swapped in place for the record the
    /// server returned, on failure it is removed again and the error is
    /// surfaced. Returns the authoritative record.
    pub async fn create(&self, draft: R::Draft) -> Result<R, ServiceError> {
        self.inner.create(draft).await
    }

    /// Update a record optimistically and submit it.
    ///
    /// The row shows `merged(&draft)` while the call is in flight. A
    /// server-returned record replaces the merge; `Ok(None)` lets the merge
    /// stand; failure restores the prior record in place. `NotFound` means
    /// the row is gone server-side: no rollback, a resync fetch is
    /// requested instead.
    pub async fn update(&self, id: R::Id, draft: R::Draft) -> Result<Option<R>, ServiceError> {
        self.inner.update(id, draft).await
    }

    /// Delete a record optimistically and submit it.
    ///
    /// The row disappears immediately; failure re-inserts it at its
    /// original index. `NotFound` keeps it gone and requests a resync
    /// fetch.
    pub async fn delete(&self, id: R::Id) -> Result<(), ServiceError> {
        self.inner.delete(id).await
    }

    /// Observation loop: one initial fetch, then a refetch per query
    /// change. Search edits wait out the debounce window and coalesce;
    /// everything else refetches immediately. Several fetches may be in
    /// flight at once; the request token decides which response lands.
    ///
    /// Spawn once at mount; exits on [`detach`](Self::detach).
    pub async fn run(&self) {
        let mut query_changes = self.inner.query_signal.subscribe();
        let mut seen = *query_changes.borrow_and_update();
        if seen.closed {
            return;
        }

        let mut in_flight: FuturesUnordered<BoxFuture<'static, ()>> = FuturesUnordered::new();
        in_flight.push(self.fetch_task());
        let mut debounce_deadline: Option<Instant> = None;

        loop {
            let wake_at = debounce_deadline.unwrap_or_else(Instant::now);
            tokio::select! {
                changed = query_changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let signal = *query_changes.borrow_and_update();
                    if signal.closed {
                        break;
                    }
                    if signal.immediate_generation != seen.immediate_generation {
                        // an immediate fetch reads the full current query,
                        // covering any search edit still waiting out its window
                        debounce_deadline = None;
                        in_flight.push(self.fetch_task());
                    } else if signal.generation != seen.generation {
                        debounce_deadline = Some(Instant::now() + self.inner.options.search_debounce);
                    }
                    seen = signal;
                }
                _ = sleep_until(wake_at), if debounce_deadline.is_some() => {
                    debounce_deadline = None;
                    in_flight.push(self.fetch_task());
                }
                Some(()) = in_flight.next(), if !in_flight.is_empty() => {}
            }
        }
    }

    /// Read-only projection for the rendering layer, derived on demand.
    pub fn view_state(&self) -> ViewState<R> {
        let state = self.inner.state.lock();
        let page_count = state.snapshot.page_count(state.query.page_size);
        ViewState {
            items: state.snapshot.records.clone(),
            loading: state.loading,
            loaded: state.loaded,
            error: state.error.clone(),
            page: state.query.page_index,
            page_size: state.query.page_size,
            page_count,
            total_count: state.snapshot.total_count,
            submitting: state.pending.iter().map(|p| p.target().clone()).collect(),
            provisional: state
                .pending
                .iter()
                .filter(|p| p.is_create())
                .map(|p| p.target().clone())
                .collect(),
        }
    }

    /// Receiver that changes whenever the view state may have changed.
    /// Await it, then re-read [`view_state`](Self::view_state).
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.version.subscribe()
    }

    /// Unmount: outstanding responses are discarded from here on, in-flight
    /// mutations settle in the background without touching state, and the
    /// [`run`](Self::run) loop exits. Idempotent.
    pub fn detach(&self) {
        {
            let mut state = self.inner.state.lock();
            if state.detached {
                return;
            }
            state.detached = true;
        }
        self.inner.query_signal.send_modify(|signal| signal.closed = true);
        self.inner.bump_version();
        log::debug!("collection controller detached");
    }

    pub fn is_detached(&self) -> bool {
        self.inner.state.lock().detached
    }

    fn fetch_task(&self) -> BoxFuture<'static, ()> {
        let inner = Arc::clone(&self.inner);
        async move { inner.fetch_once().await }.boxed()
    }
}

impl<R: Record> Inner<R> {
    fn bump_version(&self) {
        self.version.send_modify(|v| *v += 1);
    }

    fn signal_query_change(&self, change: QueryChange) {
        self.query_signal.send_modify(|signal| {
            signal.generation += 1;
            if change == QueryChange::Immediate {
                signal.immediate_generation += 1;
            }
        });
        self.bump_version();
    }

    /// Ask the observation loop for an immediate refetch. Inert when no
    /// loop is running; callers then hold an error result to act on.
    fn request_refetch(&self) {
        self.signal_query_change(QueryChange::Immediate);
    }

    fn edit_query(&self, change: QueryChange, edit: impl FnOnce(&mut Query) -> bool) -> bool {
        let changed = {
            let mut state = self.state.lock();
            if state.detached {
                return false;
            }
            edit(&mut state.query)
        };
        if changed {
            self.signal_query_change(change);
        }
        changed
    }

    fn go_to_page(&self, index: usize) -> bool {
        let changed = {
            let mut state = self.state.lock();
            if state.detached {
                return false;
            }
            let page_count = state.snapshot.page_count(state.query.page_size);
            state.query.go_to_page(index, page_count)
        };
        if changed {
            self.signal_query_change(QueryChange::Immediate);
        }
        changed
    }

    async fn fetch_once(&self) {
        let (token, query) = {
            let mut state = self.state.lock();
            if state.detached {
                return;
            }
            let token = state.last_token.next();
            state.last_token = token;
            state.loading = true;
            state.error = None;
            (token, state.query.clone())
        };
        self.bump_version();
        log::debug!(
            "list fetch {token} started (page {}, search {:?})",
            query.page_index,
            query.search
        );

        let result = self.service.list(&query).await;

        let mut fetch_error = None;
        {
            let mut state = self.state.lock();
            if state.detached || state.last_token != token {
                log::debug!("list fetch {token} superseded, result dropped");
                return;
            }
            match result {
                Ok(page) => {
                    let mut snapshot = CollectionSnapshot::from_page(page, token);
                    // carry still-pending optimistic edits over to the new base
                    for applied in 0..state.pending.len() {
                        let (earlier, rest) = state.pending.split_at_mut(applied);
                        snapshot = rest[0].apply(snapshot, earlier);
                    }
                    state.snapshot = snapshot;
                    state.loading = false;
                    state.loaded = true;
                }
                Err(error) => {
                    // previous records stay visible; retry is another refresh
                    log::debug!(
                        "list fetch {token} failed, keeping snapshot of fetch {}",
                        state.snapshot.fetched_at_token
                    );
                    state.loading = false;
                    state.error = Some(error.clone());
                    fetch_error = Some(error);
                }
            }
        }

        match fetch_error {
            Some(error) => {
                log::warn!("list fetch {token} failed: {error}");
                self.notifier.fetch_failed(&error);
            }
            None => log::debug!("list fetch {token} landed"),
        }
        self.bump_version();
    }

    fn gate(&self, id: &R::Id) -> Arc<tokio::sync::Mutex<()>> {
        let mut gates = self.gates.lock();
        gates
            .entry(id.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    fn release_idle_gates(&self) {
        // a gate referenced by nothing but the map has no holder or waiter
        self.gates.lock().retain(|_, gate| Arc::strong_count(gate) > 1);
    }

    fn next_seq(&self) -> u64 {
        self.mutation_seq.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Apply the optimistic change and enter it into the pending ledger.
    /// Returns false without touching anything when detached.
    fn stage(&self, mut pending: PendingMutation<R>) -> bool {
        let mut state = self.state.lock();
        if state.detached {
            return false;
        }
        let snapshot = std::mem::take(&mut state.snapshot);
        let staged = pending.apply(snapshot, &state.pending);
        state.snapshot = staged;
        state.pending.push(pending);
        true
    }

    fn take_pending(state: &mut ListState<R>, seq: u64) -> Option<PendingMutation<R>> {
        state
            .pending
            .iter()
            .position(|p| p.seq() == seq)
            .map(|index| state.pending.remove(index))
    }

    async fn create(&self, draft: R::Draft) -> Result<R, ServiceError> {
        let provisional = R::provisional(&draft);
        let gate = self.gate(&provisional.id());
        let guard = gate.lock().await;

        let seq = self.next_seq();
        if self.stage(PendingMutation::create(seq, provisional)) {
            self.bump_version();
        }

        let result = self.service.create(&draft).await;

        let notify = {
            let mut state = self.state.lock();
            let pending = Self::take_pending(&mut state, seq);
            let live = !state.detached;
            if live {
                if let Some(pending) = pending {
                    match &result {
                        Ok(record) => {
                            if let Some(index) = state.snapshot.position_of(pending.target()) {
                                let snapshot = std::mem::take(&mut state.snapshot);
                                state.snapshot = match snapshot.position_of(&record.id()) {
                                    // a fetch already brought the stored row in
                                    Some(existing) if existing != index => {
                                        snapshot.with_removed(index)
                                    }
                                    _ => snapshot.with_replaced(index, record.clone()),
                                };
                            }
                        }
                        Err(error) => {
                            let snapshot = std::mem::take(&mut state.snapshot);
                            let restored = pending.roll_back(snapshot, &state.pending);
                            state.snapshot = restored;
                            state.error = Some(error.clone());
                        }
                    }
                }
            }
            live
        };

        drop(guard);
        drop(gate);
        self.release_idle_gates();

        if let Err(error) = &result {
            log::warn!("create failed: {error}");
            if notify {
                self.notifier.mutation_failed(MutationKind::Create, error);
            }
        }
        self.bump_version();
        result
    }

    async fn update(&self, id: R::Id, draft: R::Draft) -> Result<Option<R>, ServiceError> {
        let gate = self.gate(&id);
        let guard = gate.lock().await;

        let seq = self.next_seq();
        if self.stage(PendingMutation::update(seq, id.clone(), draft.clone())) {
            self.bump_version();
        }

        let result = self.service.update(&id, &draft).await;

        let mut desynced = false;
        let notify = {
            let mut state = self.state.lock();
            let pending = Self::take_pending(&mut state, seq);
            let live = !state.detached;
            if live {
                if let Some(pending) = pending {
                    match &result {
                        Ok(Some(record)) => {
                            if let Some(index) = state.snapshot.position_of(&id) {
                                let snapshot = std::mem::take(&mut state.snapshot);
                                state.snapshot = snapshot.with_replaced(index, record.clone());
                            }
                        }
                        // acknowledged without a body: the merge stands
                        Ok(None) => {}
                        Err(error) if error.is_not_found() => {
                            // row is gone server-side; the resync fetch will
                            // correct whatever the merge shows meanwhile
                            desynced = true;
                            state.error = Some(error.clone());
                        }
                        Err(error) => {
                            let snapshot = std::mem::take(&mut state.snapshot);
                            let restored = pending.roll_back(snapshot, &state.pending);
                            state.snapshot = restored;
                            state.error = Some(error.clone());
                        }
                    }
                }
            }
            live
        };

        drop(guard);
        drop(gate);
        self.release_idle_gates();

        if let Err(error) = &result {
            log::warn!("update failed: {error}");
            if notify {
                self.notifier.mutation_failed(MutationKind::Update, error);
                if desynced {
                    self.notifier.out_of_sync();
                    self.request_refetch();
                }
            }
        }
        self.bump_version();
        result
    }

    async fn delete(&self, id: R::Id) -> Result<(), ServiceError> {
        let gate = self.gate(&id);
        let guard = gate.lock().await;

        let seq = self.next_seq();
        if self.stage(PendingMutation::delete(seq, id.clone())) {
            self.bump_version();
        }

        let result = self.service.remove(&id).await;

        let mut desynced = false;
        let notify = {
            let mut state = self.state.lock();
            let pending = Self::take_pending(&mut state, seq);
            let live = !state.detached;
            if live {
                if let Some(pending) = pending {
                    match &result {
                        // the row already left the snapshot optimistically
                        Ok(()) => {}
                        Err(error) if error.is_not_found() => {
                            // it was already gone server-side too; keep it gone
                            desynced = true;
                            state.error = Some(error.clone());
                        }
                        Err(error) => {
                            let snapshot = std::mem::take(&mut state.snapshot);
                            let restored = pending.roll_back(snapshot, &state.pending);
                            state.snapshot = restored;
                            state.error = Some(error.clone());
                        }
                    }
                }
            }
            live
        };

        drop(guard);
        drop(gate);
        self.release_idle_gates();

        if let Err(error) = &result {
            log::warn!("delete failed: {error}");
            if notify {
                self.notifier.mutation_failed(MutationKind::Delete, error);
                if desynced {
                    self.notifier.out_of_sync();
                    self.request_refetch();
                }
            }
        }
        self.bump_version();
        result
    }
}
