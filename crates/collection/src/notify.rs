use contracts::ServiceError;

use crate::pending::MutationKind;

/// Side-effect hooks for list-level outcomes.
///
/// The controller reports what happened; what a toast says, or whether one
/// is shown at all, stays with the renderer. Hooks are invoked outside the
/// controller's internal lock, so implementations may call back into it.
pub trait ListNotifier: Send + Sync {
    /// A list fetch settled with an error; the previous items stay visible.
    fn fetch_failed(&self, error: &ServiceError) {
        let _ = error;
    }

    /// A mutation settled with an error. Its optimistic change was rolled
    /// back, except on `NotFound` where a resync fetch corrects the state
    /// instead.
    fn mutation_failed(&self, kind: MutationKind, error: &ServiceError) {
        let _ = (kind, error);
    }

    /// A mutation targeted a record the server no longer has; a resync
    /// fetch has already been requested.
    fn out_of_sync(&self) {}
}

/// Ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl ListNotifier for NoopNotifier {}

/// Forwards notifications to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl ListNotifier for LogNotifier {
    fn fetch_failed(&self, error: &ServiceError) {
        log::warn!("list fetch failed: {error}");
    }

    fn mutation_failed(&self, kind: MutationKind, error: &ServiceError) {
        log::warn!("{kind} failed: {error}");
    }

    fn out_of_sync(&self) {
        log::warn!("local list out of sync with server, refetching");
    }
}
