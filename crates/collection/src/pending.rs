use std::fmt;

use contracts::Record;

use crate::snapshot::CollectionSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MutationKind::Create => "create",
            MutationKind::Update => "update",
            MutationKind::Delete => "delete",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
enum Staged<R: Record> {
    Create { provisional: R },
    Update { draft: R::Draft, saved: Option<(usize, R)> },
    Delete { saved: Option<(usize, R)> },
}

/// One optimistic mutation awaiting its remote outcome.
///
/// Applying the mutation records exactly what rollback needs: the prior
/// record and where it sat for update/delete, nothing for create (the
/// provisional row itself is the thing to remove). A delete remembers its
/// position in the coordinates of the fetched base, so rollbacks restore
/// the original order no matter which of several pending deletes settles
/// first. When a fresh fetch replaces the base snapshot while the mutation
/// is still pending, the delta is applied again on top of the new base and
/// the saved rollback state is refreshed along with it.
#[derive(Debug, Clone)]
pub struct PendingMutation<R: Record> {
    seq: u64,
    target: R::Id,
    staged: Staged<R>,
}

impl<R: Record> PendingMutation<R> {
    pub fn create(seq: u64, provisional: R) -> Self {
        Self {
            seq,
            target: provisional.id(),
            staged: Staged::Create { provisional },
        }
    }

    pub fn update(seq: u64, target: R::Id, draft: R::Draft) -> Self {
        Self {
            seq,
            target,
            staged: Staged::Update { draft, saved: None },
        }
    }

    pub fn delete(seq: u64, target: R::Id) -> Self {
        Self {
            seq,
            target,
            staged: Staged::Delete { saved: None },
        }
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn target(&self) -> &R::Id {
        &self.target
    }

    pub fn is_create(&self) -> bool {
        matches!(self.staged, Staged::Create { .. })
    }

    /// The base-coordinate slot of a staged delete, `None` for other kinds
    /// or when the target was not on the page.
    fn hidden_index(&self) -> Option<usize> {
        match &self.staged {
            Staged::Delete {
                saved: Some((index, _)),
            } => Some(*index),
            _ => None,
        }
    }

    /// Translate a visible position into base coordinates: every row a
    /// pending delete hides at or before the slot shifts it right by one.
    fn base_index(earlier: &[PendingMutation<R>], visible: usize) -> usize {
        let mut hidden: Vec<usize> = earlier
            .iter()
            .filter_map(PendingMutation::hidden_index)
            .collect();
        hidden.sort_unstable();
        let mut index = visible;
        for slot in hidden {
            if slot <= index {
                index += 1;
            }
        }
        index
    }

    /// Translate a base position back into the current list, skipping
    /// slots whose rows other pending deletes still hide.
    fn insertion_index(others: &[PendingMutation<R>], base: usize) -> usize {
        let hidden = others
            .iter()
            .filter_map(PendingMutation::hidden_index)
            .filter(|slot| *slot < base)
            .count();
        base - hidden
    }

    /// Apply the optimistic change, capturing rollback state as a side
    /// effect. `earlier` is the rest of the ledger, staged before this
    /// entry; deletes among it offset the saved index into base
    /// coordinates. A target absent from the snapshot applies no visible
    /// change and clears the saved state; the remote call proceeds
    /// regardless.
    pub fn apply(
        &mut self,
        snapshot: CollectionSnapshot<R>,
        earlier: &[PendingMutation<R>],
    ) -> CollectionSnapshot<R> {
        match &mut self.staged {
            Staged::Create { provisional } => snapshot.with_appended(provisional.clone()),
            Staged::Update { draft, saved } => match snapshot.position_of(&self.target) {
                Some(index) => {
                    let prior = snapshot.records[index].clone();
                    let merged = prior.merged(draft);
                    *saved = Some((index, prior));
                    snapshot.with_replaced(index, merged)
                }
                None => {
                    *saved = None;
                    snapshot
                }
            },
            Staged::Delete { saved } => match snapshot.position_of(&self.target) {
                Some(index) => {
                    let prior = snapshot.records[index].clone();
                    *saved = Some((Self::base_index(earlier, index), prior));
                    snapshot.with_removed(index)
                }
                None => {
                    *saved = None;
                    snapshot
                }
            },
        }
    }

    /// Undo the optimistic change exactly. The prior record of an update
    /// goes back at the row's current position; a deleted row returns to
    /// the slot it held in the fetched base, discounting rows that
    /// `others` (the entries still pending) keep hidden; a provisional
    /// create row is removed wherever it currently sits.
    pub fn roll_back(
        &self,
        snapshot: CollectionSnapshot<R>,
        others: &[PendingMutation<R>],
    ) -> CollectionSnapshot<R> {
        match &self.staged {
            Staged::Create { .. } => match snapshot.position_of(&self.target) {
                Some(index) => snapshot.with_removed(index),
                None => snapshot,
            },
            Staged::Update { saved, .. } => match (saved, snapshot.position_of(&self.target)) {
                (Some((_, prior)), Some(index)) => snapshot.with_replaced(index, prior.clone()),
                _ => snapshot,
            },
            Staged::Delete { saved } => match saved {
                Some((base, prior)) => {
                    let index = Self::insertion_index(others, *base);
                    snapshot.with_inserted(index, prior.clone())
                }
                None => snapshot,
            },
        }
    }
}
