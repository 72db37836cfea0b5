//! Conflict detection for batches of list changes.
//!
//! A batch of structural changes is applied as one incremental animation
//! unless it holds a collision:
//!
//! - two removals of the same row
//! - a move whose source or destination is a row any other change touches
//! - two insertions at the same row
//! - two updates of the same row
//!
//! Any collision turns the whole batch into a reload from the final item
//! list. Other pairs, such as a removal and an insertion at one row, are
//! applied in order.
//!
//! Row indices are relative to the list before the batch, so earlier
//! removals do not shift the rows of later ones.

use std::collections::HashMap;

use crate::list::{ListItem, ViewChange};

/// One structural change, by row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListChange {
    /// A row was inserted.
    Insert {
        /// Inserted row.
        index: usize,
    },
    /// A row was removed.
    Remove {
        /// Removed row.
        index: usize,
    },
    /// A row moved.
    Move {
        /// Source row.
        from: usize,
        /// Destination row.
        to: usize,
    },
    /// A row changed in place.
    Update {
        /// Changed row.
        index: usize,
    },
}

impl ListChange {
    fn rows(&self) -> impl Iterator<Item = usize> {
        let (first, second) = match *self {
            Self::Insert { index } | Self::Remove { index } | Self::Update { index } => {
                (index, None)
            }
            Self::Move { from, to } if from == to => (from, None),
            Self::Move { from, to } => (from, Some(to)),
        };
        std::iter::once(first).chain(second)
    }
}

/// Two changes of a batch that touch the same row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conflict {
    /// The contested row.
    pub index: usize,
    /// The earlier change.
    pub first: ListChange,
    /// The later change.
    pub second: ListChange,
}

/// How a batch should be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchPlan {
    /// Apply every change in order.
    Incremental(Vec<ListChange>),
    /// Discard the deltas and render the final list.
    Reload,
}

impl BatchPlan {
    /// Whether the batch must be reloaded.
    pub fn is_reload(&self) -> bool {
        matches!(self, Self::Reload)
    }
}

/// Decides between incremental apply and full reload.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffConflictDetector;

impl DiffConflictDetector {
    /// The first colliding pair of changes, if any.
    pub fn find_conflict(changes: &[ListChange]) -> Option<Conflict> {
        let mut removed: HashMap<usize, ListChange> = HashMap::new();
        let mut inserted: HashMap<usize, ListChange> = HashMap::new();
        let mut updated: HashMap<usize, ListChange> = HashMap::new();
        let mut moved: HashMap<usize, ListChange> = HashMap::new();
        let mut touched: HashMap<usize, ListChange> = HashMap::new();

        for change in changes {
            for row in change.rows() {
                let earlier = match change {
                    ListChange::Move { .. } => touched.get(&row),
                    ListChange::Remove { .. } => moved.get(&row).or_else(|| removed.get(&row)),
                    ListChange::Insert { .. } => moved.get(&row).or_else(|| inserted.get(&row)),
                    ListChange::Update { .. } => moved.get(&row).or_else(|| updated.get(&row)),
                };
                if let Some(first) = earlier {
                    return Some(Conflict {
                        index: row,
                        first: *first,
                        second: *change,
                    });
                }
            }

            let claimed = match change {
                ListChange::Remove { .. } => &mut removed,
                ListChange::Insert { .. } => &mut inserted,
                ListChange::Update { .. } => &mut updated,
                ListChange::Move { .. } => &mut moved,
            };
            for row in change.rows() {
                claimed.entry(row).or_insert(*change);
                touched.entry(row).or_insert(*change);
            }
        }

        None
    }

    /// Plan a batch of changes.
    pub fn plan_batch(changes: Vec<ListChange>) -> BatchPlan {
        match Self::find_conflict(&changes) {
            Some(_) => BatchPlan::Reload,
            None => BatchPlan::Incremental(changes),
        }
    }

    /// Plan a batch of emitted view changes.
    ///
    /// Returns `None` for a batch that carries no list. Otherwise the plan
    /// comes with the list after the last change; a `Reloaded` anywhere in
    /// the batch forces a reload.
    pub fn plan_view_changes<T: Clone>(
        changes: &[ViewChange<T>],
    ) -> Option<(BatchPlan, Vec<ListItem<T>>)> {
        let items = changes.iter().rev().find_map(ViewChange::items)?.to_vec();

        let mut deltas = Vec::new();
        for change in changes {
            match change {
                ViewChange::Reloaded { .. } => return Some((BatchPlan::Reload, items)),
                ViewChange::ItemInserted { row, .. } => {
                    deltas.push(ListChange::Insert { index: *row })
                }
                ViewChange::ItemRemoved { row, .. } => {
                    deltas.push(ListChange::Remove { index: *row })
                }
                ViewChange::ItemUpdated { rows, .. } => {
                    deltas.extend(rows.iter().map(|&index| ListChange::Update { index }))
                }
                ViewChange::ItemMoved { from, to, .. } => deltas.push(ListChange::Move {
                    from: *from,
                    to: *to,
                }),
                ViewChange::None | ViewChange::Error { .. } => {}
            }
        }

        Some((Self::plan_batch(deltas), items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insert(index: usize) -> ListChange {
        ListChange::Insert { index }
    }

    fn remove(index: usize) -> ListChange {
        ListChange::Remove { index }
    }

    fn update(index: usize) -> ListChange {
        ListChange::Update { index }
    }

    fn mv(from: usize, to: usize) -> ListChange {
        ListChange::Move { from, to }
    }

    #[test]
    fn remove_and_move_from_same_row_conflict() {
        let batch = vec![remove(3), mv(3, 4)];
        let conflict = DiffConflictDetector::find_conflict(&batch).unwrap();

        assert_eq!(conflict.index, 3);
        assert_eq!(conflict.first, remove(3));
        assert_eq!(conflict.second, mv(3, 4));
        assert!(DiffConflictDetector::plan_batch(batch).is_reload());
    }

    #[test]
    fn two_removals_of_same_row_conflict() {
        let batch = vec![remove(1), remove(3), remove(3)];
        let conflict = DiffConflictDetector::find_conflict(&batch).unwrap();

        assert_eq!(conflict.index, 3);
        assert!(DiffConflictDetector::plan_batch(batch).is_reload());
    }

    #[test]
    fn adjacent_removals_apply_incrementally() {
        let batch = vec![remove(3), remove(4), remove(2)];
        assert!(!DiffConflictDetector::plan_batch(batch).is_reload());
    }

    #[test]
    fn remove_and_insert_at_same_row_apply_incrementally() {
        let batch = vec![remove(3), insert(3)];
        assert_eq!(
            DiffConflictDetector::plan_batch(batch.clone()),
            BatchPlan::Incremental(batch)
        );
    }

    #[test]
    fn update_then_remove_of_same_row_apply_incrementally() {
        assert!(DiffConflictDetector::find_conflict(&[update(2), remove(2)]).is_none());
    }

    #[test]
    fn change_after_move_onto_its_row_conflicts() {
        let conflict = DiffConflictDetector::find_conflict(&[mv(1, 4), remove(4)]).unwrap();
        assert_eq!(conflict.first, mv(1, 4));
        assert_eq!(conflict.second, remove(4));
    }

    #[test]
    fn insert_and_move_source_conflict() {
        assert!(DiffConflictDetector::plan_batch(vec![insert(3), mv(3, 4)]).is_reload());
    }

    #[test]
    fn move_destination_collides_with_update() {
        assert!(DiffConflictDetector::plan_batch(vec![mv(5, 0), update(0)]).is_reload());
    }

    #[test]
    fn two_inserts_at_same_row_conflict() {
        let batch = vec![update(2), insert(3), insert(3)];
        assert!(DiffConflictDetector::plan_batch(batch).is_reload());
    }

    #[test]
    fn two_updates_at_same_row_conflict() {
        assert!(DiffConflictDetector::plan_batch(vec![update(3), insert(2), update(3)]).is_reload());
    }

    #[test]
    fn distinct_rows_apply_incrementally() {
        let batch = vec![update(1), update(2), insert(3), remove(4)];
        assert_eq!(
            DiffConflictDetector::plan_batch(batch.clone()),
            BatchPlan::Incremental(batch)
        );
    }

    #[test]
    fn move_in_place_does_not_conflict_with_itself() {
        assert!(DiffConflictDetector::find_conflict(&[mv(2, 2)]).is_none());
    }

    #[test]
    fn empty_batch_is_incremental() {
        assert_eq!(
            DiffConflictDetector::plan_batch(vec![]),
            BatchPlan::Incremental(vec![])
        );
    }

    #[test]
    fn view_change_batch_uses_last_list() {
        let first: Vec<ListItem<u8>> = vec![ListItem::Channel(1), ListItem::Channel(2)];
        let last: Vec<ListItem<u8>> = vec![ListItem::Channel(2), ListItem::Channel(1)];
        let changes = vec![
            ViewChange::ItemUpdated {
                rows: vec![0],
                messages: vec![],
                items: first,
            },
            ViewChange::ItemMoved {
                from: 1,
                to: 0,
                items: last,
            },
        ];

        let (plan, items) = DiffConflictDetector::plan_view_changes(&changes).unwrap();
        assert!(plan.is_reload());
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn view_change_batch_with_reload_reloads() {
        let changes: Vec<ViewChange<u8>> = vec![
            ViewChange::Reloaded {
                row: 0,
                items: vec![ListItem::Channel(1)],
            },
            ViewChange::ItemUpdated {
                rows: vec![1],
                messages: vec![],
                items: vec![ListItem::Channel(1), ListItem::Loading],
            },
        ];

        let (plan, _) = DiffConflictDetector::plan_view_changes(&changes).unwrap();
        assert!(plan.is_reload());
    }

    #[test]
    fn view_change_batch_without_lists_is_none() {
        let changes: Vec<ViewChange<u8>> = vec![
            ViewChange::None,
            ViewChange::Error {
                message: "offline".into(),
            },
        ];
        assert!(DiffConflictDetector::plan_view_changes(&changes).is_none());
    }
}
