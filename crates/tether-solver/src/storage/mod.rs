//! Sparse coefficient storage for rows.
//!
//! Both strategies keep their entries in an array-backed linked list sorted by
//! variable id, so iteration is always in ascending id order. They differ only
//! in how a single id is looked up.

mod hashed;
mod linked;

pub use hashed::SolverVariableValues;
pub use linked::ArrayLinkedVariables;

use tether_core::RowStorageKind;

use crate::row::ArrayRow;
use crate::variable::{RowRef, VariableTable};

/// Coefficients closer to zero than this are dropped on `add`.
pub const EPSILON: f32 = 0.001;

/// Empty slot or end-of-list marker.
pub(crate) const NONE: usize = usize::MAX;

/// Iterator over `(variable id, coefficient)` pairs in ascending id order.
#[derive(Debug, Clone)]
pub struct Terms<'a> {
    ids: &'a [usize],
    values: &'a [f32],
    next: &'a [usize],
    current: usize,
    remaining: usize,
}

impl<'a> Terms<'a> {
    pub(crate) fn new(
        ids: &'a [usize],
        values: &'a [f32],
        next: &'a [usize],
        head: usize,
        len: usize,
    ) -> Self {
        Self {
            ids,
            values,
            next,
            current: head,
            remaining: len,
        }
    }
}

impl Iterator for Terms<'_> {
    type Item = (usize, f32);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 || self.current == NONE {
            return None;
        }
        let slot = self.current;
        self.current = self.next[slot];
        self.remaining -= 1;
        Some((self.ids[slot], self.values[slot]))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

/// Sparse map from variable id to coefficient, owned by one row.
///
/// Methods that add or drop an entry keep the variable's usage count and
/// client list in `vars` in step with the row's contents.
pub trait RowVariables {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn terms(&self) -> Terms<'_>;

    /// Id of the `index`-th entry in ascending order.
    fn variable(&self, index: usize) -> Option<usize> {
        self.terms().nth(index).map(|(id, _)| id)
    }

    fn value_at(&self, index: usize) -> f32 {
        self.terms().nth(index).map_or(0.0, |(_, value)| value)
    }

    /// Physical slot holding `id`, if present.
    fn slot_of(&self, id: usize) -> Option<usize>;

    fn get(&self, id: usize) -> f32;

    fn contains(&self, id: usize) -> bool {
        self.slot_of(id).is_some()
    }

    /// Set the coefficient of `id`, removing the entry when `value` is zero.
    fn put(&mut self, vars: &mut VariableTable, id: usize, value: f32);

    /// Add to the coefficient of `id`, removing the entry if the sum vanishes.
    fn add(&mut self, vars: &mut VariableTable, id: usize, value: f32, remove_from_definition: bool);

    /// Remove `id` and return its coefficient (0 when absent).
    fn remove(&mut self, vars: &mut VariableTable, id: usize, remove_from_definition: bool) -> f32;

    /// Drop every entry, detaching this row from each variable.
    fn clear(&mut self, vars: &mut VariableTable);

    /// Drop every entry without touching the variables.
    fn discard(&mut self);

    fn invert(&mut self);

    fn divide_by_amount(&mut self, amount: f32);

    fn owner(&self) -> RowRef;

    fn set_owner(&mut self, owner: RowRef);

    fn size_in_bytes(&self) -> usize;

    /// Substitute `definition` for its key in place and return the
    /// coefficient the key had here.
    fn use_definition(
        &mut self,
        vars: &mut VariableTable,
        definition: &ArrayRow,
        remove_from_definition: bool,
    ) -> f32 {
        let Some(key) = definition.key else {
            return 0.0;
        };
        let value = self.get(key);
        if value == 0.0 {
            return 0.0;
        }
        self.remove(vars, key, remove_from_definition);
        for (id, coefficient) in definition.variables.terms() {
            self.add(vars, id, coefficient * value, remove_from_definition);
        }
        value
    }
}

/// Storage strategy selected by [`SolverConfig::storage`](tether_core::SolverConfig).
#[derive(Debug, Clone)]
pub enum RowStorage {
    Linked(ArrayLinkedVariables),
    Hashed(SolverVariableValues),
}

impl RowStorage {
    pub fn new(kind: RowStorageKind) -> Self {
        match kind {
            RowStorageKind::Linked => RowStorage::Linked(ArrayLinkedVariables::new()),
            RowStorageKind::Hashed => RowStorage::Hashed(SolverVariableValues::new()),
        }
    }

    pub fn kind(&self) -> RowStorageKind {
        match self {
            RowStorage::Linked(_) => RowStorageKind::Linked,
            RowStorage::Hashed(_) => RowStorageKind::Hashed,
        }
    }
}

macro_rules! dispatch {
    ($self:ident, $inner:ident => $body:expr) => {
        match $self {
            RowStorage::Linked($inner) => $body,
            RowStorage::Hashed($inner) => $body,
        }
    };
}

impl RowVariables for RowStorage {
    fn len(&self) -> usize {
        dispatch!(self, inner => inner.len())
    }

    fn terms(&self) -> Terms<'_> {
        dispatch!(self, inner => inner.terms())
    }

    fn slot_of(&self, id: usize) -> Option<usize> {
        dispatch!(self, inner => inner.slot_of(id))
    }

    fn get(&self, id: usize) -> f32 {
        dispatch!(self, inner => inner.get(id))
    }

    fn put(&mut self, vars: &mut VariableTable, id: usize, value: f32) {
        dispatch!(self, inner => inner.put(vars, id, value))
    }

    fn add(&mut self, vars: &mut VariableTable, id: usize, value: f32, remove_from_definition: bool) {
        dispatch!(self, inner => inner.add(vars, id, value, remove_from_definition))
    }

    fn remove(&mut self, vars: &mut VariableTable, id: usize, remove_from_definition: bool) -> f32 {
        dispatch!(self, inner => inner.remove(vars, id, remove_from_definition))
    }

    fn clear(&mut self, vars: &mut VariableTable) {
        dispatch!(self, inner => inner.clear(vars))
    }

    fn discard(&mut self) {
        dispatch!(self, inner => inner.discard())
    }

    fn invert(&mut self) {
        dispatch!(self, inner => inner.invert())
    }

    fn divide_by_amount(&mut self, amount: f32) {
        dispatch!(self, inner => inner.divide_by_amount(amount))
    }

    fn owner(&self) -> RowRef {
        dispatch!(self, inner => inner.owner())
    }

    fn set_owner(&mut self, owner: RowRef) {
        dispatch!(self, inner => inner.set_owner(owner))
    }

    fn size_in_bytes(&self) -> usize {
        dispatch!(self, inner => inner.size_in_bytes())
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::table;
    use super::*;
    use crate::variable::RowId;

    fn owner() -> RowRef {
        RowRef::Row(RowId {
            index: 0,
            generation: 0,
        })
    }

    fn both() -> [RowStorage; 2] {
        let mut linked = RowStorage::new(RowStorageKind::Linked);
        let mut hashed = RowStorage::new(RowStorageKind::Hashed);
        linked.set_owner(owner());
        hashed.set_owner(owner());
        [linked, hashed]
    }

    #[test]
    fn test_terms_are_sorted_by_id() {
        for mut storage in both() {
            let mut vars = table(40);
            for id in [17, 3, 33, 1, 9, 40, 2] {
                storage.put(&mut vars, id, id as f32);
            }
            let ids: Vec<usize> = storage.terms().map(|(id, _)| id).collect();
            assert_eq!(ids, vec![1, 2, 3, 9, 17, 33, 40]);
            assert_eq!(storage.variable(3), Some(9));
            assert_eq!(storage.value_at(4), 17.0);
        }
    }

    #[test]
    fn test_put_zero_removes() {
        for mut storage in both() {
            let mut vars = table(4);
            storage.put(&mut vars, 2, 1.5);
            storage.put(&mut vars, 2, 0.0);
            assert!(storage.is_empty());
            assert_eq!(vars[2].usage_in_row_count(), 0);
            assert!(vars[2].clients().is_empty());
        }
    }

    #[test]
    fn test_add_cancels_within_epsilon() {
        for mut storage in both() {
            let mut vars = table(4);
            storage.add(&mut vars, 1, 2.0, true);
            storage.add(&mut vars, 1, -1.9995, true);
            assert!(!storage.contains(1));

            storage.add(&mut vars, 3, 0.0005, true);
            assert!(storage.is_empty());
        }
    }

    #[test]
    fn test_remove_preserves_order() {
        for mut storage in both() {
            let mut vars = table(10);
            for id in 1..=10 {
                storage.put(&mut vars, id, 1.0);
            }
            assert_eq!(storage.remove(&mut vars, 5, true), 1.0);
            assert_eq!(storage.remove(&mut vars, 1, true), 1.0);
            assert_eq!(storage.remove(&mut vars, 6, true), 1.0);
            assert_eq!(storage.remove(&mut vars, 6, true), 0.0);

            storage.put(&mut vars, 5, 2.0);
            let ids: Vec<usize> = storage.terms().map(|(id, _)| id).collect();
            assert_eq!(ids, vec![2, 3, 4, 5, 7, 8, 9, 10]);
        }
    }

    #[test]
    fn test_use_definition_substitutes_in_place() {
        // row: 2 x1 + x3, definition: x1 = 4 + x2 - 3 x3
        for storage in both() {
            let mut vars = table(4);
            let mut row = ArrayRow::new(storage.kind());
            row.variables.set_owner(owner());
            row.variables.put(&mut vars, 1, 2.0);
            row.variables.put(&mut vars, 3, 1.0);

            let mut definition = ArrayRow::new(storage.kind());
            definition.key = Some(1);
            definition.constant = 4.0;
            definition.variables.put(&mut vars, 2, 1.0);
            definition.variables.put(&mut vars, 3, -3.0);

            let value = row.variables.use_definition(&mut vars, &definition, false);
            assert_eq!(value, 2.0);
            let terms: Vec<(usize, f32)> = row.variables.terms().collect();
            assert_eq!(terms, vec![(2, 2.0), (3, -5.0)]);
        }
    }

    #[test]
    fn test_clear_detaches_clients() {
        for mut storage in both() {
            let mut vars = table(6);
            for id in 1..=6 {
                storage.put(&mut vars, id, 1.0);
            }
            storage.clear(&mut vars);
            assert!(storage.is_empty());
            assert!(vars.iter().all(|v| v.clients().is_empty() && v.usage_in_row_count() == 0));

            storage.put(&mut vars, 4, 1.0);
            assert_eq!(storage.terms().collect::<Vec<_>>(), vec![(4, 1.0)]);
        }
    }

    #[test]
    fn test_invert_and_divide() {
        for mut storage in both() {
            let mut vars = table(3);
            storage.put(&mut vars, 1, 2.0);
            storage.put(&mut vars, 2, -4.0);
            storage.invert();
            storage.divide_by_amount(2.0);
            assert_eq!(storage.get(1), -1.0);
            assert_eq!(storage.get(2), 2.0);
        }
    }

    #[test]
    fn test_grows_past_initial_capacity() {
        for mut storage in both() {
            let mut vars = table(100);
            for id in (1..=100).rev() {
                storage.put(&mut vars, id, id as f32);
            }
            assert_eq!(storage.len(), 100);
            assert!(storage.terms().map(|(id, _)| id).eq(1..=100));
            assert_eq!(storage.get(64), 64.0);
        }
    }
}
