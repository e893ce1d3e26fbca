//! Array-backed singly linked list sorted by variable id.

use std::mem::size_of;

use super::{RowVariables, Terms, EPSILON, NONE};
use crate::variable::{RowRef, VariableTable};

const INITIAL_SIZE: usize = 8;

/// Sparse row terms kept in three parallel arrays.
///
/// `untouched` is the first slot not written since the last clear. Slots past
/// it may hold stale ids, so clearing only resets counters and never refills
/// the arrays; freed slots below it are marked [`NONE`].
#[derive(Debug, Clone)]
pub struct ArrayLinkedVariables {
    owner: RowRef,
    ids: Vec<usize>,
    values: Vec<f32>,
    next: Vec<usize>,
    head: usize,
    len: usize,
    untouched: usize,
    last_freed: Option<usize>,
}

impl Default for ArrayLinkedVariables {
    fn default() -> Self {
        Self::new()
    }
}

impl ArrayLinkedVariables {
    pub fn new() -> Self {
        Self {
            owner: RowRef::Detached,
            ids: vec![NONE; INITIAL_SIZE],
            values: vec![0.0; INITIAL_SIZE],
            next: vec![NONE; INITIAL_SIZE],
            head: NONE,
            len: 0,
            untouched: 0,
            last_freed: None,
        }
    }

    /// Number of allocated slots.
    pub fn capacity(&self) -> usize {
        self.ids.len()
    }

    /// Slot holding `id` (if any) and the slot of its sorted predecessor.
    fn find(&self, id: usize) -> (Option<usize>, usize) {
        let mut previous = NONE;
        let mut current = self.head;
        while current != NONE {
            let current_id = self.ids[current];
            if current_id == id {
                return (Some(current), previous);
            }
            if current_id > id {
                break;
            }
            previous = current;
            current = self.next[current];
        }
        (None, previous)
    }

    fn free_slot(&mut self) -> usize {
        if let Some(slot) = self.last_freed.take() {
            if self.ids[slot] == NONE {
                return slot;
            }
        }
        if self.untouched < self.ids.len() {
            self.untouched += 1;
            return self.untouched - 1;
        }
        if self.len < self.ids.len() {
            if let Some(slot) = self.ids.iter().position(|&id| id == NONE) {
                return slot;
            }
        }
        let slot = self.ids.len();
        let size = slot * 2;
        self.ids.resize(size, NONE);
        self.values.resize(size, 0.0);
        self.next.resize(size, NONE);
        self.untouched = slot + 1;
        slot
    }

    fn insert(&mut self, vars: &mut VariableTable, id: usize, value: f32, previous: usize) {
        let slot = self.free_slot();
        self.ids[slot] = id;
        self.values[slot] = value;
        if previous == NONE {
            self.next[slot] = self.head;
            self.head = slot;
        } else {
            self.next[slot] = self.next[previous];
            self.next[previous] = slot;
        }
        self.len += 1;
        vars.attach(id, self.owner);
    }

    fn unlink(&mut self, slot: usize, previous: usize) {
        if previous == NONE {
            self.head = self.next[slot];
        } else {
            self.next[previous] = self.next[slot];
        }
        self.ids[slot] = NONE;
        self.len -= 1;
        self.last_freed = Some(slot);
    }

    fn for_each_value(&mut self, mut f: impl FnMut(&mut f32)) {
        let mut current = self.head;
        while current != NONE {
            f(&mut self.values[current]);
            current = self.next[current];
        }
    }
}

impl RowVariables for ArrayLinkedVariables {
    fn len(&self) -> usize {
        self.len
    }

    fn terms(&self) -> Terms<'_> {
        Terms::new(&self.ids, &self.values, &self.next, self.head, self.len)
    }

    fn slot_of(&self, id: usize) -> Option<usize> {
        self.find(id).0
    }

    fn get(&self, id: usize) -> f32 {
        self.slot_of(id).map_or(0.0, |slot| self.values[slot])
    }

    fn put(&mut self, vars: &mut VariableTable, id: usize, value: f32) {
        if value == 0.0 {
            self.remove(vars, id, true);
            return;
        }
        match self.find(id) {
            (Some(slot), _) => self.values[slot] = value,
            (None, previous) => self.insert(vars, id, value, previous),
        }
    }

    fn add(&mut self, vars: &mut VariableTable, id: usize, value: f32, remove_from_definition: bool) {
        if value.abs() < EPSILON {
            return;
        }
        match self.find(id) {
            (Some(slot), previous) => {
                let sum = self.values[slot] + value;
                if sum.abs() < EPSILON {
                    self.unlink(slot, previous);
                    vars.detach(id, self.owner, remove_from_definition);
                } else {
                    self.values[slot] = sum;
                }
            }
            (None, previous) => self.insert(vars, id, value, previous),
        }
    }

    fn remove(&mut self, vars: &mut VariableTable, id: usize, remove_from_definition: bool) -> f32 {
        match self.find(id) {
            (Some(slot), previous) => {
                let value = self.values[slot];
                self.unlink(slot, previous);
                vars.detach(id, self.owner, remove_from_definition);
                value
            }
            (None, _) => 0.0,
        }
    }

    fn clear(&mut self, vars: &mut VariableTable) {
        for (id, _) in self.terms() {
            vars.detach(id, self.owner, true);
        }
        self.discard();
    }

    fn discard(&mut self) {
        self.head = NONE;
        self.len = 0;
        self.untouched = 0;
        self.last_freed = None;
    }

    fn invert(&mut self) {
        self.for_each_value(|value| *value = -*value);
    }

    fn divide_by_amount(&mut self, amount: f32) {
        self.for_each_value(|value| *value /= amount);
    }

    fn owner(&self) -> RowRef {
        self.owner
    }

    fn set_owner(&mut self, owner: RowRef) {
        self.owner = owner;
    }

    fn size_in_bytes(&self) -> usize {
        self.ids.len() * (2 * size_of::<usize>() + size_of::<f32>()) + 4 * size_of::<usize>()
    }
}
