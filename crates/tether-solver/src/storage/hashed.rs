//! Sorted, doubly linked term list with a fixed hash index.

use std::mem::size_of;

use super::{RowVariables, Terms, EPSILON, NONE};
use crate::variable::{RowRef, VariableTable};

const HASH_SIZE: usize = 16;
const INITIAL_SIZE: usize = 16;

/// Sparse row terms with O(1)-ish lookup.
///
/// Buckets are `id % 16`; colliding slots are chained through `next_keys`.
#[derive(Debug, Clone)]
pub struct SolverVariableValues {
    owner: RowRef,
    keys: [usize; HASH_SIZE],
    next_keys: Vec<usize>,
    ids: Vec<usize>,
    values: Vec<f32>,
    previous: Vec<usize>,
    next: Vec<usize>,
    count: usize,
    head: usize,
}

impl Default for SolverVariableValues {
    fn default() -> Self {
        Self::new()
    }
}

impl SolverVariableValues {
    pub fn new() -> Self {
        Self {
            owner: RowRef::Detached,
            keys: [NONE; HASH_SIZE],
            next_keys: vec![NONE; INITIAL_SIZE],
            ids: vec![NONE; INITIAL_SIZE],
            values: vec![0.0; INITIAL_SIZE],
            previous: vec![NONE; INITIAL_SIZE],
            next: vec![NONE; INITIAL_SIZE],
            count: 0,
            head: NONE,
        }
    }

    pub fn capacity(&self) -> usize {
        self.ids.len()
    }

    fn grow(&mut self) {
        let size = self.ids.len() * 2;
        self.next_keys.resize(size, NONE);
        self.ids.resize(size, NONE);
        self.values.resize(size, 0.0);
        self.previous.resize(size, NONE);
        self.next.resize(size, NONE);
    }

    fn empty_slot(&mut self) -> usize {
        if self.count + 1 >= self.ids.len() {
            self.grow();
        }
        match self.ids.iter().position(|&id| id == NONE) {
            Some(slot) => slot,
            None => {
                let slot = self.ids.len();
                self.grow();
                slot
            }
        }
    }

    fn add_to_hash(&mut self, id: usize, slot: usize) {
        let bucket = id % HASH_SIZE;
        let mut key = self.keys[bucket];
        if key == NONE {
            self.keys[bucket] = slot;
        } else {
            while self.next_keys[key] != NONE {
                key = self.next_keys[key];
            }
            self.next_keys[key] = slot;
        }
        self.next_keys[slot] = NONE;
    }

    fn remove_from_hash(&mut self, id: usize, slot: usize) {
        let bucket = id % HASH_SIZE;
        let mut key = self.keys[bucket];
        if key == slot {
            self.keys[bucket] = self.next_keys[slot];
        } else {
            while key != NONE && self.next_keys[key] != slot {
                key = self.next_keys[key];
            }
            if key != NONE {
                self.next_keys[key] = self.next_keys[slot];
            }
        }
        self.next_keys[slot] = NONE;
    }

    /// Slot of the largest id below `id`.
    fn predecessor(&self, id: usize) -> usize {
        let mut previous = NONE;
        let mut current = self.head;
        while current != NONE && self.ids[current] < id {
            previous = current;
            current = self.next[current];
        }
        previous
    }

    fn insert(&mut self, vars: &mut VariableTable, id: usize, value: f32) {
        let before = self.predecessor(id);
        let slot = self.empty_slot();
        self.ids[slot] = id;
        self.values[slot] = value;
        self.previous[slot] = before;
        if before == NONE {
            self.next[slot] = self.head;
            self.head = slot;
        } else {
            self.next[slot] = self.next[before];
            self.next[before] = slot;
        }
        if self.next[slot] != NONE {
            let after = self.next[slot];
            self.previous[after] = slot;
        }
        self.add_to_hash(id, slot);
        self.count += 1;
        vars.attach(id, self.owner);
    }

    fn for_each_value(&mut self, mut f: impl FnMut(&mut f32)) {
        let mut current = self.head;
        while current != NONE {
            f(&mut self.values[current]);
            current = self.next[current];
        }
    }
}

impl RowVariables for SolverVariableValues {
    fn len(&self) -> usize {
        self.count
    }

    fn terms(&self) -> Terms<'_> {
        Terms::new(&self.ids, &self.values, &self.next, self.head, self.count)
    }

    fn slot_of(&self, id: usize) -> Option<usize> {
        if self.count == 0 {
            return None;
        }
        let mut slot = self.keys[id % HASH_SIZE];
        while slot != NONE {
            if self.ids[slot] == id {
                return Some(slot);
            }
            slot = self.next_keys[slot];
        }
        None
    }

    fn get(&self, id: usize) -> f32 {
        self.slot_of(id).map_or(0.0, |slot| self.values[slot])
    }

    fn put(&mut self, vars: &mut VariableTable, id: usize, value: f32) {
        if value.abs() < EPSILON {
            self.remove(vars, id, true);
            return;
        }
        match self.slot_of(id) {
            Some(slot) => self.values[slot] = value,
            None => self.insert(vars, id, value),
        }
    }

    fn add(&mut self, vars: &mut VariableTable, id: usize, value: f32, remove_from_definition: bool) {
        if value.abs() < EPSILON {
            return;
        }
        match self.slot_of(id) {
            Some(slot) => {
                let sum = self.values[slot] + value;
                if sum.abs() < EPSILON {
                    self.remove(vars, id, remove_from_definition);
                } else {
                    self.values[slot] = sum;
                }
            }
            None => self.insert(vars, id, value),
        }
    }

    fn remove(&mut self, vars: &mut VariableTable, id: usize, remove_from_definition: bool) -> f32 {
        let Some(slot) = self.slot_of(id) else {
            return 0.0;
        };
        self.remove_from_hash(id, slot);
        let value = self.values[slot];
        let (before, after) = (self.previous[slot], self.next[slot]);
        if before == NONE {
            self.head = after;
        } else {
            self.next[before] = after;
        }
        if after != NONE {
            self.previous[after] = before;
        }
        self.ids[slot] = NONE;
        self.count -= 1;
        vars.detach(id, self.owner, remove_from_definition);
        value
    }

    fn clear(&mut self, vars: &mut VariableTable) {
        for (id, _) in self.terms() {
            vars.detach(id, self.owner, true);
        }
        self.discard();
    }

    fn discard(&mut self) {
        self.ids.fill(NONE);
        self.next_keys.fill(NONE);
        self.keys = [NONE; HASH_SIZE];
        self.count = 0;
        self.head = NONE;
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
        self.ids.len() * (4 * size_of::<usize>() + size_of::<f32>())
            + HASH_SIZE * size_of::<usize>()
    }
}
