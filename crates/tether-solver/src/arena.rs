//! Generational storage for rows.
//!
//! Variables point back at the rows using them through [`RowId`]s. A slot's
//! generation is bumped whenever its row is released, so an id kept past that
//! point no longer resolves.

use crate::row::ArrayRow;
use crate::storage::RowVariables;
use crate::variable::{RowId, RowRef};

#[derive(Debug)]
enum SlotState {
    Vacant,
    Occupied(ArrayRow),
    /// Temporarily moved out while another row is read alongside it
    Taken,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    state: SlotState,
}

#[derive(Debug, Default)]
pub struct RowArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl RowArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows currently allocated.
    pub fn len(&self) -> usize {
        self.live
    }

    fn slot(&self, id: RowId) -> Option<&Slot> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
    }

    fn slot_mut(&mut self, id: RowId) -> Option<&mut Slot> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
    }

    pub fn insert(&mut self, mut row: ArrayRow) -> RowId {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    state: SlotState::Vacant,
                });
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        let id = RowId {
            index,
            generation: slot.generation,
        };
        row.variables.set_owner(RowRef::Row(id));
        slot.state = SlotState::Occupied(row);
        self.live += 1;
        id
    }

    /// Whether `id` names an allocated row, taken or not.
    pub fn contains(&self, id: RowId) -> bool {
        self.slot(id)
            .is_some_and(|slot| !matches!(slot.state, SlotState::Vacant))
    }

    pub fn get(&self, id: RowId) -> Option<&ArrayRow> {
        match self.slot(id) {
            Some(Slot {
                state: SlotState::Occupied(row),
                ..
            }) => Some(row),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, id: RowId) -> Option<&mut ArrayRow> {
        match self.slot_mut(id) {
            Some(Slot {
                state: SlotState::Occupied(row),
                ..
            }) => Some(row),
            _ => None,
        }
    }

    /// Move the row out, keeping its slot reserved until [`restore`](Self::restore).
    pub fn take(&mut self, id: RowId) -> Option<ArrayRow> {
        let slot = self.slot_mut(id)?;
        match std::mem::replace(&mut slot.state, SlotState::Taken) {
            SlotState::Occupied(row) => Some(row),
            other => {
                slot.state = other;
                None
            }
        }
    }

    pub fn restore(&mut self, id: RowId, row: ArrayRow) {
        if let Some(slot) = self.slot_mut(id) {
            if matches!(slot.state, SlotState::Taken) {
                slot.state = SlotState::Occupied(row);
            }
        }
    }

    /// Release the slot and hand back its row.
    pub fn remove(&mut self, id: RowId) -> Option<ArrayRow> {
        let slot = self.slot_mut(id)?;
        let row = match std::mem::replace(&mut slot.state, SlotState::Vacant) {
            SlotState::Occupied(row) => Some(row),
            SlotState::Taken => None,
            SlotState::Vacant => return None,
        };
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        row
    }

    /// Release every slot, returning the rows that were present.
    pub fn drain(&mut self) -> Vec<ArrayRow> {
        let mut rows = Vec::with_capacity(self.live);
        self.free.clear();
        for (index, slot) in self.slots.iter_mut().enumerate().rev() {
            if let SlotState::Occupied(row) = std::mem::replace(&mut slot.state, SlotState::Vacant) {
                rows.push(row);
            }
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(index as u32);
        }
        self.live = 0;
        rows
    }
}
