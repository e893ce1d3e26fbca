//! Unknowns of the linear system.
//!
//! Variables live in a [`VariableTable`] indexed by their dense id. Rows refer
//! to variables by id, and variables refer back to the rows using them through
//! [`RowRef`] arena handles, so neither side owns the other.

use std::fmt;
use std::ops::{Index, IndexMut};

use smallvec::SmallVec;
use tether_core::{VariableType, MAX_STRENGTH};

/// Handle to a variable, valid for one solver pass.
///
/// A handle taken before [`LinearSystem::reset`](crate::LinearSystem::reset)
/// is rejected afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Variable {
    pub(crate) id: usize,
    pub(crate) generation: u32,
}

impl Variable {
    /// Dense id of the variable within its pass.
    pub fn id(&self) -> usize {
        self.id
    }
}

/// Handle to a row slot in the row arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl RowId {
    pub fn index(&self) -> u32 {
        self.index
    }
}

/// A row that references a variable as a non-basic term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowRef {
    /// A row stored in the row arena
    Row(RowId),
    /// The system's priority goal row
    Goal,
    /// Not attached to anything yet
    Detached,
}

/// How a variable is currently resolved.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Resolution {
    /// Appears only as a term (or nowhere)
    #[default]
    Free,
    /// Key of the row at this index of the row table
    Basic { row: usize },
    /// Fixed to its computed value; no longer part of any row
    Final,
    /// Equal to another variable plus a delta
    Synonym { of: usize, delta: f32 },
}

/// A single unknown.
#[derive(Debug, Clone)]
pub struct SolverVariable {
    pub(crate) id: usize,
    pub(crate) name: Option<String>,
    pub(crate) prefix: Option<&'static str>,
    pub(crate) kind: VariableType,
    pub(crate) strength: usize,
    pub(crate) computed_value: f32,
    pub(crate) resolution: Resolution,
    pub(crate) strength_vector: [f32; MAX_STRENGTH],
    pub(crate) goal_strength_vector: [f32; MAX_STRENGTH],
    pub(crate) in_goal: bool,
    pub(crate) clients: SmallVec<[RowRef; 16]>,
    pub(crate) usage_in_row_count: usize,
}

impl SolverVariable {
    pub fn new(kind: VariableType) -> Self {
        Self {
            id: 0,
            name: None,
            prefix: None,
            kind,
            strength: 0,
            computed_value: 0.0,
            resolution: Resolution::Free,
            strength_vector: [0.0; MAX_STRENGTH],
            goal_strength_vector: [0.0; MAX_STRENGTH],
            in_goal: false,
            clients: SmallVec::new(),
            usage_in_row_count: 0,
        }
    }

    /// Return to the pooled `Unknown` state, keeping allocations.
    pub fn reset(&mut self) {
        self.id = 0;
        self.name = None;
        self.prefix = None;
        self.kind = VariableType::Unknown;
        self.strength = 0;
        self.computed_value = 0.0;
        self.resolution = Resolution::Free;
        self.strength_vector = [0.0; MAX_STRENGTH];
        self.goal_strength_vector = [0.0; MAX_STRENGTH];
        self.in_goal = false;
        self.clients.clear();
        self.usage_in_row_count = 0;
    }

    pub(crate) fn set_type(&mut self, kind: VariableType, prefix: Option<&'static str>) {
        self.kind = kind;
        self.prefix = prefix;
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn kind(&self) -> VariableType {
        self.kind
    }

    pub fn strength(&self) -> usize {
        self.strength
    }

    pub fn computed_value(&self) -> f32 {
        self.computed_value
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn is_final_value(&self) -> bool {
        matches!(self.resolution, Resolution::Final)
    }

    pub fn is_synonym(&self) -> bool {
        matches!(self.resolution, Resolution::Synonym { .. })
    }

    /// Row-table index of the row this variable is the key of.
    pub fn definition(&self) -> Option<usize> {
        match self.resolution {
            Resolution::Basic { row } => Some(row),
            _ => None,
        }
    }

    pub fn is_in_goal(&self) -> bool {
        self.in_goal
    }

    pub fn usage_in_row_count(&self) -> usize {
        self.usage_in_row_count
    }

    pub fn strength_vector(&self) -> &[f32; MAX_STRENGTH] {
        &self.strength_vector
    }

    pub fn goal_strength_vector(&self) -> &[f32; MAX_STRENGTH] {
        &self.goal_strength_vector
    }

    /// Rows currently holding this variable as a term.
    pub fn clients(&self) -> &[RowRef] {
        &self.clients
    }

    pub fn clear_strengths(&mut self) {
        self.strength_vector = [0.0; MAX_STRENGTH];
    }

    /// Drop the basic-in-row state, if any.
    pub(crate) fn clear_definition(&mut self) {
        if let Resolution::Basic { .. } = self.resolution {
            self.resolution = Resolution::Free;
        }
    }

    pub(crate) fn add_client(&mut self, row: RowRef) {
        if !self.clients.contains(&row) {
            self.clients.push(row);
        }
    }

    pub(crate) fn remove_client(&mut self, row: RowRef) {
        if let Some(position) = self.clients.iter().position(|r| *r == row) {
            self.clients.remove(position);
        }
    }

    pub(crate) fn take_clients(&mut self) -> SmallVec<[RowRef; 16]> {
        std::mem::take(&mut self.clients)
    }

    pub fn strengths_to_string(&self) -> String {
        let mut out = format!("{}[", self);
        let mut negative = false;
        let mut empty = true;
        for (index, value) in self.strength_vector.iter().enumerate() {
            out.push_str(&value.to_string());
            if *value > 0.0 {
                negative = false;
            } else if *value < 0.0 {
                negative = true;
            }
            if *value != 0.0 {
                empty = false;
            }
            out.push_str(if index < MAX_STRENGTH - 1 { ", " } else { "] " });
        }
        if negative {
            out.push_str(" (-)");
        }
        if empty {
            out.push_str(" (*)");
        }
        out
    }
}

impl fmt::Display for SolverVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.name, self.prefix) {
            (Some(name), _) => f.write_str(name),
            (None, Some(prefix)) => write!(f, "{}{}", prefix, self.id),
            (None, None) => write!(f, "{}{}", self.kind.prefix(), self.id),
        }
    }
}

/// Variables of one pass, indexed by id.
#[derive(Debug, Default)]
pub struct VariableTable {
    slots: Vec<Option<SolverVariable>>,
}

impl VariableTable {
    pub(crate) fn with_size(size: usize) -> Self {
        let mut slots = Vec::with_capacity(size);
        slots.resize_with(size, || None);
        Self { slots }
    }

    /// Number of id slots, live or not.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn get(&self, id: usize) -> Option<&SolverVariable> {
        self.slots.get(id).and_then(Option::as_ref)
    }

    pub(crate) fn get_mut(&mut self, id: usize) -> Option<&mut SolverVariable> {
        self.slots.get_mut(id).and_then(Option::as_mut)
    }

    pub fn contains(&self, id: usize) -> bool {
        self.get(id).is_some()
    }

    /// Live variables in id order.
    pub fn iter(&self) -> impl Iterator<Item = &SolverVariable> {
        self.slots.iter().flatten()
    }

    pub(crate) fn insert(&mut self, variable: SolverVariable) {
        let id = variable.id;
        if id >= self.slots.len() {
            self.grow((id + 1).max(self.slots.len() * 2));
        }
        self.slots[id] = Some(variable);
    }

    /// Grow to `size` id slots, keeping every existing id in place.
    pub(crate) fn grow(&mut self, size: usize) {
        if size > self.slots.len() {
            self.slots.resize_with(size, || None);
        }
    }

    /// Remove every live variable, leaving the slots empty.
    pub(crate) fn drain(&mut self) -> impl Iterator<Item = SolverVariable> + '_ {
        self.slots.iter_mut().filter_map(Option::take)
    }

    /// Record that `owner` now holds `id` as a term.
    pub(crate) fn attach(&mut self, id: usize, owner: RowRef) {
        if let Some(variable) = self.get_mut(id) {
            variable.usage_in_row_count += 1;
            variable.add_client(owner);
        }
    }

    /// Record that `owner` dropped `id`.
    pub(crate) fn detach(&mut self, id: usize, owner: RowRef, remove_client: bool) {
        if let Some(variable) = self.get_mut(id) {
            variable.usage_in_row_count = variable.usage_in_row_count.saturating_sub(1);
            if remove_client {
                variable.remove_client(owner);
            }
        }
    }
}

impl Index<usize> for VariableTable {
    type Output = SolverVariable;

    fn index(&self, id: usize) -> &SolverVariable {
        match self.get(id) {
            Some(variable) => variable,
            None => panic!("variable slot {} is empty", id),
        }
    }
}

impl IndexMut<usize> for VariableTable {
    fn index_mut(&mut self, id: usize) -> &mut SolverVariable {
        match self.get_mut(id) {
            Some(variable) => variable,
            None => panic!("variable slot {} is empty", id),
        }
    }
}
