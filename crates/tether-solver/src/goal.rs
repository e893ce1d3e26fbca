//! The multi-priority objective row.

use std::fmt;

use tether_core::MAX_STRENGTH;

use crate::row::{ArrayRow, Row};
use crate::storage::RowVariables;
use crate::variable::{RowRef, SolverVariable, VariableTable};

/// Goal-vector entries below this are snapped to zero.
const EPSILON: f32 = 0.0001;

/// Objective whose per-variable cost is a vector of priority buckets.
///
/// The cost vector lives on each variable (`goal_strength_vector`); the row
/// itself only keeps the ids currently in goal, sorted ascending.
#[derive(Debug, Clone, Default)]
pub struct PriorityGoalRow {
    goals: Vec<usize>,
}

/// Compare from the highest bucket down; the first differing bucket decides.
fn is_smaller(a: &[f32; MAX_STRENGTH], b: &[f32; MAX_STRENGTH]) -> bool {
    for bucket in (0..MAX_STRENGTH).rev() {
        if a[bucket] != b[bucket] {
            return a[bucket] < b[bucket];
        }
    }
    false
}

fn is_negative(vector: &[f32; MAX_STRENGTH]) -> bool {
    for bucket in (0..MAX_STRENGTH).rev() {
        if vector[bucket] > 0.0 {
            return false;
        }
        if vector[bucket] < 0.0 {
            return true;
        }
    }
    false
}

impl PriorityGoalRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids in goal, ascending.
    pub fn goals(&self) -> &[usize] {
        &self.goals
    }

    pub fn len(&self) -> usize {
        self.goals.len()
    }

    pub fn contains(&self, id: usize) -> bool {
        self.goals.binary_search(&id).is_ok()
    }

    /// Forget every goal without touching the variables, for when the whole
    /// variable table is being recycled.
    pub(crate) fn discard(&mut self) {
        self.goals.clear();
    }

    fn add_to_goal(&mut self, vars: &mut VariableTable, id: usize) {
        if let Err(position) = self.goals.binary_search(&id) {
            self.goals.insert(position, id);
        }
        let variable = &mut vars[id];
        variable.in_goal = true;
        variable.add_client(RowRef::Goal);
    }

    pub(crate) fn remove_goal(&mut self, vars: &mut VariableTable, id: usize) {
        if let Ok(position) = self.goals.binary_search(&id) {
            self.goals.remove(position);
        }
        if let Some(variable) = vars.get_mut(id) {
            variable.in_goal = false;
            variable.remove_client(RowRef::Goal);
        }
    }

    /// Fold `key`'s goal vector, scaled by each coefficient, into the goal
    /// vectors of `definition`'s terms.
    fn distribute(&mut self, vars: &mut VariableTable, key: usize, definition: &ArrayRow) {
        let key_vector = vars[key].goal_strength_vector;
        for (id, value) in definition.variables.terms() {
            let variable = &mut vars[id];
            if variable.in_goal {
                let mut empty = true;
                for (slot, weight) in variable.goal_strength_vector.iter_mut().zip(key_vector) {
                    *slot += weight * value;
                    if slot.abs() < EPSILON {
                        *slot = 0.0;
                    } else {
                        empty = false;
                    }
                }
                if empty {
                    self.remove_goal(vars, id);
                }
            } else {
                let mut empty = true;
                for (slot, weight) in variable.goal_strength_vector.iter_mut().zip(key_vector) {
                    let scaled = weight * value;
                    *slot = if scaled.abs() < EPSILON { 0.0 } else { scaled };
                    if *slot != 0.0 {
                        empty = false;
                    }
                }
                if !empty {
                    self.add_to_goal(vars, id);
                }
            }
        }
    }

    pub fn display<'a>(&'a self, vars: &'a VariableTable) -> GoalDisplay<'a> {
        GoalDisplay { goal: self, vars }
    }
}

impl Row for PriorityGoalRow {
    fn key(&self) -> Option<usize> {
        None
    }

    fn is_empty(&self) -> bool {
        self.goals.is_empty()
    }

    fn clear(&mut self, vars: &mut VariableTable) {
        for id in self.goals.drain(..) {
            if let Some(variable) = vars.get_mut(id) {
                variable.in_goal = false;
                variable.remove_client(RowRef::Goal);
            }
        }
    }

    fn pivot_candidate(&self, vars: &VariableTable, avoid: &[bool]) -> Option<usize> {
        let mut pivot: Option<&SolverVariable> = None;
        for &id in &self.goals {
            if avoid.get(id).copied().unwrap_or(false) {
                continue;
            }
            let variable = &vars[id];
            match pivot {
                None if is_negative(&variable.goal_strength_vector) => pivot = Some(variable),
                Some(best) if is_smaller(&variable.goal_strength_vector, &best.goal_strength_vector) => {
                    pivot = Some(variable)
                }
                _ => {}
            }
        }
        pivot.map(SolverVariable::id)
    }

    fn add_error(&mut self, vars: &mut VariableTable, id: usize) {
        let variable = &mut vars[id];
        variable.goal_strength_vector = [0.0; MAX_STRENGTH];
        let bucket = variable.strength.min(MAX_STRENGTH - 1);
        variable.goal_strength_vector[bucket] = 1.0;
        self.add_to_goal(vars, id);
    }

    fn update_from_row(
        &mut self,
        vars: &mut VariableTable,
        definition: &ArrayRow,
        _remove_from_definition: bool,
    ) -> bool {
        let Some(key) = definition.key else {
            return false;
        };
        if vars[key].in_goal {
            self.distribute(vars, key, definition);
            self.remove_goal(vars, key);
        }
        false
    }

    fn update_from_final_variable(
        &mut self,
        vars: &mut VariableTable,
        id: usize,
        _remove_from_definition: bool,
    ) -> bool {
        self.remove_goal(vars, id);
        false
    }
}

/// Renders the goal with variable names.
pub struct GoalDisplay<'a> {
    goal: &'a PriorityGoalRow,
    vars: &'a VariableTable,
}

impl fmt::Display for GoalDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "goal ->")?;
        for &id in &self.goal.goals {
            let variable = &self.vars[id];
            write!(f, " [")?;
            for value in variable.goal_strength_vector {
                write!(f, " {}", value)?;
            }
            write!(f, " ] {}", variable)?;
        }
        Ok(())
    }
}
