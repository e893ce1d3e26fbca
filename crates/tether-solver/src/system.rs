//! The equation table and the two-phase solve.
//!
//! A [`LinearSystem`] owns every row and variable of one layout pass. Rows are
//! added incrementally through [`add_constraint`](LinearSystem::add_constraint),
//! which substitutes what the table already knows, picks a subject and pivots
//! right away. [`minimize`](LinearSystem::minimize) then restores a basic
//! feasible solution and runs the simplex loop against the priority goal.

use std::fmt::Write as _;

use indexmap::IndexMap;
use tether_core::{AnchorKey, SolverConfig, SolverError, Strength, VariableType, MAX_STRENGTH};
use tracing::{debug, trace, warn, Level};

use crate::arena::RowArena;
use crate::cache::Cache;
use crate::editor::RowEditor;
use crate::goal::PriorityGoalRow;
use crate::metrics::Metrics;
use crate::row::{ArrayRow, Row};
use crate::storage::RowVariables;
use crate::variable::{Resolution, RowId, RowRef, SolverVariable, Variable, VariableTable};

/// Which objective [`LinearSystem::optimize`] drives down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Objective {
    Goal,
    /// The scratch row used while trying to eliminate an extra variable
    Scratch,
}

/// A pivot chosen while restoring feasibility.
#[derive(Debug, Clone, Copy)]
struct BfsChoice {
    index: usize,
    column: usize,
    bucket: Option<usize>,
    ratio: f32,
    constant: f32,
}

impl BfsChoice {
    fn beats(&self, other: &BfsChoice) -> bool {
        match self.bucket.cmp(&other.bucket) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Less => false,
            std::cmp::Ordering::Equal => {
                self.ratio < other.ratio
                    || (self.ratio == other.ratio && self.constant < other.constant)
            }
        }
    }
}

/// Incremental simplex tableau for one layout pass.
#[derive(Debug)]
pub struct LinearSystem {
    pub(crate) config: SolverConfig,
    pub(crate) cache: Cache,
    pub(crate) rows: RowArena,
    /// Live rows in table order; a basic variable's `Basic { row }` indexes this
    table: Vec<RowId>,
    pub(crate) goal: PriorityGoalRow,
    temp_goal: RowId,
    table_size: usize,
    max_rows: usize,
    max_columns: usize,
    num_columns: usize,
    tested: Vec<bool>,
    has_simple_definition: bool,
    named: IndexMap<String, usize>,
    anchors: IndexMap<AnchorKey, usize>,
    pub(crate) generation: u32,
    pub(crate) metrics: Metrics,
}

impl Default for LinearSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearSystem {
    /// Create a system with the default configuration.
    pub fn new() -> Self {
        Self::build(SolverConfig::default())
    }

    /// Create a system after validating `config`.
    pub fn with_config(config: SolverConfig) -> Result<Self, SolverError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: SolverConfig) -> Self {
        let table_size = config.table_size;
        let mut cache = Cache::new(config.row_pool_size, config.variable_pool_size, table_size);
        let mut rows = RowArena::new();
        let scratch = cache
            .row_pool
            .acquire()
            .unwrap_or_else(|| ArrayRow::new(config.storage));
        let temp_goal = rows.insert(scratch);
        Self {
            cache,
            rows,
            table: Vec::with_capacity(table_size),
            goal: PriorityGoalRow::new(),
            temp_goal,
            table_size,
            max_rows: table_size,
            max_columns: table_size,
            num_columns: 1,
            tested: vec![false; table_size],
            has_simple_definition: false,
            named: IndexMap::new(),
            anchors: IndexMap::new(),
            generation: 0,
            metrics: Metrics::default(),
            config,
        }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn reset_metrics(&mut self) {
        self.metrics.reset();
    }

    /// Rows currently in the table.
    pub fn num_equations(&self) -> usize {
        self.table.len()
    }

    /// Variables created during this pass.
    pub fn num_variables(&self) -> usize {
        self.num_columns - 1
    }

    /// Next variable id; id 0 is never handed out.
    pub fn num_columns(&self) -> usize {
        self.num_columns
    }

    /// Rows in table order.
    pub fn rows(&self) -> impl Iterator<Item = &ArrayRow> {
        self.table.iter().filter_map(|&id| self.rows.get(id))
    }

    pub fn goal(&self) -> &PriorityGoalRow {
        &self.goal
    }

    pub fn variables(&self) -> &VariableTable {
        &self.cache.variables
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    // ------------------------------------------------------------------
    // Handles
    // ------------------------------------------------------------------

    pub(crate) fn resolve(&self, variable: Variable) -> Result<usize, SolverError> {
        if variable.generation == self.generation && self.cache.variables.contains(variable.id) {
            Ok(variable.id)
        } else {
            Err(SolverError::StaleVariable { id: variable.id })
        }
    }

    pub(crate) fn handle(&self, id: usize) -> Variable {
        Variable {
            id,
            generation: self.generation,
        }
    }

    fn check_row(&self, row: RowId) -> Result<(), SolverError> {
        if row != self.temp_goal && self.rows.contains(row) {
            Ok(())
        } else {
            Err(SolverError::StaleRow { index: row.index })
        }
    }

    /// Borrow a row together with the variable table it writes to.
    pub(crate) fn row_parts(
        &mut self,
        row: RowId,
    ) -> Result<(&mut ArrayRow, &mut VariableTable), SolverError> {
        if row == self.temp_goal {
            return Err(SolverError::StaleRow { index: row.index });
        }
        let current = self
            .rows
            .get_mut(row)
            .ok_or(SolverError::StaleRow { index: row.index })?;
        Ok((current, &mut self.cache.variables))
    }

    pub fn value(&self, variable: Variable) -> Result<f32, SolverError> {
        let id = self.resolve(variable)?;
        Ok(self.cache.variables[id].computed_value)
    }

    pub fn is_final_value(&self, variable: Variable) -> Result<bool, SolverError> {
        let id = self.resolve(variable)?;
        Ok(self.cache.variables[id].is_final_value())
    }

    pub fn solver_variable(&self, variable: Variable) -> Result<&SolverVariable, SolverError> {
        let id = self.resolve(variable)?;
        Ok(&self.cache.variables[id])
    }

    // ------------------------------------------------------------------
    // Variables
    // ------------------------------------------------------------------

    fn acquire_variable(&mut self, kind: VariableType, prefix: Option<&'static str>) -> usize {
        if self.num_columns + 1 >= self.max_columns {
            self.increase_table_size();
        }
        let mut variable = self
            .cache
            .variable_pool
            .acquire()
            .unwrap_or_else(|| SolverVariable::new(kind));
        variable.reset();
        variable.set_type(kind, prefix);
        let id = self.num_columns;
        self.num_columns += 1;
        variable.id = id;
        self.cache.variables.insert(variable);
        self.metrics.variables += 1;
        self.metrics.max_variables = self.metrics.max_variables.max(self.num_columns as u64);
        id
    }

    /// The unrestricted variable bound to `anchor`, created on first use.
    pub fn create_object_variable(&mut self, anchor: AnchorKey) -> Variable {
        if let Some(&id) = self.anchors.get(&anchor) {
            return self.handle(id);
        }
        let id = self.acquire_variable(VariableType::Unrestricted, None);
        self.anchors.insert(anchor, id);
        self.handle(id)
    }

    /// A named variable of `kind`, created on first use.
    pub fn variable(&mut self, name: &str, kind: VariableType) -> Variable {
        if let Some(&id) = self.named.get(name) {
            return self.handle(id);
        }
        let id = self.acquire_variable(kind, None);
        self.cache.variables[id].name = Some(name.to_string());
        self.named.insert(name.to_string(), id);
        self.handle(id)
    }

    pub fn value_for(&self, name: &str) -> Option<f32> {
        let &id = self.named.get(name)?;
        self.cache.variables.get(id).map(SolverVariable::computed_value)
    }

    /// Computed value of the variable bound to `anchor`, rounded.
    pub fn object_variable_value(&self, anchor: AnchorKey) -> Option<i32> {
        let &id = self.anchors.get(&anchor)?;
        let variable = self.cache.variables.get(id)?;
        Some((variable.computed_value + 0.5) as i32)
    }

    pub(crate) fn new_slack(&mut self) -> usize {
        self.metrics.slack_variables += 1;
        let id = self.acquire_variable(VariableType::Slack, None);
        self.cache.variables[id].strength = 0;
        id
    }

    pub(crate) fn new_extra(&mut self) -> usize {
        self.metrics.extra_variables += 1;
        self.acquire_variable(VariableType::Slack, None)
    }

    pub(crate) fn new_error(&mut self, strength: Strength, prefix: Option<&'static str>) -> usize {
        self.metrics.errors += 1;
        let id = self.acquire_variable(VariableType::Error, prefix);
        self.cache.variables[id].strength = strength.bucket();
        self.goal.add_error(&mut self.cache.variables, id);
        id
    }

    pub fn create_slack_variable(&mut self) -> Variable {
        let id = self.new_slack();
        self.handle(id)
    }

    pub fn create_extra_variable(&mut self) -> Variable {
        let id = self.new_extra();
        self.handle(id)
    }

    /// An error variable at `strength`, registered with the goal row.
    pub fn create_error_variable(
        &mut self,
        strength: Strength,
        prefix: Option<&'static str>,
    ) -> Variable {
        let id = self.new_error(strength, prefix);
        self.handle(id)
    }

    fn increase_table_size(&mut self) {
        self.table_size *= 2;
        self.max_rows = self.table_size;
        self.max_columns = self.table_size;
        self.cache.variables.grow(self.table_size);
        self.tested.resize(self.table_size, false);
        self.table.reserve(self.table_size - self.table.len());
        self.metrics.table_size_increase += 1;
        self.metrics.max_table_size = self.metrics.max_table_size.max(self.table_size as u64);
        debug!(size = self.table_size, "table size increased");
    }

    // ------------------------------------------------------------------
    // Rows
    // ------------------------------------------------------------------

    /// A fresh, empty row. It stays outside the table until passed to
    /// [`add_constraint`](Self::add_constraint).
    pub fn create_row(&mut self) -> RowId {
        let row = self
            .cache
            .row_pool
            .acquire()
            .unwrap_or_else(|| ArrayRow::new(self.config.storage));
        self.rows.insert(row)
    }

    pub fn edit_row(&mut self, row: RowId) -> Result<RowEditor<'_>, SolverError> {
        self.check_row(row)?;
        Ok(RowEditor::new(self, row))
    }

    pub fn row(&self, row: RowId) -> Result<&ArrayRow, SolverError> {
        self.check_row(row)?;
        self.rows
            .get(row)
            .ok_or(SolverError::StaleRow { index: row.index })
    }

    /// The row at `index` of the table.
    pub(crate) fn row_at(&mut self, index: usize) -> Option<&mut ArrayRow> {
        let id = *self.table.get(index)?;
        self.rows.get_mut(id)
    }

    fn release_row(&mut self, id: RowId) {
        if let Some(mut row) = self.rows.remove(id) {
            row.reset(&mut self.cache.variables);
            self.cache.row_pool.release(row);
        }
    }

    /// Remove the table entry at `position`, shifting the `Basic` index of
    /// every later key down by one.
    fn remove_table_entry(&mut self, position: usize) {
        self.table.remove(position);
        let vars = &mut self.cache.variables;
        for (index, &id) in self.table.iter().enumerate().skip(position) {
            if let Some(key) = self.rows.get(id).and_then(ArrayRow::key) {
                if vars[key].definition() == Some(index + 1) {
                    vars[key].resolution = Resolution::Basic { row: index };
                }
            }
        }
    }

    /// Add a row to the system, pivoting it into the table.
    ///
    /// Rows that reduce to `0 = 0` are dropped, and a row whose extra variable
    /// cannot be eliminated is discarded.
    pub fn add_constraint(&mut self, row: RowId) -> Result<(), SolverError> {
        self.check_row(row)?;
        self.metrics.constraints += 1;
        let simple = self.rows.get(row).is_some_and(ArrayRow::is_simple_definition);
        if simple {
            self.metrics.simple_constraints += 1;
        }
        if self.table.len() + 1 >= self.max_rows || self.num_columns + 1 >= self.max_columns {
            self.increase_table_size();
        }
        if tracing::enabled!(Level::TRACE) {
            if let Some(current) = self.rows.get(row) {
                trace!(row = %current.display(&self.cache.variables), "add constraint");
            }
        }

        if !simple {
            self.update_row_from_system(row);
            let vars = &mut self.cache.variables;
            let Some(current) = self.rows.get_mut(row) else {
                return Ok(());
            };
            if current.is_empty() {
                self.release_row(row);
                return Ok(());
            }
            current.ensure_positive_constant();
            if current.choose_subject(vars) {
                return self.add_with_extra_variable(row);
            }
            if !current.has_key_variable(vars) {
                self.release_row(row);
                return Ok(());
            }
        }
        self.add_row(row);
        Ok(())
    }

    /// Key the row on a new extra variable, then try to drive that variable
    /// out of the basis against a scratch goal built from the row.
    fn add_with_extra_variable(&mut self, row: RowId) -> Result<(), SolverError> {
        let extra = self.new_extra();
        if let Some(current) = self.rows.get_mut(row) {
            current.key = Some(extra);
        }
        self.add_row(row);
        if !self.table.contains(&row) {
            // folded into a final value while being added
            return Ok(());
        }
        self.init_scratch_goal(row);
        self.optimize(Objective::Scratch);
        if self.cache.variables[extra].definition().is_some() {
            return Ok(());
        }

        let vars = &mut self.cache.variables;
        let Some(current) = self.rows.get_mut(row) else {
            return Ok(());
        };
        if current.key == Some(extra) {
            if let Some(pivot) = current.pick_pivot(vars, Some(extra)) {
                current.pivot(vars, pivot);
            }
        }
        let (key, simple) = (current.key, current.is_simple_definition);
        if !simple {
            if let Some(key) = key {
                self.update_references_with_new_definition(key, row);
            }
        }
        if let Some(position) = self.table.iter().position(|&id| id == row) {
            self.remove_table_entry(position);
        }
        if let Some(key) = key {
            self.cache.variables[key].clear_definition();
        }
        self.release_row(row);
        self.metrics.discarded_rows += 1;
        warn!(extra, "extra variable could not be eliminated, row discarded");
        Ok(())
    }

    fn init_scratch_goal(&mut self, source: RowId) {
        let scratch_id = self.temp_goal;
        let Some(mut scratch) = self.rows.take(scratch_id) else {
            return;
        };
        if let Some(source) = self.rows.get(source) {
            scratch.init_from_row(&mut self.cache.variables, source);
        }
        self.rows.restore(scratch_id, scratch);
    }

    /// Substitute every term the table already resolves (basic, final or
    /// synonym) until only free variables remain.
    fn update_row_from_system(&mut self, row_id: RowId) {
        let Some(mut row) = self.rows.take(row_id) else {
            return;
        };
        let vars = &mut self.cache.variables;
        let mut pending = std::mem::take(&mut row.pending);
        loop {
            pending.clear();
            pending.extend(
                row.variables
                    .terms()
                    .filter(|&(id, _)| vars[id].resolution != Resolution::Free)
                    .map(|(id, _)| id),
            );
            if pending.is_empty() {
                break;
            }
            for &id in &pending {
                match vars[id].resolution {
                    Resolution::Final => {
                        row.update_from_final_variable(vars, id, true);
                    }
                    Resolution::Synonym { .. } => {
                        row.update_from_synonym_variable(vars, id, true);
                    }
                    Resolution::Basic { row: index } => {
                        match self.table.get(index).and_then(|&def| self.rows.get(def)) {
                            Some(definition) => {
                                row.update_from_row(vars, definition, true);
                            }
                            None => {
                                warn!(variable = id, index, "basic variable without a row");
                                vars[id].clear_definition();
                            }
                        }
                    }
                    Resolution::Free => {}
                }
            }
        }
        row.pending = pending;
        if row.key.is_some() && row.variables.is_empty() {
            row.is_simple_definition = true;
            self.has_simple_definition = true;
        }
        self.rows.restore(row_id, row);
    }

    fn add_row(&mut self, row_id: RowId) {
        let Some(row) = self.rows.get(row_id) else {
            return;
        };
        let (key, simple, constant) = (row.key, row.is_simple_definition, row.constant);
        let Some(key) = key else {
            self.release_row(row_id);
            return;
        };
        if self.config.simplify_synonyms && simple {
            self.release_row(row_id);
            self.set_final_value(key, constant);
        } else {
            let index = self.table.len();
            self.table.push(row_id);
            self.cache.variables[key].resolution = Resolution::Basic { row: index };
            self.metrics.max_rows = self.metrics.max_rows.max(self.table.len() as u64);
            self.update_references_with_new_definition(key, row_id);
        }
        if self.config.simplify_synonyms && self.has_simple_definition {
            while self.has_simple_definition {
                self.has_simple_definition = false;
                self.fold_simple_rows(false);
            }
        }
    }

    /// Turn every simple row of the table into a final value. With
    /// `mark_empty`, rows that lost all their terms count as simple too.
    fn fold_simple_rows(&mut self, mark_empty: bool) {
        let mut index = 0;
        while index < self.table.len() {
            let id = self.table[index];
            let Some(row) = self.rows.get_mut(id) else {
                index += 1;
                continue;
            };
            if mark_empty && row.variables.is_empty() {
                row.is_simple_definition = true;
            }
            if !row.is_simple_definition {
                index += 1;
                continue;
            }
            let (key, constant) = (row.key, row.constant);
            self.remove_table_entry(index);
            self.release_row(id);
            if let Some(key) = key {
                self.set_final_value(key, constant);
            }
        }
    }

    /// Substitute the new definition of `key` into every row that uses it.
    fn update_references_with_new_definition(&mut self, key: usize, definition: RowId) {
        let clients = self.cache.variables[key].take_clients();
        for client in clients {
            match client {
                RowRef::Row(id) if id == definition => {}
                RowRef::Row(id) => {
                    let Some(mut row) = self.rows.take(id) else {
                        continue;
                    };
                    if let Some(def) = self.rows.get(definition) {
                        let emptied = row.update_from_row(&mut self.cache.variables, def, false);
                        if emptied && self.config.simplify_synonyms {
                            row.is_simple_definition = true;
                            self.has_simple_definition = true;
                        }
                    }
                    self.rows.restore(id, row);
                }
                RowRef::Goal => {
                    if let Some(def) = self.rows.get(definition) {
                        self.goal.update_from_row(&mut self.cache.variables, def, false);
                    }
                }
                RowRef::Detached => {}
            }
        }
    }

    /// Fix `id` to `value` and fold it into every row using it.
    pub(crate) fn set_final_value(&mut self, id: usize, value: f32) {
        self.metrics.final_values += 1;
        let simplify = self.config.simplify_synonyms;
        let vars = &mut self.cache.variables;
        let variable = &mut vars[id];
        variable.computed_value = value;
        variable.resolution = Resolution::Final;
        let in_goal = variable.in_goal;
        let clients = variable.take_clients();
        for client in clients {
            match client {
                RowRef::Row(row_id) => {
                    if let Some(row) = self.rows.get_mut(row_id) {
                        let emptied = row.update_from_final_variable(vars, id, false);
                        if emptied && simplify && row.key.is_some() {
                            row.is_simple_definition = true;
                            self.has_simple_definition = true;
                        }
                    }
                }
                RowRef::Goal => {
                    self.goal.update_from_final_variable(vars, id, false);
                }
                RowRef::Detached => {}
            }
        }
        if in_goal {
            self.goal.remove_goal(vars, id);
        }
    }

    /// Record `id` as `of + delta` and substitute it out of every row.
    pub(crate) fn set_synonym(&mut self, id: usize, of: usize, delta: f32) {
        self.metrics.synonyms += 1;
        let simplify = self.config.simplify_synonyms;
        let vars = &mut self.cache.variables;
        let variable = &mut vars[id];
        variable.resolution = Resolution::Synonym { of, delta };
        let clients = variable.take_clients();
        for client in clients {
            if let RowRef::Row(row_id) = client {
                if let Some(row) = self.rows.get_mut(row_id) {
                    let emptied = row.update_from_synonym_variable(vars, id, false);
                    if emptied && simplify && row.key.is_some() {
                        row.is_simple_definition = true;
                        self.has_simple_definition = true;
                    }
                }
            }
        }
        trace!(id, of, delta, "synonym");
    }

    /// Remove a simple row from the table, fixing its key to the constant.
    /// Returns `false` for rows that are not simple definitions.
    pub fn remove_row(&mut self, row: RowId) -> Result<bool, SolverError> {
        self.check_row(row)?;
        let Some(current) = self.rows.get(row) else {
            return Ok(false);
        };
        let (Some(key), true) = (current.key, current.is_simple_definition) else {
            return Ok(false);
        };
        let constant = current.constant;
        if let Some(position) = self.table.iter().position(|&id| id == row) {
            self.remove_table_entry(position);
        }
        self.release_row(row);
        self.set_final_value(key, constant);
        Ok(true)
    }

    /// Fold rows that lost all their terms into final values.
    pub fn cleanup_rows(&mut self) {
        loop {
            self.has_simple_definition = false;
            self.fold_simple_rows(true);
            if !self.has_simple_definition {
                break;
            }
        }
    }

    // ------------------------------------------------------------------
    // Solving
    // ------------------------------------------------------------------

    /// Solve the system against the goal row and compute every value.
    pub fn minimize(&mut self) -> Result<(), SolverError> {
        self.metrics.minimize += 1;
        if self.goal.is_empty() {
            debug!(rows = self.table.len(), "empty goal, computing values");
            self.compute_values();
            return Ok(());
        }
        if self.config.graph_optimizer {
            self.metrics.graph_optimizer += 1;
            let fully_solved = self
                .table
                .iter()
                .all(|&id| self.rows.get(id).is_some_and(ArrayRow::is_simple_definition));
            if fully_solved {
                self.metrics.fully_solved += 1;
                debug!("every row is a simple definition");
                self.compute_values();
                return Ok(());
            }
        }
        self.minimize_goal()
    }

    fn minimize_goal(&mut self) -> Result<(), SolverError> {
        self.metrics.minimize_goal += 1;
        debug!(
            rows = self.table.len(),
            columns = self.num_columns,
            goals = self.goal.len(),
            "minimize goal"
        );
        let tries = self.enforce_bfs();
        let infeasible = self.infeasible_rows();
        if infeasible > 0 {
            if self.config.verify_feasibility {
                return Err(SolverError::Infeasible {
                    iterations: tries,
                    rows: infeasible,
                });
            }
            warn!(rows = infeasible, iterations = tries, "system still infeasible");
        }
        let iterations = self.optimize(Objective::Goal);
        self.compute_values();
        debug!(bfs = tries, iterations, "minimize done");
        Ok(())
    }

    /// Rows with a restricted key and a negative constant.
    fn infeasible_rows(&self) -> usize {
        let vars = &self.cache.variables;
        self.rows()
            .filter(|row| {
                row.constant < 0.0 && row.key.is_some_and(|key| vars[key].kind.is_restricted())
            })
            .count()
    }

    /// Pivot until no restricted row has a negative constant, or the
    /// iteration cap is reached. Returns the number of tries.
    fn enforce_bfs(&mut self) -> usize {
        if self.infeasible_rows() == 0 {
            return 0;
        }
        let mut tries = 0;
        loop {
            self.metrics.bfs += 1;
            tries += 1;
            match self.bfs_pivot() {
                Some(choice) => self.pivot_table_row(choice.index, choice.column),
                None => break,
            }
            if tries > self.num_columns / 2 {
                debug!(tries, "bfs iteration cap reached");
                break;
            }
        }
        tries
    }

    fn bfs_pivot(&self) -> Option<BfsChoice> {
        let vars = &self.cache.variables;
        let mut best: Option<BfsChoice> = None;
        let mut consider = |index: usize, constant: f32, column: usize, coefficient: f32| {
            let strengths = &vars[column].strength_vector;
            let bucket = (0..MAX_STRENGTH).rev().find(|&k| strengths[k] != 0.0);
            let choice = BfsChoice {
                index,
                column,
                bucket,
                ratio: bucket.map_or(0.0, |k| strengths[k] / coefficient),
                constant,
            };
            if best.as_ref().map_or(true, |current| choice.beats(current)) {
                best = Some(choice);
            }
        };
        for (index, &id) in self.table.iter().enumerate() {
            let Some(row) = self.rows.get(id) else {
                continue;
            };
            let Some(key) = row.key else {
                continue;
            };
            if !vars[key].kind.is_restricted() || row.is_simple_definition || row.constant >= 0.0 {
                continue;
            }
            if self.config.skip_columns {
                for (column, coefficient) in row.variables.terms() {
                    if coefficient > 0.0 {
                        consider(index, row.constant, column, coefficient);
                    }
                }
            } else {
                for column in 1..self.num_columns {
                    let coefficient = row.variables.get(column);
                    if coefficient > 0.0 {
                        consider(index, row.constant, column, coefficient);
                    }
                }
            }
        }
        best
    }

    /// Drive `objective` down by pivoting on its candidates. Returns the
    /// number of tries.
    fn optimize(&mut self, objective: Objective) -> usize {
        self.metrics.optimize += 1;
        let columns = self.num_columns.min(self.tested.len());
        self.tested[..columns].fill(false);
        let mut tries = 0;
        loop {
            tries += 1;
            self.metrics.iterations += 1;
            if tries >= 2 * self.num_columns {
                warn!(tries, ?objective, "optimize iteration cap reached");
                break;
            }
            let target: &dyn Row = match objective {
                Objective::Goal => &self.goal,
                Objective::Scratch => match self.rows.get(self.temp_goal) {
                    Some(row) => row,
                    None => break,
                },
            };
            if let Some(key) = target.key() {
                self.tested[key] = true;
            }
            let Some(entering) = target.pivot_candidate(&self.cache.variables, &self.tested) else {
                break;
            };
            if self.tested[entering] {
                break;
            }
            self.tested[entering] = true;

            let vars = &self.cache.variables;
            let mut min = f32::MAX;
            let mut leaving = None;
            for (index, &id) in self.table.iter().enumerate() {
                let Some(row) = self.rows.get(id) else {
                    continue;
                };
                let Some(key) = row.key else {
                    continue;
                };
                if vars[key].kind == VariableType::Unrestricted || row.is_simple_definition {
                    continue;
                }
                let coefficient = row.variables.get(entering);
                if coefficient < 0.0 {
                    let ratio = -row.constant / coefficient;
                    if ratio < min {
                        min = ratio;
                        leaving = Some(index);
                    }
                }
            }
            if let Some(index) = leaving {
                self.pivot_table_row(index, entering);
            }
        }
        tries
    }

    /// Pivot the table row at `index` on `entering` and propagate.
    fn pivot_table_row(&mut self, index: usize, entering: usize) {
        let id = self.table[index];
        let vars = &mut self.cache.variables;
        let Some(row) = self.rows.get_mut(id) else {
            return;
        };
        row.pivot(vars, entering);
        vars[entering].resolution = Resolution::Basic { row: index };
        self.metrics.pivots += 1;
        self.update_references_with_new_definition(entering, id);
    }

    /// Copy every row constant into its key, then resolve synonyms.
    fn compute_values(&mut self) {
        let vars = &mut self.cache.variables;
        for &id in &self.table {
            if let Some(row) = self.rows.get(id) {
                if let Some(key) = row.key {
                    vars[key].computed_value = row.constant;
                }
            }
        }
        for id in 1..self.num_columns {
            let mut current = id;
            let mut value = 0.0;
            // chains are short; bounded anyway so a cycle cannot hang
            for _ in 0..self.num_columns {
                match vars.get(current).map(SolverVariable::resolution) {
                    Some(Resolution::Synonym { of, delta }) => {
                        value += delta;
                        current = of;
                    }
                    _ => break,
                }
            }
            if current != id {
                let target = vars.get(current).map_or(0.0, SolverVariable::computed_value);
                vars[id].computed_value = target + value;
            }
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle and introspection
    // ------------------------------------------------------------------

    /// Return every row and variable to the pools and start a new pass.
    ///
    /// Handles from the previous pass stop resolving. Metrics are kept.
    pub fn reset(&mut self) {
        self.cache.recycle_variables();
        self.named.clear();
        self.anchors.clear();
        self.goal.discard();
        self.num_columns = 1;
        let released = self.rows.len();
        for mut row in self.rows.drain() {
            row.recycle();
            self.cache.row_pool.release(row);
        }
        self.table.clear();
        self.has_simple_definition = false;
        self.tested.fill(false);
        self.generation = self.generation.wrapping_add(1);
        self.temp_goal = self.create_row();
        debug!(generation = self.generation, released, "system reset");
    }

    /// Approximate bytes held by the table rows.
    pub fn memory_used(&self) -> usize {
        self.rows().map(ArrayRow::size_in_bytes).sum()
    }

    /// The goal and every row, one per line.
    pub fn readable_rows(&self) -> String {
        let vars = &self.cache.variables;
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.goal.display(vars));
        for row in self.rows() {
            let _ = writeln!(out, "{}", row.display(vars));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_core::RowStorageKind;

    fn systems() -> Vec<LinearSystem> {
        [RowStorageKind::Linked, RowStorageKind::Hashed]
            .into_iter()
            .map(|kind| {
                LinearSystem::with_config(SolverConfig::default().with_storage(kind)).unwrap()
            })
            .collect()
    }

    #[test]
    fn test_ids_start_at_one() {
        let mut system = LinearSystem::new();
        let a = system.create_object_variable(AnchorKey(1));
        let b = system.create_object_variable(AnchorKey(2));
        assert_eq!(a.id(), 1);
        assert_eq!(b.id(), 2);
        assert_eq!(system.create_object_variable(AnchorKey(1)), a);
        assert_eq!(system.num_variables(), 2);
    }

    #[test]
    fn test_table_grows_and_keeps_ids() {
        let config = SolverConfig {
            table_size: 4,
            ..SolverConfig::default()
        };
        let mut system = LinearSystem::with_config(config).unwrap();
        let handles: Vec<Variable> = (0..20)
            .map(|i| system.create_object_variable(AnchorKey(i)))
            .collect();
        assert!(system.metrics().table_size_increase >= 2);
        for (i, handle) in handles.iter().enumerate() {
            assert_eq!(handle.id(), i + 1);
            assert!(system.solver_variable(*handle).is_ok());
        }
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = SolverConfig {
            row_pool_size: 0,
            ..SolverConfig::default()
        };
        assert!(matches!(
            LinearSystem::with_config(config),
            Err(SolverError::Config(_))
        ));
    }

    #[test]
    fn test_named_variables() {
        let mut system = LinearSystem::new();
        let x = system.variable("x", VariableType::Unrestricted);
        assert_eq!(system.variable("x", VariableType::Unrestricted), x);
        system.add_equality_value(x, 12).unwrap();
        system.minimize().unwrap();
        assert_eq!(system.value_for("x"), Some(12.0));
        assert_eq!(system.value_for("y"), None);
    }

    #[test]
    fn test_empty_row_is_dropped() {
        for mut system in systems() {
            let row = system.create_row();
            system.add_constraint(row).unwrap();
            assert_eq!(system.num_equations(), 0);
            assert!(system.row(row).is_err());
        }
    }

    #[test]
    fn test_equality_pivots_into_table() {
        for mut system in systems() {
            let x = system.create_object_variable(AnchorKey(1));
            let y = system.create_object_variable(AnchorKey(2));
            system.add_equality(x, y, 10, Strength::Fixed).unwrap();
            assert_eq!(system.num_equations(), 1);

            system.add_equality_value(y, 5).unwrap();
            system.minimize().unwrap();
            assert!((system.value(x).unwrap() - 15.0).abs() < 0.001);
            assert!((system.value(y).unwrap() - 5.0).abs() < 0.001);
        }
    }

    #[test]
    fn test_basic_index_follows_table_position() {
        let mut system = LinearSystem::new();
        let vars: Vec<Variable> = (0..4)
            .map(|i| system.create_object_variable(AnchorKey(i)))
            .collect();
        system.add_equality(vars[0], vars[1], 1, Strength::Fixed).unwrap();
        system.add_equality(vars[2], vars[3], 2, Strength::Fixed).unwrap();
        for (index, row) in system.rows().enumerate() {
            let key = row.key().unwrap();
            assert_eq!(system.variables()[key].definition(), Some(index));
        }
    }

    #[test]
    fn test_remove_row_finalizes_key() {
        let mut system = LinearSystem::with_config(SolverConfig {
            simplify_synonyms: false,
            ..SolverConfig::default()
        })
        .unwrap();
        let x = system.create_object_variable(AnchorKey(1));
        let row = system.create_row();
        system.edit_row(row).unwrap().create_row_definition(x, 7).unwrap();
        system.add_constraint(row).unwrap();
        assert_eq!(system.num_equations(), 1);

        assert!(system.remove_row(row).unwrap());
        assert_eq!(system.num_equations(), 0);
        assert!(system.is_final_value(x).unwrap());
        assert_eq!(system.value(x).unwrap(), 7.0);
        assert!(system.remove_row(row).is_err());
    }

    #[test]
    fn test_cleanup_rows_folds_simple_definitions() {
        let mut system = LinearSystem::with_config(SolverConfig {
            simplify_synonyms: false,
            ..SolverConfig::default()
        })
        .unwrap();
        let x = system.create_object_variable(AnchorKey(1));
        let row = system.create_row();
        system.edit_row(row).unwrap().create_row_definition(x, 3).unwrap();
        system.add_constraint(row).unwrap();
        assert_eq!(system.num_equations(), 1);

        system.cleanup_rows();
        assert_eq!(system.num_equations(), 0);
        assert!(system.is_final_value(x).unwrap());
        assert_eq!(system.value(x).unwrap(), 3.0);
    }

    #[test]
    fn test_emptied_rows_stay_unsimplified_when_disabled() {
        let mut system = LinearSystem::with_config(SolverConfig {
            simplify_synonyms: false,
            ..SolverConfig::default()
        })
        .unwrap();
        let x = system.create_object_variable(AnchorKey(1));
        let y = system.create_object_variable(AnchorKey(2));
        system.add_equality(x, y, 4, Strength::Fixed).unwrap();
        system.add_equality_value(y, 3).unwrap();

        assert!(system
            .rows()
            .any(|row| row.variables().is_empty() && !row.is_simple_definition()));
        system.minimize().unwrap();
        assert!((system.value(x).unwrap() - 7.0).abs() < 0.001);
    }

    #[test]
    fn test_reset_invalidates_handles() {
        let mut system = LinearSystem::new();
        let x = system.create_object_variable(AnchorKey(1));
        let row = system.create_row();
        system.reset();
        assert!(matches!(
            system.value(x),
            Err(SolverError::StaleVariable { id: 1 })
        ));
        assert!(matches!(system.row(row), Err(SolverError::StaleRow { .. })));
        assert_eq!(system.num_columns(), 1);

        let again = system.create_object_variable(AnchorKey(1));
        assert_eq!(again.id(), 1);
        assert_ne!(again, x);
    }

    #[test]
    fn test_scratch_row_is_not_editable() {
        let mut system = LinearSystem::new();
        let scratch = system.temp_goal;
        assert!(system.edit_row(scratch).is_err());
        assert!(system.add_constraint(scratch).is_err());
    }

    #[test]
    fn test_readable_rows_lists_table() {
        let mut system = LinearSystem::new();
        let x = system.create_object_variable(AnchorKey(1));
        let y = system.create_object_variable(AnchorKey(2));
        system.add_equality(x, y, 3, Strength::Fixed).unwrap();
        let text = system.readable_rows();
        assert!(text.starts_with("goal ->"));
        assert_eq!(text.lines().count(), 2);
        assert!(system.memory_used() > 0);
    }
}
