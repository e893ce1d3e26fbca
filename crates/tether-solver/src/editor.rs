//! Building rows through variable handles.

use tether_core::{SolverError, Strength};

use crate::row::{ArrayRow, Row};
use crate::storage::RowVariables;
use crate::system::LinearSystem;
use crate::variable::{RowId, Variable, VariableTable};

/// Mutable access to one row that is not yet (or no longer) in the table.
///
/// Every method resolves its handles first and fails with
/// [`SolverError::StaleVariable`] for handles from an earlier pass.
///
/// ```
/// use tether_solver::{AnchorKey, LinearSystem};
///
/// let mut system = LinearSystem::new();
/// let left = system.create_object_variable(AnchorKey(1));
/// let right = system.create_object_variable(AnchorKey(2));
/// let row = system.create_row();
/// system
///     .edit_row(row)?
///     .create_row_equals_variables(right, left, 120)?;
/// system.add_constraint(row)?;
/// # Ok::<(), tether_solver::SolverError>(())
/// ```
pub struct RowEditor<'a> {
    system: &'a mut LinearSystem,
    row: RowId,
}

impl<'a> RowEditor<'a> {
    pub(crate) fn new(system: &'a mut LinearSystem, row: RowId) -> Self {
        Self { system, row }
    }

    pub fn id(&self) -> RowId {
        self.row
    }

    fn parts(&mut self) -> Result<(&mut ArrayRow, &mut VariableTable), SolverError> {
        self.system.row_parts(self.row)
    }

    fn resolve<const N: usize>(&self, handles: [Variable; N]) -> Result<[usize; N], SolverError> {
        let mut ids = [0; N];
        for (id, handle) in ids.iter_mut().zip(handles) {
            *id = self.system.resolve(handle)?;
        }
        Ok(ids)
    }

    pub fn set_constant(&mut self, constant: f32) -> Result<&mut Self, SolverError> {
        self.parts()?.0.constant = constant;
        Ok(self)
    }

    /// Set the coefficient of `variable`; a zero coefficient removes the term.
    pub fn put(&mut self, variable: Variable, coefficient: f32) -> Result<&mut Self, SolverError> {
        let [id] = self.resolve([variable])?;
        let (row, vars) = self.parts()?;
        row.variables.put(vars, id, coefficient);
        Ok(self)
    }

    /// `variable = value`, already solved for `variable`.
    pub fn create_row_definition(
        &mut self,
        variable: Variable,
        value: i32,
    ) -> Result<&mut Self, SolverError> {
        let [id] = self.resolve([variable])?;
        let (row, vars) = self.parts()?;
        row.create_row_definition(vars, id, value);
        Ok(self)
    }

    pub fn create_row_equals(
        &mut self,
        variable: Variable,
        value: i32,
    ) -> Result<&mut Self, SolverError> {
        let [id] = self.resolve([variable])?;
        let (row, vars) = self.parts()?;
        row.create_row_equals(vars, id, value);
        Ok(self)
    }

    pub fn create_row_equals_variables(
        &mut self,
        a: Variable,
        b: Variable,
        margin: i32,
    ) -> Result<&mut Self, SolverError> {
        let [a, b] = self.resolve([a, b])?;
        let (row, vars) = self.parts()?;
        row.create_row_equals_variables(vars, a, b, margin);
        Ok(self)
    }

    pub fn create_row_greater_than(
        &mut self,
        a: Variable,
        b: Variable,
        slack: Variable,
        margin: i32,
    ) -> Result<&mut Self, SolverError> {
        let [a, b, slack] = self.resolve([a, b, slack])?;
        let (row, vars) = self.parts()?;
        row.create_row_greater_than(vars, a, b, slack, margin);
        Ok(self)
    }

    pub fn create_row_greater_than_value(
        &mut self,
        a: Variable,
        value: i32,
        slack: Variable,
    ) -> Result<&mut Self, SolverError> {
        let [a, slack] = self.resolve([a, slack])?;
        let (row, vars) = self.parts()?;
        row.create_row_greater_than_value(vars, a, value, slack);
        Ok(self)
    }

    pub fn create_row_lower_than(
        &mut self,
        a: Variable,
        b: Variable,
        slack: Variable,
        margin: i32,
    ) -> Result<&mut Self, SolverError> {
        let [a, b, slack] = self.resolve([a, b, slack])?;
        let (row, vars) = self.parts()?;
        row.create_row_lower_than(vars, a, b, slack, margin);
        Ok(self)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create_row_centering(
        &mut self,
        a: Variable,
        b: Variable,
        margin_a: i32,
        bias: f32,
        c: Variable,
        d: Variable,
        margin_b: i32,
    ) -> Result<&mut Self, SolverError> {
        let [a, b, c, d] = self.resolve([a, b, c, d])?;
        let (row, vars) = self.parts()?;
        row.create_row_centering(vars, a, b, margin_a, bias, c, d, margin_b);
        Ok(self)
    }

    pub fn create_row_dimension_percent(
        &mut self,
        a: Variable,
        c: Variable,
        percent: f32,
    ) -> Result<&mut Self, SolverError> {
        let [a, c] = self.resolve([a, c])?;
        let (row, vars) = self.parts()?;
        row.create_row_dimension_percent(vars, a, c, percent);
        Ok(self)
    }

    pub fn create_row_dimension_ratio(
        &mut self,
        a: Variable,
        b: Variable,
        c: Variable,
        d: Variable,
        ratio: f32,
    ) -> Result<&mut Self, SolverError> {
        let [a, b, c, d] = self.resolve([a, b, c, d])?;
        let (row, vars) = self.parts()?;
        row.create_row_dimension_ratio(vars, a, b, c, d, ratio);
        Ok(self)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create_row_equal_match_dimensions(
        &mut self,
        current_weight: f32,
        total_weights: f32,
        next_weight: f32,
        start_a: Variable,
        end_a: Variable,
        start_b: Variable,
        end_b: Variable,
    ) -> Result<&mut Self, SolverError> {
        let [start_a, end_a, start_b, end_b] = self.resolve([start_a, end_a, start_b, end_b])?;
        let (row, vars) = self.parts()?;
        row.create_row_equal_match_dimensions(
            vars,
            current_weight,
            total_weights,
            next_weight,
            start_a,
            end_a,
            start_b,
            end_b,
        );
        Ok(self)
    }

    /// Edges are `(variable, margin)` pairs.
    pub fn create_row_equal_dimension(
        &mut self,
        current_weight: f32,
        total_weights: f32,
        next_weight: f32,
        a: [(Variable, i32); 2],
        b: [(Variable, i32); 2],
    ) -> Result<&mut Self, SolverError> {
        let [start_a, end_a, start_b, end_b] =
            self.resolve([a[0].0, a[1].0, b[0].0, b[1].0])?;
        let (row, vars) = self.parts()?;
        row.create_row_equal_dimension(
            vars,
            current_weight,
            total_weights,
            next_weight,
            start_a,
            a[0].1,
            end_a,
            a[1].1,
            start_b,
            b[0].1,
            end_b,
            b[1].1,
        );
        Ok(self)
    }

    pub fn create_row_with_angle(
        &mut self,
        at: Variable,
        ab: Variable,
        bt: Variable,
        bb: Variable,
        angle_component: f32,
    ) -> Result<&mut Self, SolverError> {
        let [at, ab, bt, bb] = self.resolve([at, ab, bt, bb])?;
        let (row, vars) = self.parts()?;
        row.create_row_with_angle(vars, at, ab, bt, bb, angle_component);
        Ok(self)
    }

    pub fn add_single_error(
        &mut self,
        error: Variable,
        sign: i32,
    ) -> Result<&mut Self, SolverError> {
        let [error] = self.resolve([error])?;
        let (row, vars) = self.parts()?;
        row.add_single_error(vars, error, sign);
        Ok(self)
    }

    /// Add a fresh `+ep - em` error pair at `strength`.
    pub fn add_error(&mut self, strength: Strength) -> Result<&mut Self, SolverError> {
        self.system.add_error_pair(self.row, strength)?;
        Ok(self)
    }

    /// Add an existing error variable, weighted by its own strength.
    pub fn add_goal_error(&mut self, error: Variable) -> Result<&mut Self, SolverError> {
        let [error] = self.resolve([error])?;
        let (row, vars) = self.parts()?;
        row.add_error(vars, error);
        Ok(self)
    }

    pub fn row(&self) -> Result<&ArrayRow, SolverError> {
        self.system.row(self.row)
    }
}
