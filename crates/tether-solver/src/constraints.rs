//! Constraint helpers built on the row factories.
//!
//! Each helper resolves its handles, builds one row, attaches error
//! variables for non-fixed strengths and submits the row through
//! [`LinearSystem::add_constraint`].

use smallvec::SmallVec;
use tether_core::{SolverError, Strength};
use tracing::trace;

use crate::storage::RowVariables;
use crate::system::LinearSystem;
use crate::variable::{Resolution, RowId, Variable};

/// The four edges of a box, as passed to [`LinearSystem::add_center_point`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edges {
    pub left: Variable,
    pub top: Variable,
    pub right: Variable,
    pub bottom: Variable,
}

impl LinearSystem {
    /// Attach a `+ep - em` error pair at `strength` to a row.
    pub(crate) fn add_error_pair(
        &mut self,
        row: RowId,
        strength: Strength,
    ) -> Result<(), SolverError> {
        let positive = self.new_error(strength, Some("ep"));
        let negative = self.new_error(strength, Some("em"));
        let (current, vars) = self.row_parts(row)?;
        current.add_error_pair(vars, positive, negative);
        Ok(())
    }

    /// Attach one error variable with coefficient `sign` to a row.
    pub fn add_single_error(
        &mut self,
        row: RowId,
        sign: i32,
        strength: Strength,
    ) -> Result<Variable, SolverError> {
        let prefix = if sign > 0 { "ep" } else { "em" };
        let error = self.new_error(strength, Some(prefix));
        let (current, vars) = self.row_parts(row)?;
        current.add_single_error(vars, error, sign);
        Ok(self.handle(error))
    }

    /// Record `a` as a synonym of `b + margin`, following `b` to the variable
    /// it is itself a synonym of.
    ///
    /// Returns `false` when `a` is not free or the target is basic; the
    /// caller then adds a row instead. A target that is a row key must never
    /// be substituted into the rows, including its own definition.
    fn record_synonym(&mut self, a: usize, b: usize, margin: f32) -> bool {
        let vars = &self.cache.variables;
        if vars[a].resolution != Resolution::Free {
            return false;
        }
        let (target, delta) = match vars[b].resolution {
            Resolution::Synonym { of, delta } => (of, delta + margin),
            _ => (b, margin),
        };
        if target == a {
            return false;
        }
        let (resolution, current) = (vars[target].resolution, vars[target].computed_value);
        match resolution {
            Resolution::Free => self.set_synonym(a, target, delta),
            Resolution::Final => {
                let value = current + delta;
                self.set_final_value(a, value);
            }
            Resolution::Basic { .. } | Resolution::Synonym { .. } => return false,
        }
        true
    }

    /// Follow synonyms of `id` to the variable they stand for, shifting
    /// `value` by each delta.
    fn synonym_root(&self, id: usize, value: i32) -> (usize, i32) {
        let vars = &self.cache.variables;
        let (mut current, mut value) = (id, value);
        for _ in 0..self.num_columns() {
            match vars[current].resolution {
                Resolution::Synonym { of, delta } => {
                    current = of;
                    value -= delta.round() as i32;
                }
                _ => break,
            }
        }
        (current, value)
    }

    /// `a = b + margin` at `strength`.
    pub fn add_equality(
        &mut self,
        a: Variable,
        b: Variable,
        margin: i32,
        strength: Strength,
    ) -> Result<(), SolverError> {
        let (a, b) = (self.resolve(a)?, self.resolve(b)?);
        if strength.is_fixed() {
            let vars = &self.cache.variables;
            if self.config.use_basic_synonyms
                && vars[b].is_final_value()
                && vars[a].resolution == Resolution::Free
            {
                let value = vars[b].computed_value + margin as f32;
                trace!(a, b, value, "equality folded into final value");
                self.set_final_value(a, value);
                return Ok(());
            }
            if self.config.use_synonyms && self.record_synonym(a, b, margin as f32) {
                return Ok(());
            }
        }
        let row = self.create_row();
        {
            let (current, vars) = self.row_parts(row)?;
            current.create_row_equals_variables(vars, a, b, margin);
        }
        if !strength.is_fixed() {
            self.add_error_pair(row, strength)?;
        }
        self.add_constraint(row)
    }

    /// `a = value`, fixed.
    ///
    /// A synonym fixes the variable it stands for instead. A variable that is
    /// not basic becomes final right away, along with every synonym of it.
    pub fn add_equality_value(&mut self, a: Variable, value: i32) -> Result<(), SolverError> {
        let (a, value) = self.synonym_root(self.resolve(a)?, value);
        let definition = self.cache.variables[a].definition();
        if self.config.use_basic_synonyms && definition.is_none() {
            let value = value as f32;
            self.set_final_value(a, value);
            let synonyms: SmallVec<[(usize, f32); 8]> = self
                .cache
                .variables
                .iter()
                .filter_map(|variable| match variable.resolution {
                    Resolution::Synonym { of, delta } if of == a => Some((variable.id, delta)),
                    _ => None,
                })
                .collect();
            for (id, delta) in synonyms {
                self.set_final_value(id, value + delta);
            }
            return Ok(());
        }

        if let Some(index) = definition {
            if let Some(current) = self.row_at(index) {
                if current.is_simple_definition {
                    current.constant = value as f32;
                    return Ok(());
                }
                if current.variables.is_empty() {
                    current.is_simple_definition = true;
                    current.constant = value as f32;
                    return Ok(());
                }
            }
            let row = self.create_row();
            {
                let (current, vars) = self.row_parts(row)?;
                current.create_row_equals(vars, a, value);
            }
            return self.add_constraint(row);
        }

        let row = self.create_row();
        {
            let (current, vars) = self.row_parts(row)?;
            current.create_row_definition(vars, a, value);
        }
        self.add_constraint(row)
    }

    fn add_inequality(
        &mut self,
        a: Variable,
        b: Variable,
        margin: i32,
        strength: Option<Strength>,
        greater: bool,
    ) -> Result<(), SolverError> {
        let (a, b) = (self.resolve(a)?, self.resolve(b)?);
        let row = self.create_row();
        let slack = self.new_slack();
        {
            let (current, vars) = self.row_parts(row)?;
            if greater {
                current.create_row_greater_than(vars, a, b, slack, margin);
            } else {
                current.create_row_lower_than(vars, a, b, slack, margin);
            }
        }
        if let Some(strength) = strength.filter(|strength| !strength.is_fixed()) {
            let coefficient = self.row(row)?.variables.get(slack);
            self.add_single_error(row, -coefficient as i32, strength)?;
        }
        self.add_constraint(row)
    }

    /// `a >= b + margin` at `strength`.
    pub fn add_greater_than(
        &mut self,
        a: Variable,
        b: Variable,
        margin: i32,
        strength: Strength,
    ) -> Result<(), SolverError> {
        self.add_inequality(a, b, margin, Some(strength), true)
    }

    /// `a <= b + margin` at `strength`.
    pub fn add_lower_than(
        &mut self,
        a: Variable,
        b: Variable,
        margin: i32,
        strength: Strength,
    ) -> Result<(), SolverError> {
        self.add_inequality(a, b, margin, Some(strength), false)
    }

    /// `a >= b + margin` with no error term.
    pub fn add_greater_barrier(
        &mut self,
        a: Variable,
        b: Variable,
        margin: i32,
    ) -> Result<(), SolverError> {
        self.add_inequality(a, b, margin, None, true)
    }

    /// `a <= b + margin` with no error term.
    pub fn add_lower_barrier(
        &mut self,
        a: Variable,
        b: Variable,
        margin: i32,
    ) -> Result<(), SolverError> {
        self.add_inequality(a, b, margin, None, false)
    }

    /// Keep `b`/`c` between `a` and `d` at `bias`.
    #[allow(clippy::too_many_arguments)]
    pub fn add_centering(
        &mut self,
        a: Variable,
        b: Variable,
        margin_a: i32,
        bias: f32,
        c: Variable,
        d: Variable,
        margin_b: i32,
        strength: Strength,
    ) -> Result<(), SolverError> {
        let (a, b) = (self.resolve(a)?, self.resolve(b)?);
        let (c, d) = (self.resolve(c)?, self.resolve(d)?);
        let row = self.create_row();
        {
            let (current, vars) = self.row_parts(row)?;
            current.create_row_centering(vars, a, b, margin_a, bias, c, d, margin_b);
        }
        if !strength.is_fixed() {
            self.add_error_pair(row, strength)?;
        }
        self.add_constraint(row)
    }

    /// `(b - a) = ratio · (d - c)` at `strength`.
    pub fn add_ratio(
        &mut self,
        a: Variable,
        b: Variable,
        c: Variable,
        d: Variable,
        ratio: f32,
        strength: Strength,
    ) -> Result<(), SolverError> {
        let (a, b) = (self.resolve(a)?, self.resolve(b)?);
        let (c, d) = (self.resolve(c)?, self.resolve(d)?);
        let row = self.create_row();
        {
            let (current, vars) = self.row_parts(row)?;
            current.create_row_dimension_ratio(vars, a, b, c, d, ratio);
        }
        if !strength.is_fixed() {
            self.add_error_pair(row, strength)?;
        }
        self.add_constraint(row)
    }

    /// Make `a` an alias of `b`.
    ///
    /// Only a free `a` with a zero margin and a target that is not a row key
    /// becomes a synonym; a final target makes `a` final. Anything else falls
    /// back to a fixed equality.
    pub fn add_synonym(&mut self, a: Variable, b: Variable, margin: i32) -> Result<(), SolverError> {
        let (a_id, b_id) = (self.resolve(a)?, self.resolve(b)?);
        if a_id == b_id {
            return Ok(());
        }
        if margin == 0 && self.record_synonym(a_id, b_id, 0.0) {
            return Ok(());
        }
        self.add_equality(a, b, margin, Strength::Fixed)
    }

    /// Place the center of `target` at `radius` from the center of `widget`,
    /// along `angle` (radians).
    pub fn add_center_point(
        &mut self,
        widget: Edges,
        target: Edges,
        angle: f32,
        radius: i32,
    ) -> Result<(), SolverError> {
        let (at, ab) = (self.resolve(widget.top)?, self.resolve(widget.bottom)?);
        let (al, ar) = (self.resolve(widget.left)?, self.resolve(widget.right)?);
        let (bt, bb) = (self.resolve(target.top)?, self.resolve(target.bottom)?);
        let (bl, br) = (self.resolve(target.left)?, self.resolve(target.right)?);

        let row = self.create_row();
        {
            let (current, vars) = self.row_parts(row)?;
            current.create_row_with_angle(vars, at, ab, bt, bb, angle.sin() * radius as f32);
        }
        self.add_constraint(row)?;

        let row = self.create_row();
        {
            let (current, vars) = self.row_parts(row)?;
            current.create_row_with_angle(vars, al, ar, bl, br, angle.cos() * radius as f32);
        }
        self.add_constraint(row)
    }

    /// A submitted-ready row for `a = percent · c`.
    pub fn create_row_dimension_percent(
        &mut self,
        a: Variable,
        c: Variable,
        percent: f32,
    ) -> Result<RowId, SolverError> {
        let (a, c) = (self.resolve(a)?, self.resolve(c)?);
        let row = self.create_row();
        let (current, vars) = self.row_parts(row)?;
        current.create_row_dimension_percent(vars, a, c, percent);
        Ok(row)
    }
}
