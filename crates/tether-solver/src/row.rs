//! Equations of the form `key = constant + Σ coefficient · variable`.

use std::fmt;
use std::mem::size_of;

use tether_core::{RowStorageKind, Strength, VariableType};
use tracing::trace;

use crate::storage::{RowStorage, RowVariables};
use crate::variable::{Resolution, VariableTable};

/// Operations the optimizer needs from an objective.
///
/// Implemented by [`ArrayRow`] (used as a scratch goal while adding a
/// constraint) and [`PriorityGoalRow`](crate::PriorityGoalRow).
pub trait Row {
    fn key(&self) -> Option<usize>;

    fn is_empty(&self) -> bool;

    fn clear(&mut self, vars: &mut VariableTable);

    /// Entering variable for the next pivot, skipping ids marked in `avoid`.
    fn pivot_candidate(&self, vars: &VariableTable, avoid: &[bool]) -> Option<usize>;

    fn add_error(&mut self, vars: &mut VariableTable, id: usize);

    /// Substitute `definition` for its key. Returns `true` if the row was
    /// left with no terms.
    fn update_from_row(
        &mut self,
        vars: &mut VariableTable,
        definition: &ArrayRow,
        remove_from_definition: bool,
    ) -> bool;

    /// Fold a final variable into the constant. Returns `true` if the row was
    /// left with no terms.
    fn update_from_final_variable(
        &mut self,
        vars: &mut VariableTable,
        id: usize,
        remove_from_definition: bool,
    ) -> bool;
}

/// One equation of the system.
#[derive(Debug, Clone)]
pub struct ArrayRow {
    pub(crate) key: Option<usize>,
    pub(crate) constant: f32,
    pub(crate) variables: RowStorage,
    pub(crate) is_simple_definition: bool,
    pub(crate) pending: Vec<usize>,
}

impl ArrayRow {
    pub fn new(kind: RowStorageKind) -> Self {
        Self {
            key: None,
            constant: 0.0,
            variables: RowStorage::new(kind),
            is_simple_definition: false,
            pending: Vec::new(),
        }
    }

    pub fn key(&self) -> Option<usize> {
        self.key
    }

    pub fn constant(&self) -> f32 {
        self.constant
    }

    pub fn variables(&self) -> &RowStorage {
        &self.variables
    }

    pub fn is_simple_definition(&self) -> bool {
        self.is_simple_definition
    }

    pub fn has_variable(&self, id: usize) -> bool {
        self.variables.contains(id)
    }

    /// `0 = 0`: no key, no constant, no terms.
    pub fn is_empty(&self) -> bool {
        self.key.is_none() && self.constant == 0.0 && self.variables.is_empty()
    }

    /// A row keeps its key unless that key is restricted and the constant is
    /// negative.
    pub fn has_key_variable(&self, vars: &VariableTable) -> bool {
        match self.key {
            Some(key) => vars[key].kind == VariableType::Unrestricted || self.constant >= 0.0,
            None => false,
        }
    }

    /// Clear the row, detaching it from every term.
    pub(crate) fn reset(&mut self, vars: &mut VariableTable) {
        self.key = None;
        self.variables.clear(vars);
        self.constant = 0.0;
        self.is_simple_definition = false;
        self.pending.clear();
    }

    /// Clear the row without variable bookkeeping, for when the whole
    /// variable table is being recycled.
    pub(crate) fn recycle(&mut self) {
        self.key = None;
        self.variables.discard();
        self.constant = 0.0;
        self.is_simple_definition = false;
        self.pending.clear();
    }

    pub(crate) fn create_row_definition(&mut self, vars: &mut VariableTable, id: usize, value: i32) {
        self.key = Some(id);
        vars[id].computed_value = value as f32;
        self.constant = value as f32;
        self.is_simple_definition = true;
    }

    /// `variable = value`
    pub(crate) fn create_row_equals(&mut self, vars: &mut VariableTable, id: usize, value: i32) {
        if value < 0 {
            self.constant = -value as f32;
            self.variables.put(vars, id, 1.0);
        } else {
            self.constant = value as f32;
            self.variables.put(vars, id, -1.0);
        }
    }

    /// `a = b + margin`
    pub(crate) fn create_row_equals_variables(
        &mut self,
        vars: &mut VariableTable,
        a: usize,
        b: usize,
        margin: i32,
    ) {
        let sign = self.set_margin(margin);
        self.variables.put(vars, a, -sign);
        self.variables.put(vars, b, sign);
    }

    /// Store `|margin|` as the constant; returns -1 when the margin was negative.
    fn set_margin(&mut self, margin: i32) -> f32 {
        if margin != 0 {
            self.constant = margin.unsigned_abs() as f32;
        }
        if margin < 0 {
            -1.0
        } else {
            1.0
        }
    }

    pub(crate) fn add_single_error(&mut self, vars: &mut VariableTable, error: usize, sign: i32) {
        self.variables.put(vars, error, sign as f32);
    }

    /// `a >= b + margin`, closed with a slack.
    pub(crate) fn create_row_greater_than(
        &mut self,
        vars: &mut VariableTable,
        a: usize,
        b: usize,
        slack: usize,
        margin: i32,
    ) {
        let sign = self.set_margin(margin);
        self.variables.put(vars, a, -sign);
        self.variables.put(vars, b, sign);
        self.variables.put(vars, slack, sign);
    }

    /// `a >= value`, closed with a slack.
    pub(crate) fn create_row_greater_than_value(
        &mut self,
        vars: &mut VariableTable,
        a: usize,
        value: i32,
        slack: usize,
    ) {
        self.constant = value as f32;
        self.variables.put(vars, a, -1.0);
        self.variables.put(vars, slack, 1.0);
    }

    /// `a <= b + margin`, closed with a slack.
    pub(crate) fn create_row_lower_than(
        &mut self,
        vars: &mut VariableTable,
        a: usize,
        b: usize,
        slack: usize,
        margin: i32,
    ) {
        let sign = self.set_margin(margin);
        self.variables.put(vars, a, -sign);
        self.variables.put(vars, b, sign);
        self.variables.put(vars, slack, -sign);
    }

    /// Weighted chain: `(end_a - start_a) = w · (end_b - start_b)`.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn create_row_equal_match_dimensions(
        &mut self,
        vars: &mut VariableTable,
        current_weight: f32,
        total_weights: f32,
        next_weight: f32,
        start_a: usize,
        end_a: usize,
        start_b: usize,
        end_b: usize,
    ) {
        self.constant = 0.0;
        if total_weights == 0.0 || current_weight == next_weight {
            self.variables.put(vars, start_a, 1.0);
            self.variables.put(vars, end_a, -1.0);
            self.variables.put(vars, end_b, 1.0);
            self.variables.put(vars, start_b, -1.0);
        } else if current_weight == 0.0 {
            self.variables.put(vars, start_a, 1.0);
            self.variables.put(vars, end_a, -1.0);
        } else if next_weight == 0.0 {
            self.variables.put(vars, start_b, 1.0);
            self.variables.put(vars, end_b, -1.0);
        } else {
            let weight = (current_weight / total_weights) / (next_weight / total_weights);
            self.variables.put(vars, start_a, 1.0);
            self.variables.put(vars, end_a, -1.0);
            self.variables.put(vars, end_b, weight);
            self.variables.put(vars, start_b, -weight);
        }
    }

    /// Weighted chain with margins on every edge.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn create_row_equal_dimension(
        &mut self,
        vars: &mut VariableTable,
        current_weight: f32,
        total_weights: f32,
        next_weight: f32,
        start_a: usize,
        margin_start_a: i32,
        end_a: usize,
        margin_end_a: i32,
        start_b: usize,
        margin_start_b: i32,
        end_b: usize,
        margin_end_b: i32,
    ) {
        let weight = if total_weights == 0.0 || current_weight == next_weight {
            1.0
        } else {
            (current_weight / total_weights) / (next_weight / total_weights)
        };
        self.constant = (-margin_start_a - margin_end_a) as f32
            + weight * margin_start_b as f32
            + weight * margin_end_b as f32;
        self.variables.put(vars, start_a, 1.0);
        self.variables.put(vars, end_a, -1.0);
        self.variables.put(vars, end_b, weight);
        self.variables.put(vars, start_b, -weight);
    }

    /// Place `b`/`c` between `a` and `d`, `bias` of the way from `a`.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn create_row_centering(
        &mut self,
        vars: &mut VariableTable,
        a: usize,
        b: usize,
        margin_a: i32,
        bias: f32,
        c: usize,
        d: usize,
        margin_b: i32,
    ) {
        if b == c {
            self.variables.put(vars, a, 1.0);
            self.variables.put(vars, d, 1.0);
            self.variables.put(vars, b, -2.0);
            return;
        }
        if bias == 0.5 {
            self.variables.put(vars, a, 1.0);
            self.variables.put(vars, b, -1.0);
            self.variables.put(vars, c, -1.0);
            self.variables.put(vars, d, 1.0);
            if margin_a > 0 || margin_b > 0 {
                self.constant = (-margin_a + margin_b) as f32;
            }
        } else if bias <= 0.0 {
            self.variables.put(vars, a, -1.0);
            self.variables.put(vars, b, 1.0);
            self.constant = margin_a as f32;
        } else if bias >= 1.0 {
            self.variables.put(vars, d, -1.0);
            self.variables.put(vars, c, 1.0);
            self.constant = -margin_b as f32;
        } else {
            self.variables.put(vars, a, 1.0 - bias);
            self.variables.put(vars, b, -(1.0 - bias));
            self.variables.put(vars, c, -bias);
            self.variables.put(vars, d, bias);
            if margin_a > 0 || margin_b > 0 {
                self.constant = -margin_a as f32 * (1.0 - bias) + margin_b as f32 * bias;
            }
        }
    }

    /// `a = percent · c`
    pub(crate) fn create_row_dimension_percent(
        &mut self,
        vars: &mut VariableTable,
        a: usize,
        c: usize,
        percent: f32,
    ) {
        self.variables.put(vars, a, -1.0);
        self.variables.put(vars, c, percent);
    }

    /// `(b - a) = ratio · (d - c)`
    pub(crate) fn create_row_dimension_ratio(
        &mut self,
        vars: &mut VariableTable,
        a: usize,
        b: usize,
        c: usize,
        d: usize,
        ratio: f32,
    ) {
        self.variables.put(vars, a, -1.0);
        self.variables.put(vars, b, 1.0);
        self.variables.put(vars, c, ratio);
        self.variables.put(vars, d, -ratio);
    }

    /// Offset the center of `(bt, bb)` from the center of `(at, ab)`.
    pub(crate) fn create_row_with_angle(
        &mut self,
        vars: &mut VariableTable,
        at: usize,
        ab: usize,
        bt: usize,
        bb: usize,
        angle_component: f32,
    ) {
        self.variables.put(vars, bt, 0.5);
        self.variables.put(vars, bb, 0.5);
        self.variables.put(vars, at, -0.5);
        self.variables.put(vars, ab, -0.5);
        self.constant = -angle_component;
    }

    pub fn size_in_bytes(&self) -> usize {
        let key = if self.key.is_some() { size_of::<usize>() } else { 0 };
        key + size_of::<f32>() + size_of::<bool>() + self.variables.size_in_bytes()
    }

    pub(crate) fn ensure_positive_constant(&mut self) {
        if self.constant < 0.0 {
            self.constant = -self.constant;
            self.variables.invert();
        }
    }

    /// Pivot on a subject picked from the terms. Returns `true` when no
    /// subject exists and the caller must supply an extra variable.
    pub(crate) fn choose_subject(&mut self, vars: &mut VariableTable) -> bool {
        let needs_extra = match self.choose_subject_in_variables(vars) {
            Some(subject) => {
                self.pivot(vars, subject);
                false
            }
            None => true,
        };
        if self.variables.is_empty() {
            self.is_simple_definition = true;
        }
        needs_extra
    }

    /// Prefer an unrestricted term (smallest coefficient, then one no other
    /// row uses); otherwise a restricted term with a negative coefficient under
    /// the same rules.
    pub fn choose_subject_in_variables(&self, vars: &VariableTable) -> Option<usize> {
        #[derive(Clone, Copy)]
        struct Candidate {
            id: usize,
            amount: f32,
            is_new: bool,
        }

        fn better(current: Option<Candidate>, amount: f32, is_new: bool) -> bool {
            match current {
                None => true,
                Some(best) => best.amount > amount || (!best.is_new && is_new),
            }
        }

        let mut unrestricted: Option<Candidate> = None;
        let mut restricted: Option<Candidate> = None;
        for (id, amount) in self.variables.terms() {
            let variable = &vars[id];
            let is_new = variable.usage_in_row_count <= 1;
            if variable.kind == VariableType::Unrestricted {
                if better(unrestricted, amount, is_new) {
                    unrestricted = Some(Candidate { id, amount, is_new });
                }
            } else if unrestricted.is_none()
                && amount < 0.0
                && better(restricted, amount, is_new)
            {
                restricted = Some(Candidate { id, amount, is_new });
            }
        }
        unrestricted.or(restricted).map(|candidate| candidate.id)
    }

    /// Make `entering` the key, solving the row for it.
    pub(crate) fn pivot(&mut self, vars: &mut VariableTable, entering: usize) {
        if let Some(old_key) = self.key.take() {
            self.variables.put(vars, old_key, -1.0);
            vars[old_key].clear_definition();
        }
        let amount = -self.variables.remove(vars, entering, true);
        self.key = Some(entering);
        trace!(entering, amount, "pivot");
        if amount == 1.0 {
            return;
        }
        self.constant /= amount;
        self.variables.divide_by_amount(amount);
    }

    pub(crate) fn pick_pivot(&self, vars: &VariableTable, exclude: Option<usize>) -> Option<usize> {
        self.pick_pivot_in_variables(vars, None, exclude)
    }

    /// Most negative slack or error term not avoided or excluded.
    pub(crate) fn pick_pivot_in_variables(
        &self,
        vars: &VariableTable,
        avoid: Option<&[bool]>,
        exclude: Option<usize>,
    ) -> Option<usize> {
        let mut value = 0.0;
        let mut pivot = None;
        for (id, current) in self.variables.terms() {
            if current >= 0.0 || exclude == Some(id) {
                continue;
            }
            if avoid.is_some_and(|avoid| avoid.get(id).copied().unwrap_or(false)) {
                continue;
            }
            let kind = vars[id].kind;
            if matches!(kind, VariableType::Slack | VariableType::Error) && current < value {
                value = current;
                pivot = Some(id);
            }
        }
        pivot
    }

    /// Copy the terms of `row` (not its constant or key).
    pub(crate) fn init_from_row(&mut self, vars: &mut VariableTable, row: &ArrayRow) {
        self.key = None;
        self.variables.clear(vars);
        for (id, value) in row.variables.terms() {
            self.variables.add(vars, id, value, true);
        }
    }

    /// Add a `+ep - em` pair of already created error variables.
    pub(crate) fn add_error_pair(&mut self, vars: &mut VariableTable, positive: usize, negative: usize) {
        self.variables.put(vars, positive, 1.0);
        self.variables.put(vars, negative, -1.0);
    }

    pub(crate) fn update_from_synonym_variable(
        &mut self,
        vars: &mut VariableTable,
        id: usize,
        remove_from_definition: bool,
    ) -> bool {
        let Resolution::Synonym { of, delta } = vars[id].resolution else {
            return false;
        };
        let value = self.variables.get(id);
        self.constant += delta * value;
        self.variables.remove(vars, id, remove_from_definition);
        self.variables.add(vars, of, value, remove_from_definition);
        self.variables.is_empty()
    }

    pub fn display<'a>(&'a self, vars: &'a VariableTable) -> RowDisplay<'a> {
        RowDisplay { row: self, vars }
    }
}

impl Row for ArrayRow {
    fn key(&self) -> Option<usize> {
        self.key
    }

    fn is_empty(&self) -> bool {
        ArrayRow::is_empty(self)
    }

    fn clear(&mut self, vars: &mut VariableTable) {
        self.variables.clear(vars);
        self.key = None;
        self.constant = 0.0;
    }

    fn pivot_candidate(&self, vars: &VariableTable, avoid: &[bool]) -> Option<usize> {
        self.pick_pivot_in_variables(vars, Some(avoid), None)
    }

    fn add_error(&mut self, vars: &mut VariableTable, id: usize) {
        let weight = Strength::from_bucket(vars[id].strength).map_or(1.0, Strength::error_weight);
        self.variables.put(vars, id, weight);
    }

    fn update_from_row(
        &mut self,
        vars: &mut VariableTable,
        definition: &ArrayRow,
        remove_from_definition: bool,
    ) -> bool {
        let value = self
            .variables
            .use_definition(vars, definition, remove_from_definition);
        self.constant += definition.constant * value;
        self.key.is_some() && self.variables.is_empty()
    }

    fn update_from_final_variable(
        &mut self,
        vars: &mut VariableTable,
        id: usize,
        remove_from_definition: bool,
    ) -> bool {
        if !vars[id].is_final_value() {
            return false;
        }
        let value = self.variables.get(id);
        self.constant += vars[id].computed_value * value;
        self.variables.remove(vars, id, remove_from_definition);
        self.variables.is_empty()
    }
}

/// Renders a row as `key = constant + a x - b y`.
pub struct RowDisplay<'a> {
    row: &'a ArrayRow,
    vars: &'a VariableTable,
}

impl fmt::Display for RowDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.row.key {
            Some(key) => write!(f, "{} = ", self.vars[key])?,
            None => write!(f, "0 = ")?,
        }
        let mut written = false;
        if self.row.constant != 0.0 {
            write!(f, "{}", self.row.constant)?;
            written = true;
        }
        for (id, value) in self.row.variables.terms() {
            let mut amount = value;
            if written {
                if amount > 0.0 {
                    write!(f, " + ")?;
                } else {
                    write!(f, " - ")?;
                    amount = -amount;
                }
            } else if amount < 0.0 {
                write!(f, "- ")?;
                amount = -amount;
            }
            if amount == 1.0 {
                write!(f, "{}", self.vars[id])?;
            } else {
                write!(f, "{} {}", amount, self.vars[id])?;
            }
            written = true;
        }
        if !written {
            write!(f, "0")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_support::table;

    fn row() -> ArrayRow {
        ArrayRow::new(RowStorageKind::Linked)
    }

    fn terms(row: &ArrayRow) -> Vec<(usize, f32)> {
        row.variables.terms().collect()
    }

    #[test]
    fn test_create_row_equals_normalizes_sign() {
        let mut vars = table(2);
        let mut positive = row();
        positive.create_row_equals(&mut vars, 1, 10);
        assert_eq!(positive.constant(), 10.0);
        assert_eq!(terms(&positive), vec![(1, -1.0)]);

        let mut negative = row();
        negative.create_row_equals(&mut vars, 2, -4);
        assert_eq!(negative.constant(), 4.0);
        assert_eq!(terms(&negative), vec![(2, 1.0)]);
    }

    #[test]
    fn test_greater_and_lower_than_rows() {
        let mut vars = table(3);
        let mut greater = row();
        greater.create_row_greater_than(&mut vars, 1, 2, 3, 5);
        assert_eq!(greater.constant(), 5.0);
        assert_eq!(terms(&greater), vec![(1, -1.0), (2, 1.0), (3, 1.0)]);

        let mut inverse = row();
        inverse.create_row_greater_than(&mut vars, 1, 2, 3, -5);
        assert_eq!(inverse.constant(), 5.0);
        assert_eq!(terms(&inverse), vec![(1, 1.0), (2, -1.0), (3, -1.0)]);

        let mut lower = row();
        lower.create_row_lower_than(&mut vars, 1, 2, 3, 0);
        assert_eq!(lower.constant(), 0.0);
        assert_eq!(terms(&lower), vec![(1, -1.0), (2, 1.0), (3, -1.0)]);
    }

    #[test]
    fn test_centering_variants() {
        let mut vars = table(4);
        let mut coincident = row();
        coincident.create_row_centering(&mut vars, 1, 2, 0, 0.5, 2, 4, 0);
        assert_eq!(terms(&coincident), vec![(1, 1.0), (2, -2.0), (4, 1.0)]);

        let mut half = row();
        half.create_row_centering(&mut vars, 1, 2, 8, 0.5, 3, 4, 2);
        assert_eq!(half.constant(), -6.0);
        assert_eq!(terms(&half), vec![(1, 1.0), (2, -1.0), (3, -1.0), (4, 1.0)]);

        let mut start = row();
        start.create_row_centering(&mut vars, 1, 2, 3, 0.0, 3, 4, 0);
        assert_eq!(start.constant(), 3.0);
        assert_eq!(terms(&start), vec![(1, -1.0), (2, 1.0)]);

        let mut end = row();
        end.create_row_centering(&mut vars, 1, 2, 0, 1.0, 3, 4, 7);
        assert_eq!(end.constant(), -7.0);
        assert_eq!(terms(&end), vec![(3, 1.0), (4, -1.0)]);

        let mut quarter = row();
        quarter.create_row_centering(&mut vars, 1, 2, 4, 0.25, 3, 4, 4);
        assert!((quarter.constant() - (-3.0 + 1.0)).abs() < 0.001);
        assert_eq!(terms(&quarter), vec![(1, 0.75), (2, -0.75), (3, -0.25), (4, 0.25)]);
    }

    #[test]
    fn test_ratio_percent_and_angle() {
        let mut vars = table(4);
        let mut ratio = row();
        ratio.create_row_dimension_ratio(&mut vars, 1, 2, 3, 4, 2.0);
        assert_eq!(terms(&ratio), vec![(1, -1.0), (2, 1.0), (3, 2.0), (4, -2.0)]);

        let mut percent = row();
        percent.create_row_dimension_percent(&mut vars, 1, 3, 0.5);
        assert_eq!(terms(&percent), vec![(1, -1.0), (3, 0.5)]);

        let mut angle = row();
        angle.create_row_with_angle(&mut vars, 1, 2, 3, 4, 10.0);
        assert_eq!(angle.constant(), -10.0);
        assert_eq!(terms(&angle), vec![(1, -0.5), (2, -0.5), (3, 0.5), (4, 0.5)]);
    }

    #[test]
    fn test_equal_dimension_weights() {
        let mut vars = table(4);
        let mut even = row();
        even.create_row_equal_match_dimensions(&mut vars, 1.0, 2.0, 1.0, 1, 2, 3, 4);
        assert_eq!(terms(&even), vec![(1, 1.0), (2, -1.0), (3, -1.0), (4, 1.0)]);

        let mut weighted = row();
        weighted.create_row_equal_match_dimensions(&mut vars, 2.0, 3.0, 1.0, 1, 2, 3, 4);
        assert_eq!(terms(&weighted), vec![(1, 1.0), (2, -1.0), (3, -2.0), (4, 2.0)]);

        let mut margins = row();
        margins.create_row_equal_dimension(&mut vars, 2.0, 3.0, 1.0, 1, 1, 2, 2, 3, 3, 4, 4);
        assert!((margins.constant() - 11.0).abs() < 0.001);
    }

    #[test]
    fn test_pivot_divides_by_coefficient() {
        // 0 = 10 - 2 x + y  =>  x = 5 + 0.5 y
        let mut vars = table(2);
        let mut row = row();
        row.constant = 10.0;
        row.variables.put(&mut vars, 1, -2.0);
        row.variables.put(&mut vars, 2, 1.0);

        row.pivot(&mut vars, 1);
        assert_eq!(row.key(), Some(1));
        assert_eq!(row.constant(), 5.0);
        assert_eq!(terms(&row), vec![(2, 0.5)]);
        assert!(vars[1].clients().is_empty());

        // re-pivot on y: y = -10 + 2 x
        row.pivot(&mut vars, 2);
        assert_eq!(row.key(), Some(2));
        assert_eq!(row.constant(), -10.0);
        assert_eq!(terms(&row), vec![(1, 2.0)]);
    }

    #[test]
    fn test_choose_subject_prefers_unrestricted() {
        let mut vars = table(3);
        vars[1].kind = VariableType::Slack;
        let mut row = row();
        row.variables.put(&mut vars, 1, -3.0);
        row.variables.put(&mut vars, 2, 1.0);
        row.variables.put(&mut vars, 3, -1.0);
        assert_eq!(row.choose_subject_in_variables(&vars), Some(3));

        let mut restricted = ArrayRow::new(RowStorageKind::Hashed);
        restricted.variables.put(&mut vars, 1, -3.0);
        assert_eq!(restricted.choose_subject_in_variables(&vars), Some(1));

        let mut none = ArrayRow::new(RowStorageKind::Hashed);
        none.variables.put(&mut vars, 1, 2.0);
        assert_eq!(none.choose_subject_in_variables(&vars), None);
        assert!(none.choose_subject(&mut vars));
    }

    #[test]
    fn test_pick_pivot_skips_unrestricted_and_excluded() {
        let mut vars = table(4);
        vars[2].kind = VariableType::Slack;
        vars[3].kind = VariableType::Error;
        let mut row = row();
        row.variables.put(&mut vars, 1, -10.0);
        row.variables.put(&mut vars, 2, -1.0);
        row.variables.put(&mut vars, 3, -2.0);

        assert_eq!(row.pick_pivot(&vars, None), Some(3));
        assert_eq!(row.pick_pivot(&vars, Some(3)), Some(2));
        let avoid = [false, false, true, true, false];
        assert_eq!(row.pivot_candidate(&vars, &avoid), None);
    }

    #[test]
    fn test_has_key_variable() {
        let mut vars = table(2);
        vars[2].kind = VariableType::Slack;
        let mut row = row();
        assert!(!row.has_key_variable(&vars));
        row.key = Some(1);
        row.constant = -1.0;
        assert!(row.has_key_variable(&vars));
        row.key = Some(2);
        assert!(!row.has_key_variable(&vars));
    }

    #[test]
    fn test_update_from_final_variable() {
        let mut vars = table(2);
        let mut row = row();
        row.key = Some(2);
        row.constant = 1.0;
        row.variables.put(&mut vars, 1, 3.0);
        vars[1].resolution = Resolution::Final;
        vars[1].computed_value = 2.0;

        assert!(row.update_from_final_variable(&mut vars, 1, true));
        assert_eq!(row.constant(), 7.0);
        // the table decides whether an emptied row becomes simple
        assert!(!row.is_simple_definition());
        assert!(vars[1].clients().is_empty());
    }

    #[test]
    fn test_update_from_synonym_variable() {
        let mut vars = table(3);
        let mut row = row();
        row.variables.put(&mut vars, 1, 2.0);
        row.variables.put(&mut vars, 3, 1.0);
        vars[1].resolution = Resolution::Synonym { of: 3, delta: 4.0 };

        assert!(!row.update_from_synonym_variable(&mut vars, 1, true));
        assert_eq!(row.constant(), 8.0);
        assert_eq!(terms(&row), vec![(3, 3.0)]);
    }

    #[test]
    fn test_add_error_uses_strength_weight() {
        let mut vars = table(2);
        vars[1].strength = Strength::Highest.bucket();
        vars[2].strength = Strength::None.bucket();
        let mut goal = row();
        goal.add_error(&mut vars, 1);
        goal.add_error(&mut vars, 2);
        assert_eq!(terms(&goal), vec![(1, 1e9), (2, 1.0)]);
    }

    #[test]
    fn test_readable_string() {
        let mut vars = table(3);
        vars[1].name = Some("x".to_string());
        vars[2].name = Some("y".to_string());
        let mut row = row();
        row.key = Some(1);
        row.constant = 10.0;
        row.variables.put(&mut vars, 2, 1.0);
        row.variables.put(&mut vars, 3, -2.5);
        assert_eq!(row.display(&vars).to_string(), "x = 10 + y - 2.5 U3");

        let empty = ArrayRow::new(RowStorageKind::Linked);
        assert_eq!(empty.display(&vars).to_string(), "0 = 0");
    }
}
