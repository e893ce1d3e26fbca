//! Solver counters.

use std::fmt;

/// Running counters for one [`LinearSystem`](crate::LinearSystem).
///
/// They survive [`reset`](crate::LinearSystem::reset) so a caller can measure
/// several layout passes; use
/// [`reset_metrics`](crate::LinearSystem::reset_metrics) to start over.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metrics {
    pub table_size_increase: u64,
    pub minimize: u64,
    pub minimize_goal: u64,
    pub constraints: u64,
    pub simple_constraints: u64,
    pub optimize: u64,
    pub iterations: u64,
    pub pivots: u64,
    pub bfs: u64,
    pub variables: u64,
    pub errors: u64,
    pub slack_variables: u64,
    pub extra_variables: u64,
    pub synonyms: u64,
    pub final_values: u64,
    pub fully_solved: u64,
    pub graph_optimizer: u64,
    pub discarded_rows: u64,
    pub max_table_size: u64,
    pub max_variables: u64,
    pub max_rows: u64,
}

impl Metrics {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "*** Metrics ***")?;
        writeln!(f, "minimize: {}", self.minimize)?;
        writeln!(f, "minimizeGoal: {}", self.minimize_goal)?;
        writeln!(f, "constraints: {} ({} simple)", self.constraints, self.simple_constraints)?;
        writeln!(f, "optimize: {} ({} iterations)", self.optimize, self.iterations)?;
        writeln!(f, "pivots: {}, bfs: {}", self.pivots, self.bfs)?;
        writeln!(
            f,
            "variables: {} ({} errors, {} slack, {} extra)",
            self.variables, self.errors, self.slack_variables, self.extra_variables
        )?;
        writeln!(f, "synonyms: {}, final values: {}", self.synonyms, self.final_values)?;
        writeln!(
            f,
            "graph optimizer: {} ({} fully solved)",
            self.graph_optimizer, self.fully_solved
        )?;
        writeln!(f, "discarded rows: {}", self.discarded_rows)?;
        write!(
            f,
            "table increases: {} (max size {}, max variables {}, max rows {})",
            self.table_size_increase, self.max_table_size, self.max_variables, self.max_rows
        )
    }
}
