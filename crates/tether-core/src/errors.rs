//! Error types for the tether kernel.

use thiserror::Error;

/// Errors surfaced by the solver's public API.
///
/// Degenerate rows, unresolvable helper variables and exhausted iteration
/// budgets are not errors: the solver keeps its best-effort state instead.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("Variable {id} does not belong to the current solver pass")]
    StaleVariable { id: usize },

    #[error("Row {index} is no longer live")]
    StaleRow { index: u32 },

    #[error("System still infeasible after {iterations} iterations ({rows} rows with a negative constant)")]
    Infeasible { iterations: usize, rows: usize },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors raised while validating a [`SolverConfig`](crate::SolverConfig).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("The max pool size must be > 0 (got {size} for the {pool} pool)")]
    InvalidPoolSize { pool: &'static str, size: usize },

    #[error("Initial table size must be at least {min}, got {size}")]
    TableTooSmall { size: usize, min: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = SolverError::StaleVariable { id: 4 };
        assert_eq!(err.to_string(), "Variable 4 does not belong to the current solver pass");

        let err: SolverError = ConfigError::InvalidPoolSize { pool: "row", size: 0 }.into();
        assert!(matches!(err, SolverError::Config(_)));
        assert_eq!(err.to_string(), "The max pool size must be > 0 (got 0 for the row pool)");
    }
}
