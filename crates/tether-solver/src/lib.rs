//! Incremental priority-aware simplex kernel for the tether layout engine.
//!
//! This crate resolves edge-to-edge layout constraints into positions:
//! - Variables and rows pooled across layout passes (`Cache`, `Pool`)
//! - Two interchangeable sparse row storages (`ArrayLinkedVariables`,
//!   `SolverVariableValues`)
//! - A multi-priority goal row (`PriorityGoalRow`)
//! - The equation table with its two-phase solve (`LinearSystem`)
//!
//! # Example
//!
//! ```
//! use tether_solver::{AnchorKey, LinearSystem, Strength};
//!
//! let mut system = LinearSystem::new();
//! let left = system.create_object_variable(AnchorKey(1));
//! let right = system.create_object_variable(AnchorKey(2));
//! system.add_equality_value(left, 10)?;
//! system.add_greater_than(right, left, 50, Strength::Fixed)?;
//! system.minimize()?;
//! assert!(system.value(right)? >= 60.0 - 0.001);
//! # Ok::<(), tether_solver::SolverError>(())
//! ```

mod arena;
pub mod cache;
mod constraints;
mod editor;
pub mod goal;
pub mod metrics;
pub mod row;
pub mod storage;
mod system;
pub mod variable;

pub use cache::{Cache, Pool};
pub use constraints::Edges;
pub use editor::RowEditor;
pub use goal::{GoalDisplay, PriorityGoalRow};
pub use metrics::Metrics;
pub use row::{ArrayRow, Row, RowDisplay};
pub use storage::{ArrayLinkedVariables, RowStorage, RowVariables, SolverVariableValues, Terms};
pub use system::LinearSystem;
pub use variable::{Resolution, RowId, RowRef, SolverVariable, Variable, VariableTable};

pub use tether_core::{
    AnchorKey, ConfigError, RowStorageKind, SolverConfig, SolverError, Strength, VariableType,
    MAX_STRENGTH,
};
