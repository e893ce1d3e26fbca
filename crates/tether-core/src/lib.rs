//! Core types, configuration, and errors for the tether constraint kernel.
//!
//! This crate provides the vocabulary shared by the solver and its callers:
//! - Priority buckets (`Strength`) and their error weights
//! - Solver configuration (`SolverConfig`) replacing global engine toggles
//! - Error types

pub mod config;
pub mod errors;
pub mod types;

pub use config::*;
pub use errors::*;
pub use types::*;
