//! Solver configuration.

use crate::errors::ConfigError;

/// Smallest accepted initial table size.
pub const MIN_TABLE_SIZE: usize = 4;

/// Sparse storage strategy used by every row of a system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RowStorageKind {
    /// Array-backed singly linked list sorted by variable id
    #[default]
    Linked,
    /// Linked list plus a fixed-size hash index for lookups
    Hashed,
}

/// Options controlling which storage and simplifications a system uses.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SolverConfig {
    /// Row storage strategy
    pub storage: RowStorageKind,
    /// Fold rows that reduce to `key = constant` into final values
    pub simplify_synonyms: bool,
    /// Resolve fixed equalities against final values without creating rows
    pub use_basic_synonyms: bool,
    /// Record fixed `a = b + margin` equalities as synonyms when possible
    pub use_synonyms: bool,
    /// Only scan a row's own terms when restoring feasibility
    pub skip_columns: bool,
    /// Skip the simplex when every row is already a simple definition
    pub graph_optimizer: bool,
    /// Fail `minimize` when feasibility could not be restored
    pub verify_feasibility: bool,
    /// Initial size of the row and column tables
    pub table_size: usize,
    /// Capacity of the recycled row pool
    pub row_pool_size: usize,
    /// Capacity of the recycled variable pool
    pub variable_pool_size: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            storage: RowStorageKind::Linked,
            simplify_synonyms: true,
            use_basic_synonyms: true,
            use_synonyms: false,
            skip_columns: true,
            graph_optimizer: false,
            verify_feasibility: false,
            table_size: 32,
            row_pool_size: 256,
            variable_pool_size: 256,
        }
    }
}

impl SolverConfig {
    /// Default configuration using hashed row storage.
    pub fn optimized() -> Self {
        Self {
            storage: RowStorageKind::Hashed,
            ..Self::default()
        }
    }

    pub fn with_storage(mut self, storage: RowStorageKind) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_synonyms(mut self, enabled: bool) -> Self {
        self.use_synonyms = enabled;
        self
    }

    pub fn with_graph_optimizer(mut self, enabled: bool) -> Self {
        self.graph_optimizer = enabled;
        self
    }

    pub fn with_feasibility_check(mut self, enabled: bool) -> Self {
        self.verify_feasibility = enabled;
        self
    }

    /// Check the sizes before a system is built from this configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.table_size < MIN_TABLE_SIZE {
            return Err(ConfigError::TableTooSmall {
                size: self.table_size,
                min: MIN_TABLE_SIZE,
            });
        }
        if self.row_pool_size == 0 {
            return Err(ConfigError::InvalidPoolSize {
                pool: "row",
                size: 0,
            });
        }
        if self.variable_pool_size == 0 {
            return Err(ConfigError::InvalidPoolSize {
                pool: "variable",
                size: 0,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SolverConfig::default();
        assert_eq!(config.storage, RowStorageKind::Linked);
        assert!(config.simplify_synonyms);
        assert!(config.use_basic_synonyms);
        assert!(!config.use_synonyms);
        assert_eq!(config.table_size, 32);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_optimized_uses_hashed_storage() {
        assert_eq!(SolverConfig::optimized().storage, RowStorageKind::Hashed);
    }

    #[test]
    fn test_validate_rejects_empty_pools() {
        let config = SolverConfig {
            row_pool_size: 0,
            ..SolverConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidPoolSize { pool: "row", size: 0 })
        );

        let config = SolverConfig {
            table_size: 1,
            ..SolverConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TableTooSmall { size: 1, .. })
        ));
    }
}
