//! Free lists for rows and variables, reused across solver passes.

use crate::row::ArrayRow;
use crate::variable::{SolverVariable, VariableTable};

/// Bounded free list.
///
/// `acquire` hands back the most recently released instance. Released items
/// must already be reset by the caller.
#[derive(Debug)]
pub struct Pool<T> {
    items: Vec<T>,
    max_size: usize,
}

impl<T> Pool<T> {
    pub fn new(max_size: usize) -> Self {
        Self {
            items: Vec::with_capacity(max_size.min(64)),
            max_size,
        }
    }

    pub fn acquire(&mut self) -> Option<T> {
        self.items.pop()
    }

    /// Returns `false` (dropping the item) when the pool is full.
    pub fn release(&mut self, item: T) -> bool {
        if self.items.len() < self.max_size {
            self.items.push(item);
            true
        } else {
            false
        }
    }

    pub fn release_all(&mut self, items: impl IntoIterator<Item = T>) {
        for item in items {
            if !self.release(item) {
                break;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }
}

/// Pools plus the per-pass variable table.
#[derive(Debug)]
pub struct Cache {
    pub(crate) row_pool: Pool<ArrayRow>,
    pub(crate) variable_pool: Pool<SolverVariable>,
    pub(crate) variables: VariableTable,
}

impl Cache {
    pub fn new(row_pool_size: usize, variable_pool_size: usize, table_size: usize) -> Self {
        Self {
            row_pool: Pool::new(row_pool_size),
            variable_pool: Pool::new(variable_pool_size),
            variables: VariableTable::with_size(table_size),
        }
    }

    pub fn variables(&self) -> &VariableTable {
        &self.variables
    }

    pub fn row_pool(&self) -> &Pool<ArrayRow> {
        &self.row_pool
    }

    pub fn variable_pool(&self) -> &Pool<SolverVariable> {
        &self.variable_pool
    }

    /// Return every live variable to the pool.
    pub(crate) fn recycle_variables(&mut self) {
        let Cache {
            variable_pool,
            variables,
            ..
        } = self;
        variable_pool.release_all(variables.drain().map(|mut variable| {
            variable.reset();
            variable
        }));
    }
}
