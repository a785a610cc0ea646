//! Predefined Operations
//!
//! The seam where the host library attaches. `CALLP` names an operation by
//! string; the operation receives its arguments in the order they were
//! pushed and returns the cells to push, or a signal instead.

use std::collections::HashMap;
use std::fmt;

use super::value::Cell;
use super::vm::VirtualMachine;
use crate::error::StepResult;

pub type PredefinedFn = fn(&mut VirtualMachine, Vec<Cell>) -> StepResult<Vec<Cell>>;

#[derive(Clone, Copy)]
pub struct Predefined {
    pub name: &'static str,
    /// Number of operands popped
    pub params: usize,
    pub run: PredefinedFn,
}

impl fmt::Debug for Predefined {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Predefined({}/{})", self.name, self.params)
    }
}

/// Name-indexed view over a static operation list
#[derive(Debug, Default)]
pub struct PredefinedTable {
    ops: HashMap<&'static str, Predefined>,
}

impl PredefinedTable {
    /// Index `ops` by name
    pub fn new(ops: &'static [Predefined]) -> Self {
        PredefinedTable {
            ops: ops.iter().map(|op| (op.name, *op)).collect(),
        }
    }

    /// Operation named `name`
    pub fn get(&self, name: &str) -> Option<Predefined> {
        self.ops.get(name).copied()
    }

    /// Number of operations
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether no operation is installed
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}
