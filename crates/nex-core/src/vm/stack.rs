//! Operand Stack
//!
//! Bounded stack of cells. Overflow and underflow are defects in the image,
//! not guest exceptions.

use super::value::Cell;
use crate::error::{NexError, NexResult};

#[derive(Debug)]
pub struct Stack {
    values: Vec<Cell>,
    max_size: usize,
}

impl Stack {
    /// Create a stack holding at most `max_size` cells
    pub fn new(max_size: usize) -> Self {
        Stack {
            values: Vec::new(),
            max_size,
        }
    }

    /// Push a cell
    pub fn push(&mut self, value: Cell) -> NexResult<()> {
        if self.values.len() >= self.max_size {
            return Err(NexError::StackOverflow(self.max_size));
        }
        self.values.push(value);
        Ok(())
    }

    /// Pop the top cell
    pub fn pop(&mut self) -> NexResult<Cell> {
        self.values.pop().ok_or(NexError::StackUnderflow)
    }

    /// Pop `n` values, returned in the order they were pushed
    pub fn pop_n(&mut self, n: usize) -> NexResult<Vec<Cell>> {
        if n > self.values.len() {
            return Err(NexError::StackUnderflow);
        }
        Ok(self.values.split_off(self.values.len() - n))
    }

    /// Peek at the top cell
    pub fn peek(&self) -> NexResult<&Cell> {
        self.values.last().ok_or(NexError::StackUnderflow)
    }

    /// Duplicate top value
    pub fn dup(&mut self) -> NexResult<()> {
        let value = self.peek()?.clone();
        self.push(value)
    }

    /// Exchange the top two cells
    pub fn swap(&mut self) -> NexResult<()> {
        let n = self.values.len();
        if n < 2 {
            return Err(NexError::StackUnderflow);
        }
        self.values.swap(n - 1, n - 2);
        Ok(())
    }

    /// Remove the value `depth` places below the top
    pub fn remove(&mut self, depth: usize) -> NexResult<Cell> {
        let n = self.values.len();
        if depth >= n {
            return Err(NexError::StackUnderflow);
        }
        Ok(self.values.remove(n - 1 - depth))
    }

    /// Drop values until at most `height` remain
    pub fn truncate(&mut self, height: usize) {
        self.values.truncate(height);
    }

    /// Current height
    pub fn size(&self) -> usize {
        self.values.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
