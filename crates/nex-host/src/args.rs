//! Argument access for predefined operations
//!
//! Arguments arrive in the order they were pushed. Each accessor consumes
//! the next one and converts it, with `none` reading as the type's default.

use std::collections::BTreeMap;

use nex_core::vm::object::format_number;
use nex_core::vm::{Cell, Object, Reference};
use nex_core::{NexResult, Signal, StepResult};

pub(crate) struct Args(std::vec::IntoIter<Cell>);

impl Args {
    pub fn new(cells: Vec<Cell>) -> Self {
        Args(cells.into_iter())
    }

    pub fn cell(&mut self) -> Cell {
        self.0.next().unwrap_or_default()
    }

    pub fn boolean(&mut self) -> NexResult<bool> {
        self.cell().as_boolean()
    }

    pub fn number(&mut self) -> NexResult<f64> {
        self.cell().as_number()
    }

    pub fn string(&mut self) -> NexResult<String> {
        self.cell().into_string()
    }

    pub fn bytes(&mut self) -> NexResult<Vec<u8>> {
        self.cell().into_bytes()
    }

    pub fn array(&mut self) -> NexResult<Vec<Cell>> {
        self.cell().into_array()
    }

    pub fn dictionary(&mut self) -> NexResult<BTreeMap<String, Cell>> {
        self.cell().into_dictionary()
    }

    pub fn object(&mut self) -> NexResult<Object> {
        self.cell().into_object()
    }

    pub fn reference(&mut self) -> NexResult<Reference> {
        self.cell().into_reference()
    }
}

/// Single result
pub(crate) fn ret(value: impl Into<Cell>) -> StepResult<Vec<Cell>> {
    Ok(vec![value.into()])
}

/// No results
pub(crate) fn done() -> StepResult<Vec<Cell>> {
    Ok(Vec::new())
}

/// A non-negative whole number, or `exception` carrying the offending value
pub(crate) fn whole(n: f64, exception: &str) -> StepResult<usize> {
    if n < 0.0 || n.fract() != 0.0 || n.is_nan() || n >= usize::MAX as f64 {
        return Err(Signal::raise(exception, format_number(n)));
    }
    Ok(n as usize)
}

/// Resolve an inclusive `[first, last]` range over `len` items, either end
/// optionally counted back from the last item, into a clamped half-open
/// range. An inverted range is empty.
pub(crate) fn clamp_range(
    len: usize,
    first: f64,
    first_from_end: bool,
    last: f64,
    last_from_end: bool,
) -> (usize, usize) {
    let len = len as i64;
    let mut first = first as i64;
    let mut last = last as i64;
    if first_from_end {
        first = first.saturating_add(len - 1);
    }
    if last_from_end {
        last = last.saturating_add(len - 1);
    }
    let first = first.clamp(0, len);
    let last = last.clamp(-1, len - 1);
    if last < first {
        return (first as usize, first as usize);
    }
    (first as usize, (last + 1) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_clamps_both_ends() {
        assert_eq!(clamp_range(5, 1.0, false, 3.0, false), (1, 4));
        assert_eq!(clamp_range(5, -3.0, false, 10.0, false), (0, 5));
        assert_eq!(clamp_range(5, 0.0, false, 0.0, true), (0, 5));
        assert_eq!(clamp_range(5, -1.0, true, 0.0, true), (3, 5));
        assert_eq!(clamp_range(5, 3.0, false, 1.0, false), (3, 3));
        assert_eq!(clamp_range(0, 0.0, false, 0.0, true), (0, 0));
    }

    #[test]
    fn range_survives_offsets_beyond_i64() {
        assert_eq!(clamp_range(3, 1e19, true, 0.0, true), (3, 3));
        assert_eq!(clamp_range(3, -1e19, true, 1e19, true), (0, 3));
        assert_eq!(clamp_range(3, 0.0, false, -1e19, true), (0, 0));
    }

    #[test]
    fn whole_rejects_fractions_and_negatives() {
        assert_eq!(whole(3.0, "X").ok(), Some(3));
        assert!(matches!(whole(1.5, "X"), Err(Signal::Raise(e)) if e.name == "X"));
        assert!(whole(-1.0, "X").is_err());
        assert!(whole(1e20, "X").is_err());
    }
}
