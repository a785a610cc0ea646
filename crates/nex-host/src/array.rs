//! Array operations
//!
//! Mutating operations take a reference to the array variable as their
//! first argument; the rest take the array by value.

use nex_core::vm::object::{format_number, quoted};
use nex_core::vm::{Cell, Reference, VirtualMachine};
use nex_core::{Signal, StepResult};

use crate::args::{clamp_range, done, ret, whole, Args};

/// Apply `f` to the array behind a reference, creating it if empty
fn with_array(reference: &Reference, f: impl FnOnce(&mut Vec<Cell>)) -> StepResult {
    reference.modify(|c| {
        if !matches!(c, Cell::Array(_)) {
            *c = Cell::Array(Vec::new());
        }
        if let Cell::Array(a) = c {
            f(a);
        }
    })?;
    Ok(())
}

pub fn append(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    let mut args = Args::new(args);
    let r = args.reference()?;
    let element = args.cell();
    with_array(&r, |a| a.push(element))?;
    done()
}

pub fn concat(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    let mut args = Args::new(args);
    let mut a = args.array()?;
    a.extend(args.array()?);
    ret(Cell::Array(a))
}

pub fn extend(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    let mut args = Args::new(args);
    let r = args.reference()?;
    let tail = args.array()?;
    with_array(&r, |a| a.extend(tail))?;
    done()
}

pub fn find(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    let mut args = Args::new(args);
    let a = args.array()?;
    let element = args.cell();
    match a.iter().position(|x| *x == element) {
        Some(i) => ret(i as f64),
        None => Err(Signal::raise("ArrayIndexException", "value not found in array")),
    }
}

/// Inclusive numeric range from `first` to `last` by `step`
pub fn range(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    let mut args = Args::new(args);
    let first = args.number()?;
    let last = args.number()?;
    let step = args.number()?;
    if step == 0.0 || step.is_nan() {
        return Err(Signal::raise("ValueRangeException", format_number(step)));
    }
    let mut r = Vec::new();
    let mut i = first;
    while (step > 0.0 && i <= last) || (step < 0.0 && i >= last) {
        r.push(Cell::Number(i));
        i += step;
    }
    ret(Cell::Array(r))
}

pub fn remove(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    let mut args = Args::new(args);
    let r = args.reference()?;
    let n = args.number()?;
    let index = whole(n, "ArrayIndexException")?;
    let removed = r.modify(|c| match c {
        Cell::Array(a) if index < a.len() => {
            a.remove(index);
            true
        }
        _ => false,
    })?;
    if !removed {
        return Err(Signal::raise("ArrayIndexException", format_number(n)));
    }
    done()
}

pub fn resize(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    let mut args = Args::new(args);
    let r = args.reference()?;
    let size = whole(args.number()?, "ArrayIndexException")?;
    with_array(&r, |a| a.resize(size, Cell::None))?;
    done()
}

pub fn reversed(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    let mut a = Args::new(args).array()?;
    a.reverse();
    ret(Cell::Array(a))
}

pub fn size(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    let a = Args::new(args).array()?;
    ret(a.len() as f64)
}

pub fn slice(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    let mut args = Args::new(args);
    let a = args.array()?;
    let first = args.number()?;
    let first_from_end = args.boolean()?;
    let last = args.number()?;
    let last_from_end = args.boolean()?;
    for n in [first, last] {
        if n.fract() != 0.0 {
            return Err(Signal::raise("ArrayIndexException", format_number(n)));
        }
    }
    let (start, end) = clamp_range(a.len(), first, first_from_end, last, last_from_end);
    ret(Cell::Array(a[start..end].to_vec()))
}

pub fn to_bytes(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    let a = Args::new(args).array()?;
    let mut b = Vec::with_capacity(a.len());
    for x in &a {
        let n = x.as_number()?;
        if !(0.0..256.0).contains(&n) {
            return Err(Signal::raise("ByteOutOfRangeException", format_number(n)));
        }
        b.push(n as u8);
    }
    ret(Cell::Bytes(b))
}

fn render(a: &[Cell], item: impl Fn(&Cell) -> String) -> String {
    let items: Vec<String> = a.iter().map(item).collect();
    format!("[{}]", items.join(", "))
}

pub fn number_to_string(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    let a = Args::new(args).array()?;
    ret(render(&a, |x| format_number(x.as_number().unwrap_or(f64::NAN))))
}

pub fn string_to_string(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    let a = Args::new(args).array()?;
    ret(render(&a, |x| quoted(x.as_str().unwrap_or_default())))
}

pub fn object_to_string(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    let a = Args::new(args).array()?;
    ret(render(&a, |x| match x {
        Cell::Object(o) => o.to_literal_string(),
        other => other.render(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{call, vm};
    use nex_core::vm::value::new_slot;

    fn numbers(ns: &[f64]) -> Cell {
        Cell::Array(ns.iter().map(|n| Cell::from(*n)).collect())
    }

    #[test]
    fn append_through_reference_creates_array() {
        let mut vm = vm();
        let slot = new_slot(Cell::None);
        let r = Cell::Reference(Reference::Slot(slot.clone()));
        call(&mut vm, append, vec![r.clone(), Cell::from(1.0)]).unwrap();
        call(&mut vm, append, vec![r, Cell::from(2.0)]).unwrap();
        assert_eq!(*slot.borrow(), numbers(&[1.0, 2.0]));
    }

    #[test]
    fn range_counts_in_both_directions() {
        let mut vm = vm();
        let up = call(&mut vm, range, vec![1.0.into(), 3.0.into(), 1.0.into()]).unwrap();
        assert_eq!(up, vec![numbers(&[1.0, 2.0, 3.0])]);
        let down = call(&mut vm, range, vec![3.0.into(), 1.0.into(), (-1.0).into()]).unwrap();
        assert_eq!(down, vec![numbers(&[3.0, 2.0, 1.0])]);
        let zero = call(&mut vm, range, vec![1.0.into(), 3.0.into(), 0.0.into()]);
        assert!(matches!(zero, Err(Signal::Raise(e)) if e.name == "ValueRangeException"));
    }

    #[test]
    fn find_raises_when_missing() {
        let mut vm = vm();
        let a = numbers(&[4.0, 5.0]);
        assert_eq!(call(&mut vm, find, vec![a.clone(), 5.0.into()]).unwrap(), vec![Cell::from(1.0)]);
        assert!(matches!(
            call(&mut vm, find, vec![a, 6.0.into()]),
            Err(Signal::Raise(e)) if e.name == "ArrayIndexException"
        ));
    }

    #[test]
    fn remove_past_the_end_raises() {
        let mut vm = vm();
        let slot = new_slot(numbers(&[1.0, 2.0, 3.0]));
        let r = Cell::Reference(Reference::Slot(slot.clone()));
        call(&mut vm, remove, vec![r.clone(), 1.0.into()]).unwrap();
        assert_eq!(*slot.borrow(), numbers(&[1.0, 3.0]));
        assert!(call(&mut vm, remove, vec![r, 2.0.into()]).is_err());
    }

    #[test]
    fn slice_counts_from_end() {
        let mut vm = vm();
        let a = numbers(&[1.0, 2.0, 3.0, 4.0]);
        let r = call(
            &mut vm,
            slice,
            vec![a, 1.0.into(), false.into(), 0.0.into(), true.into()],
        )
        .unwrap();
        assert_eq!(r, vec![numbers(&[2.0, 3.0, 4.0])]);
    }

    #[test]
    fn to_bytes_rejects_out_of_range() {
        let mut vm = vm();
        let ok = call(&mut vm, to_bytes, vec![numbers(&[0.0, 255.0])]).unwrap();
        assert_eq!(ok, vec![Cell::Bytes(vec![0, 255])]);
        assert!(call(&mut vm, to_bytes, vec![numbers(&[256.0])]).is_err());
    }

    #[test]
    fn renders_strings_quoted() {
        let mut vm = vm();
        let a = Cell::Array(vec![Cell::from("a"), Cell::from("b\"")]);
        let r = call(&mut vm, string_to_string, vec![a]).unwrap();
        assert_eq!(r, vec![Cell::from("[\"a\", \"b\\\"\"]")]);
    }
}
