//! Bytes operations

use nex_core::vm::object::format_number;
use nex_core::vm::{Cell, Object, VirtualMachine};
use nex_core::{Signal, StepResult};

use crate::args::{clamp_range, ret, whole, Args};

pub fn concat(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    let mut args = Args::new(args);
    let mut a = args.bytes()?;
    a.extend(args.bytes()?);
    ret(Cell::Bytes(a))
}

/// Invalid UTF-8 sequences decode to U+FFFD
pub fn decode_to_string(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    let b = Args::new(args).bytes()?;
    ret(String::from_utf8_lossy(&b).into_owned())
}

pub fn index(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    let mut args = Args::new(args);
    let b = args.bytes()?;
    let n = args.number()?;
    let i = whole(n, "BytesIndexException")?;
    match b.get(i) {
        Some(x) => ret(f64::from(*x)),
        None => Err(Signal::raise("BytesIndexException", format_number(n))),
    }
}

pub fn range(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    let mut args = Args::new(args);
    let b = args.bytes()?;
    let first = args.number()?;
    let first_from_end = args.boolean()?;
    let last = args.number()?;
    let last_from_end = args.boolean()?;
    for n in [first, last] {
        if n.fract() != 0.0 {
            return Err(Signal::raise("BytesIndexException", format_number(n)));
        }
    }
    let (start, end) = clamp_range(b.len(), first, first_from_end, last, last_from_end);
    ret(Cell::Bytes(b[start..end].to_vec()))
}

pub fn size(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    ret(Args::new(args).bytes()?.len() as f64)
}

pub fn to_array(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    let b = Args::new(args).bytes()?;
    ret(Cell::Array(b.into_iter().map(|x| Cell::Number(f64::from(x))).collect()))
}

pub fn to_string(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    let b = Args::new(args).bytes()?;
    ret(Object::Bytes(b).to_string())
}
