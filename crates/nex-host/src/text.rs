//! String operations
//!
//! Lengths and indices count characters, not bytes.

use nex_core::vm::object::{format_number, quoted as quote};
use nex_core::vm::{Cell, VirtualMachine};
use nex_core::{Signal, StepResult};

use crate::args::{clamp_range, done, ret, whole, Args};

pub fn append(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    let mut args = Args::new(args);
    let r = args.reference()?;
    let tail = args.string()?;
    r.modify(|c| {
        let mut s = match std::mem::take(c) {
            Cell::String(s) => s,
            _ => String::new(),
        };
        s.push_str(&tail);
        *c = Cell::String(s);
    })?;
    done()
}

pub fn concat(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    let mut args = Args::new(args);
    let mut s = args.string()?;
    s.push_str(&args.string()?);
    ret(s)
}

pub fn index(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    let mut args = Args::new(args);
    let s = args.string()?;
    let n = args.number()?;
    let i = whole(n, "StringIndexException")?;
    match s.chars().nth(i) {
        Some(c) => ret(c.to_string()),
        None => Err(Signal::raise("StringIndexException", format_number(n))),
    }
}

pub fn length(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    let s = Args::new(args).string()?;
    ret(s.chars().count() as f64)
}

pub fn substring(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    let mut args = Args::new(args);
    let s = args.string()?;
    let first = args.number()?;
    let first_from_end = args.boolean()?;
    let last = args.number()?;
    let last_from_end = args.boolean()?;
    for n in [first, last] {
        if n.fract() != 0.0 {
            return Err(Signal::raise("StringIndexException", format_number(n)));
        }
    }
    let chars: Vec<char> = s.chars().collect();
    let (start, end) = clamp_range(chars.len(), first, first_from_end, last, last_from_end);
    ret(chars[start..end].iter().collect::<String>())
}

pub fn to_bytes(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    let s = Args::new(args).string()?;
    ret(Cell::Bytes(s.into_bytes()))
}

pub fn to_string(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    ret(Args::new(args).string()?)
}

pub fn lower(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    ret(Args::new(args).string()?.to_lowercase())
}

pub fn upper(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    ret(Args::new(args).string()?.to_uppercase())
}

pub fn quoted(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    ret(quote(&Args::new(args).string()?))
}

/// Yields `[0]` when absent, `[1, index]` when found
pub fn find(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    let mut args = Args::new(args);
    let s = args.string()?;
    let t = args.string()?;
    let found = match s.find(&t) {
        Some(at) => vec![Cell::from(1.0), Cell::from(s[..at].chars().count() as f64)],
        None => vec![Cell::from(0.0)],
    };
    ret(Cell::Array(found))
}

pub fn split(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    let mut args = Args::new(args);
    let s = args.string()?;
    let d = args.string()?;
    let parts: Vec<Cell> = if d.is_empty() {
        s.chars().map(|c| Cell::from(c.to_string())).collect()
    } else {
        s.split(d.as_str()).map(Cell::from).collect()
    };
    ret(Cell::Array(parts))
}

pub fn from_code_point(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    let n = Args::new(args).number()?;
    if n.fract() != 0.0 {
        return Err(Signal::raise("ValueRangeException", "fromCodePoint() argument not an integer"));
    }
    match u32::try_from(n as i64).ok().and_then(char::from_u32) {
        Some(c) => ret(c.to_string()),
        None => Err(Signal::raise(
            "ValueRangeException",
            "fromCodePoint() argument out of range 0-0x10ffff",
        )),
    }
}

pub fn to_code_point(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    let s = Args::new(args).string()?;
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => ret(c as u32 as f64),
        _ => Err(Signal::raise(
            "StringIndexException",
            "toCodePoint() requires string of length 1",
        )),
    }
}
