//! Dynamic object operations

use nex_core::vm::{Cell, Object, VirtualMachine};
use nex_core::{NexResult, Signal, StepResult};

use crate::args::{ret, Args};

pub fn make_null(_: &mut VirtualMachine, _: Vec<Cell>) -> StepResult<Vec<Cell>> {
    ret(Object::Null)
}

pub fn make_boolean(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    ret(Object::Boolean(Args::new(args).boolean()?))
}

pub fn make_number(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    ret(Object::Number(Args::new(args).number()?))
}

pub fn make_string(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    ret(Object::String(Args::new(args).string()?))
}

pub fn make_bytes(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    ret(Object::Bytes(Args::new(args).bytes()?))
}

pub fn make_array(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    let a = Args::new(args).array()?;
    let items = a.into_iter().map(Cell::into_object).collect::<NexResult<Vec<_>>>()?;
    ret(Object::Array(items))
}

pub fn make_dictionary(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    let d = Args::new(args).dictionary()?;
    let items = d
        .into_iter()
        .map(|(k, v)| v.into_object().map(|o| (k, o)))
        .collect::<NexResult<_>>()?;
    ret(Object::Dictionary(items))
}

pub fn is_null(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    ret(Args::new(args).object()?.is_null())
}

pub fn get_boolean(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    ret(Args::new(args).object()?.get_boolean()?)
}

pub fn get_number(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    ret(Args::new(args).object()?.get_number()?)
}

pub fn get_string(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    let o = Args::new(args).object()?;
    ret(o.get_string()?.to_string())
}

pub fn get_bytes(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    let o = Args::new(args).object()?;
    ret(Cell::Bytes(o.get_bytes()?.to_vec()))
}

pub fn get_array(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    let o = Args::new(args).object()?;
    let items = o.get_array()?.iter().cloned().map(Cell::Object).collect();
    ret(Cell::Array(items))
}

pub fn get_dictionary(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    let o = Args::new(args).object()?;
    let items = o
        .get_dictionary()?
        .iter()
        .map(|(k, v)| (k.clone(), Cell::Object(v.clone())))
        .collect();
    ret(Cell::Dictionary(items))
}

pub fn subscript(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    let mut args = Args::new(args);
    let o = args.object()?;
    let index = args.object()?;
    if o.is_null() {
        return Err(Signal::raise("DynamicConversionException", "object is null"));
    }
    if index.is_null() {
        return Err(Signal::raise("DynamicConversionException", "index is null"));
    }
    ret(o.subscript(&index)?)
}

pub fn to_string(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    ret(Args::new(args).object()?.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{call, vm};

    #[test]
    fn make_array_wraps_object_cells() {
        let mut vm = vm();
        let a = Cell::Array(vec![Cell::Object(Object::from(1.0)), Cell::Object(Object::from("x"))]);
        let r = call(&mut vm, make_array, vec![a]).unwrap();
        assert_eq!(
            r,
            vec![Cell::Object(Object::Array(vec![Object::from(1.0), Object::from("x")]))]
        );
        let s = call(&mut vm, to_string, r).unwrap();
        assert_eq!(s, vec![Cell::from("[1, \"x\"]")]);
    }

    #[test]
    fn wrong_accessor_raises_conversion() {
        let mut vm = vm();
        let r = call(&mut vm, get_number, vec![Cell::Object(Object::from("x"))]);
        assert!(matches!(r, Err(Signal::Raise(e)) if e.name == "DynamicConversionException"));
    }

    #[test]
    fn subscript_of_null_raises() {
        let mut vm = vm();
        let r = call(
            &mut vm,
            subscript,
            vec![Cell::Object(Object::Null), Cell::Object(Object::from(0.0))],
        );
        assert!(matches!(r, Err(Signal::Raise(e)) if e.info == Object::from("object is null")));
    }

    #[test]
    fn subscript_indexes_arrays() {
        let mut vm = vm();
        let a = Cell::Object(Object::Array(vec![Object::from(true)]));
        let r = call(&mut vm, subscript, vec![a, Cell::Object(Object::from(0.0))]).unwrap();
        assert_eq!(r, vec![Cell::Object(Object::from(true))]);
    }
}
