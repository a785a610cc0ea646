//! Dictionary operations
//!
//! Keys are kept ordered, so `keys` and the renderings come out sorted.

use nex_core::vm::object::quoted;
use nex_core::vm::{Cell, VirtualMachine};
use nex_core::StepResult;

use crate::args::{done, ret, Args};

pub fn keys(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    let d = Args::new(args).dictionary()?;
    ret(Cell::Array(d.into_keys().map(Cell::String).collect()))
}

pub fn remove(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    let mut args = Args::new(args);
    let r = args.reference()?;
    let key = args.string()?;
    r.modify(|c| {
        if let Cell::Dictionary(d) = c {
            d.remove(&key);
        }
    })?;
    done()
}

pub fn size(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    ret(Args::new(args).dictionary()?.len() as f64)
}

fn render(args: Vec<Cell>, value: impl Fn(&Cell) -> String) -> StepResult<Vec<Cell>> {
    let d = Args::new(args).dictionary()?;
    let items: Vec<String> = d
        .iter()
        .map(|(k, v)| format!("{}: {}", quoted(k), value(v)))
        .collect();
    ret(format!("{{{}}}", items.join(", ")))
}

pub fn string_to_string(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    render(args, |v| quoted(v.as_str().unwrap_or_default()))
}

pub fn object_to_string(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    render(args, |v| match v {
        Cell::Object(o) => o.to_literal_string(),
        other => other.render(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{call, vm};
    use nex_core::vm::value::new_slot;
    use nex_core::vm::Reference;

    fn dict(pairs: &[(&str, &str)]) -> Cell {
        Cell::Dictionary(pairs.iter().map(|(k, v)| (k.to_string(), Cell::from(*v))).collect())
    }

    #[test]
    fn keys_are_sorted() {
        let mut vm = vm();
        let r = call(&mut vm, keys, vec![dict(&[("b", "2"), ("a", "1")])]).unwrap();
        assert_eq!(r, vec![Cell::Array(vec![Cell::from("a"), Cell::from("b")])]);
    }

    #[test]
    fn remove_goes_through_the_reference() {
        let mut vm = vm();
        let slot = new_slot(dict(&[("a", "1"), ("b", "2")]));
        let r = Cell::Reference(Reference::Slot(slot.clone()));
        call(&mut vm, remove, vec![r.clone(), "a".into()]).unwrap();
        call(&mut vm, remove, vec![r, "missing".into()]).unwrap();
        assert_eq!(*slot.borrow(), dict(&[("b", "2")]));
    }

    #[test]
    fn renders_string_values_quoted() {
        let mut vm = vm();
        let r = call(&mut vm, string_to_string, vec![dict(&[("k", "v")])]).unwrap();
        assert_eq!(r, vec![Cell::from("{\"k\": \"v\"}")]);
    }
}
