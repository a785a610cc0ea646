//! Runtime, conversion and process-exit operations

use std::io::Write;

use nex_core::vm::object::format_number;
use nex_core::vm::{Cell, ExceptionValue, Object, VirtualMachine};
use nex_core::{NexError, Signal, StepResult};
use tracing::debug;

use crate::args::{done, ret, Args};

/// Name reported by `runtime$executorName`
pub const EXECUTOR_NAME: &str = "nex";

/// The line `print` writes for a cell
pub fn print_line(cell: &Cell) -> String {
    match cell {
        Cell::Object(Object::Null) => "NIL".to_string(),
        Cell::Object(o) => o.to_string(),
        other => other.render(),
    }
}

pub fn print(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    let line = print_line(&Args::new(args).cell());
    let mut out = std::io::stdout().lock();
    writeln!(out, "{}", line).map_err(|source| NexError::Io {
        path: "<stdout>".to_string(),
        source,
    })?;
    done()
}

pub fn number_to_string(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    ret(format_number(Args::new(args).number()?))
}

pub fn boolean_to_string(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    let b = Args::new(args).boolean()?;
    ret(if b { "TRUE" } else { "FALSE" })
}

pub fn string_to_number(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    let s = Args::new(args).string()?;
    match s.trim().parse::<f64>() {
        Ok(n) => ret(n),
        Err(_) => Err(Signal::raise("ValueRangeException", "num() argument not a number")),
    }
}

pub fn assertions_enabled(vm: &mut VirtualMachine, _: Vec<Cell>) -> StepResult<Vec<Cell>> {
    ret(vm.config().enable_assert)
}

pub fn executor_name(_: &mut VirtualMachine, _: Vec<Cell>) -> StepResult<Vec<Cell>> {
    ret(EXECUTOR_NAME)
}

pub fn is_module_imported(vm: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    let name = Args::new(args).string()?;
    ret(vm.is_module_imported(&name))
}

pub fn module_is_main(vm: &mut VirtualMachine, _: Vec<Cell>) -> StepResult<Vec<Cell>> {
    ret(vm.module_is_main())
}

pub fn set_recursion_limit(vm: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    let n = Args::new(args).number()?;
    let limit = if n > 0.0 { n as usize } else { 0 };
    debug!(limit, "recursion limit changed");
    vm.set_recursion_limit(limit);
    done()
}

/// Exit status must be a whole number in `0..=255`
pub fn exit(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    let n = Args::new(args).number()?;
    if n.fract() != 0.0 || !(0.0..=255.0).contains(&n) {
        return Err(Signal::raise(
            "InvalidValueException",
            format!("sys.exit invalid parameter: {}", format_number(n)),
        ));
    }
    Err(Signal::Exit(n as i32))
}

pub fn exception_type_to_string(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    let cell = Args::new(args).cell();
    let exc = ExceptionValue::from_cell(&cell).ok_or(NexError::TypeMismatch {
        expected: "exception",
        found: cell.type_name(),
    })?;
    ret(format!(
        "<ExceptionType:{},{},{}>",
        exc.name,
        exc.info,
        exc.offset
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{call, vm};

    #[test]
    fn exit_accepts_status_range() {
        let mut vm = vm();
        assert!(matches!(call(&mut vm, exit, vec![3.0.into()]), Err(Signal::Exit(3))));
        assert!(matches!(call(&mut vm, exit, vec![255.0.into()]), Err(Signal::Exit(255))));
        let r = call(&mut vm, exit, vec![256.0.into()]);
        assert!(matches!(
            r,
            Err(Signal::Raise(e)) if e.name == "InvalidValueException"
                && e.info == Object::from("sys.exit invalid parameter: 256")
        ));
        assert!(call(&mut vm, exit, vec![1.5.into()]).is_err());
    }

    #[test]
    fn print_renders_null_objects_as_nil() {
        assert_eq!(print_line(&Cell::Object(Object::Null)), "NIL");
        assert_eq!(print_line(&Cell::Object(Object::from(2.5))), "2.5");
        assert_eq!(print_line(&Cell::from("plain")), "plain");
    }

    #[test]
    fn num_parses_or_raises() {
        let mut vm = vm();
        assert_eq!(call(&mut vm, string_to_number, vec![" 12.5".into()]).unwrap(), vec![Cell::from(12.5)]);
        assert!(matches!(
            call(&mut vm, string_to_number, vec!["twelve".into()]),
            Err(Signal::Raise(e)) if e.name == "ValueRangeException"
        ));
    }

    #[test]
    fn runtime_queries_reflect_the_machine() {
        let mut vm = vm();
        assert_eq!(call(&mut vm, executor_name, vec![]).unwrap(), vec![Cell::from("nex")]);
        assert_eq!(call(&mut vm, assertions_enabled, vec![]).unwrap(), vec![Cell::from(true)]);
        assert_eq!(
            call(&mut vm, is_module_imported, vec!["".into()]).unwrap(),
            vec![Cell::from(true)]
        );
        assert_eq!(
            call(&mut vm, is_module_imported, vec!["absent".into()]).unwrap(),
            vec![Cell::from(false)]
        );
        call(&mut vm, set_recursion_limit, vec![7.0.into()]).unwrap();
        assert_eq!(vm.config().recursion_limit, 7);
    }

    #[test]
    fn exception_type_renders_all_fields() {
        let mut vm = vm();
        let exc = ExceptionValue {
            name: "Oops".to_string(),
            info: Object::from("why"),
            offset: 12,
        };
        let r = call(&mut vm, exception_type_to_string, vec![exc.into_cell()]).unwrap();
        assert_eq!(r, vec![Cell::from("<ExceptionType:Oops,why,12>")]);
    }
}
