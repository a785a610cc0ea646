//! Neon Executor - Host Library
//!
//! The predefined operations a program reaches through `CALLP`, and the
//! predefined globals reached through `PUSHPPG`. Everything here is
//! mechanical: the core decides when an operation runs, this crate only
//! supplies what it does.

pub mod array;
pub mod bytes;
pub mod dictionary;
pub mod math;
pub mod object;
pub mod process;
pub mod runtime;
pub mod text;

mod args;
#[cfg(test)]
mod testing;

use nex_core::vm::{Cell, Predefined, VirtualMachine};
use tracing::debug;

macro_rules! table {
    ($($name:literal => $params:literal, $run:path;)*) => {
        &[$(Predefined { name: $name, params: $params, run: $run },)*]
    };
}

/// Every operation the host provides
pub static PREDEFINED: &[Predefined] = table! {
    "print" => 1, runtime::print;
    "str" => 1, runtime::number_to_string;
    "number__toString" => 1, runtime::number_to_string;
    "boolean__toString" => 1, runtime::boolean_to_string;
    "num" => 1, runtime::string_to_number;
    "exceptiontype__toString" => 1, runtime::exception_type_to_string;
    "runtime$assertionsEnabled" => 0, runtime::assertions_enabled;
    "runtime$executorName" => 0, runtime::executor_name;
    "runtime$isModuleImported" => 1, runtime::is_module_imported;
    "runtime$moduleIsMain" => 0, runtime::module_is_main;
    "runtime$setRecursionLimit" => 1, runtime::set_recursion_limit;
    "sys$exit" => 1, runtime::exit;

    "array__append" => 2, array::append;
    "array__concat" => 2, array::concat;
    "array__extend" => 2, array::extend;
    "array__find" => 2, array::find;
    "array__range" => 3, array::range;
    "array__remove" => 2, array::remove;
    "array__resize" => 2, array::resize;
    "array__reversed" => 1, array::reversed;
    "array__size" => 1, array::size;
    "array__slice" => 5, array::slice;
    "array__toBytes__number" => 1, array::to_bytes;
    "array__toString__number" => 1, array::number_to_string;
    "array__toString__object" => 1, array::object_to_string;
    "array__toString__string" => 1, array::string_to_string;

    "string__append" => 2, text::append;
    "string__concat" => 2, text::concat;
    "string__index" => 2, text::index;
    "string__length" => 1, text::length;
    "string__substring" => 5, text::substring;
    "string__toBytes" => 1, text::to_bytes;
    "string__toString" => 1, text::to_string;
    "string$find" => 2, text::find;
    "string$fromCodePoint" => 1, text::from_code_point;
    "string$lower" => 1, text::lower;
    "string$quoted" => 1, text::quoted;
    "string$split" => 2, text::split;
    "string$toCodePoint" => 1, text::to_code_point;
    "string$upper" => 1, text::upper;

    "bytes__concat" => 2, bytes::concat;
    "bytes__decodeToString" => 1, bytes::decode_to_string;
    "bytes__index" => 2, bytes::index;
    "bytes__range" => 5, bytes::range;
    "bytes__size" => 1, bytes::size;
    "bytes__toArray" => 1, bytes::to_array;
    "bytes__toString" => 1, bytes::to_string;

    "dictionary__keys" => 1, dictionary::keys;
    "dictionary__remove" => 2, dictionary::remove;
    "dictionary__size" => 1, dictionary::size;
    "dictionary__toString__object" => 1, dictionary::object_to_string;
    "dictionary__toString__string" => 1, dictionary::string_to_string;

    "object__makeNull" => 0, object::make_null;
    "object__makeBoolean" => 1, object::make_boolean;
    "object__makeNumber" => 1, object::make_number;
    "object__makeString" => 1, object::make_string;
    "object__makeBytes" => 1, object::make_bytes;
    "object__makeArray" => 1, object::make_array;
    "object__makeDictionary" => 1, object::make_dictionary;
    "object__isNull" => 1, object::is_null;
    "object__getBoolean" => 1, object::get_boolean;
    "object__getNumber" => 1, object::get_number;
    "object__getString" => 1, object::get_string;
    "object__getBytes" => 1, object::get_bytes;
    "object__getArray" => 1, object::get_array;
    "object__getDictionary" => 1, object::get_dictionary;
    "object__subscript" => 2, object::subscript;
    "object__toString" => 1, object::to_string;

    "math$abs" => 1, math::abs;
    "math$ceil" => 1, math::ceil;
    "math$exp" => 1, math::exp;
    "math$floor" => 1, math::floor;
    "math$intdiv" => 2, math::intdiv;
    "math$log" => 1, math::log;
    "math$max" => 2, math::max;
    "math$min" => 2, math::min;
    "math$odd" => 1, math::odd;
    "math$sign" => 1, math::sign;
    "math$sqrt" => 1, math::sqrt;
    "math$trunc" => 1, math::trunc;

    "os$platform" => 0, process::platform;
    "os$spawn" => 1, process::spawn;
    "os$wait" => 1, process::wait;
};

/// `sys$args` as the program sees it
pub fn sys_args(args: &[String]) -> Cell {
    Cell::Array(args.iter().map(|a| Cell::from(a.as_str())).collect())
}

/// Attach the host operations and globals to a machine
pub fn install(vm: VirtualMachine, program_args: &[String]) -> VirtualMachine {
    let mut vm = vm.with_predefined(PREDEFINED);
    vm.set_predefined_global("sys$args", sys_args(program_args));
    debug!(operations = PREDEFINED.len(), args = program_args.len(), "host installed");
    vm
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use nex_core::bytecode::{Assembler, ImageWriter};
    use nex_core::vm::MemoryResolver;
    use nex_core::{link, NexConfig, Opcode, Outcome};

    fn run(asm: Assembler, args: &[String]) -> (VirtualMachine, Outcome) {
        let bytes = ImageWriter::write(&asm.finish());
        let table = link(&bytes, &MemoryResolver::new()).unwrap();
        let vm = VirtualMachine::new(NexConfig::new(), table).unwrap();
        let mut vm = install(vm, args);
        let outcome = vm.run().unwrap();
        (vm, outcome)
    }

    fn global(vm: &VirtualMachine, index: usize) -> Cell {
        let root = vm.modules().root().unwrap();
        let cell = root.globals[index].borrow().clone();
        cell
    }

    #[test]
    fn names_are_unique() {
        let names: HashSet<&str> = PREDEFINED.iter().map(|p| p.name).collect();
        assert_eq!(names.len(), PREDEFINED.len());
    }

    #[test]
    fn program_reads_sys_args() {
        let mut a = Assembler::new();
        a.set_globals(1);
        a.function("", 0, 0, 0);
        a.with_name(Opcode::PushPpg, "sys$args").op(Opcode::LoadA);
        a.call_predefined("array__size");
        a.emit(Opcode::PushPg, &[0]).op(Opcode::StoreN);
        a.op(Opcode::Ret);
        let args = vec!["one".to_string(), "two".to_string()];
        let (vm, outcome) = run(a, &args);
        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(global(&vm, 0), Cell::from(2.0));
    }

    #[test]
    fn sys_exit_ends_the_run() {
        let mut a = Assembler::new();
        a.set_globals(1);
        a.function("", 0, 0, 0);
        a.push_number(4.0).call_predefined("sys$exit");
        a.push_bool(true).emit(Opcode::PushPg, &[0]).op(Opcode::StoreB);
        a.op(Opcode::Ret);
        let (vm, outcome) = run(a, &[]);
        assert_eq!(outcome, Outcome::Exited(4));
        assert_eq!(global(&vm, 0), Cell::None);
    }

    #[test]
    fn invalid_exit_status_is_catchable() {
        let mut a = Assembler::new();
        a.set_globals(1);
        a.function("", 0, 0, 0);
        let start = a.here();
        a.push_number(300.0).call_predefined("sys$exit");
        a.op(Opcode::Ret);
        let end = a.here();
        let handler = a.here();
        a.call_predefined("exceptiontype__toString");
        a.emit(Opcode::PushPg, &[0]).op(Opcode::StoreS);
        a.op(Opcode::Ret);
        a.handler(start, end, "InvalidValueException", handler, 0);
        let (vm, outcome) = run(a, &[]);
        assert_eq!(outcome, Outcome::Completed);
        let Cell::String(s) = global(&vm, 0) else { panic!("expected string") };
        assert!(s.starts_with("<ExceptionType:InvalidValueException,sys.exit invalid parameter: 300,"));
    }

    #[test]
    fn string_building_through_references() {
        let mut a = Assembler::new();
        a.set_globals(1);
        a.function("", 0, 0, 0);
        a.emit(Opcode::PushPg, &[0]).push_string("ab").call_predefined("string__append");
        a.emit(Opcode::PushPg, &[0]).push_string("cd").call_predefined("string__append");
        a.op(Opcode::Ret);
        let (vm, _) = run(a, &[]);
        assert_eq!(global(&vm, 0), Cell::from("abcd"));
    }
}
