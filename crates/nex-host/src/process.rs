//! Child processes
//!
//! `os$spawn` runs a command line through the shell and yields an opaque
//! handle; `os$wait` takes a reference to the variable holding it.

use std::cell::RefCell;
use std::process::{Child, Command};
use std::rc::Rc;

use nex_core::vm::{Cell, VirtualMachine};
use nex_core::{NexError, Signal, StepResult};
use tracing::{debug, warn};

use crate::args::{ret, Args};

type Handle = RefCell<Option<Child>>;

pub fn platform(_: &mut VirtualMachine, _: Vec<Cell>) -> StepResult<Vec<Cell>> {
    ret(std::env::consts::OS)
}

pub fn spawn(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    let command_line = Args::new(args).string()?;
    match Command::new("/bin/sh").arg("-c").arg(&command_line).spawn() {
        Ok(child) => {
            debug!(pid = child.id(), command = %command_line, "process spawned");
            let handle: Rc<Handle> = Rc::new(RefCell::new(Some(child)));
            ret(Cell::Opaque(handle))
        }
        Err(e) => {
            warn!(command = %command_line, error = %e, "spawn failed");
            Err(Signal::raise("OsException.Spawn", e.to_string()))
        }
    }
}

/// Exit status of the child, or 1 when it did not exit normally. Waiting
/// twice on one handle reports 1.
pub fn wait(_: &mut VirtualMachine, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    let cell = Args::new(args).reference()?.load()?;
    let handle = match cell {
        Cell::Opaque(any) => any.downcast::<Handle>().ok(),
        _ => None,
    }
    .ok_or(NexError::TypeMismatch {
        expected: "process handle",
        found: "opaque",
    })?;
    let child = handle.borrow_mut().take();
    let status = match child {
        Some(mut child) => match child.wait() {
            Ok(status) => status.code().unwrap_or(1),
            Err(e) => {
                warn!(error = %e, "wait failed");
                1
            }
        },
        None => 1,
    };
    ret(f64::from(status))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::testing::{call, vm};
    use nex_core::vm::value::new_slot;
    use nex_core::vm::Reference;

    #[test]
    fn spawn_then_wait_reports_exit_status() {
        let mut vm = vm();
        let handle = call(&mut vm, spawn, vec!["exit 3".into()]).unwrap();
        let slot = new_slot(handle.into_iter().next().unwrap());
        let r = Cell::Reference(Reference::Slot(slot));
        let status = call(&mut vm, wait, vec![r.clone()]).unwrap();
        assert_eq!(status, vec![Cell::from(3.0)]);
        assert_eq!(call(&mut vm, wait, vec![r]).unwrap(), vec![Cell::from(1.0)]);
    }

    #[test]
    fn waiting_on_a_non_handle_is_fatal() {
        let mut vm = vm();
        let r = Cell::Reference(Reference::Slot(new_slot(Cell::from(1.0))));
        assert!(matches!(call(&mut vm, wait, vec![r]), Err(Signal::Fatal(_))));
    }
}
