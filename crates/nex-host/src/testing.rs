use nex_core::bytecode::Assembler;
use nex_core::vm::{Cell, MemoryResolver, ModuleTable, PredefinedFn, VirtualMachine};
use nex_core::{NexConfig, Opcode, StepResult};

/// A machine over an empty entry module
pub(crate) fn vm() -> VirtualMachine {
    let mut asm = Assembler::new();
    asm.function("", 0, 0, 0);
    asm.op(Opcode::Ret);
    let table = ModuleTable::link(asm.finish(), &MemoryResolver::new()).expect("link");
    VirtualMachine::new(NexConfig::new(), table).expect("machine")
}

pub(crate) fn call(vm: &mut VirtualMachine, op: PredefinedFn, args: Vec<Cell>) -> StepResult<Vec<Cell>> {
    op(vm, args)
}
