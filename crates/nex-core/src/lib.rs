//! Neon Executor - Core Library
//!
//! Public API surface for the executor core.

pub mod bytecode;
pub mod config;
pub mod error;
pub mod loader;
pub mod vm;

// Re-export commonly used types
pub use bytecode::opcode::Opcode;
pub use config::NexConfig;
pub use error::{NexError, NexResult, RaisedException, Signal, StepResult};
pub use loader::BytecodeLoader;
pub use vm::vm::{Outcome, VirtualMachine};

/// Load the entry image and link everything it imports
pub fn link(root: &[u8], resolver: &dyn vm::ModuleResolver) -> NexResult<vm::ModuleTable> {
    let image = BytecodeLoader::load(root)?;
    vm::ModuleTable::link(image, resolver)
}
