pub mod exception;
pub mod memory;
pub mod module;
pub mod object;
pub mod predefined;
pub mod reference;
pub mod stack;
pub mod value;
pub mod vm;

pub use exception::ExceptionValue;
pub use module::{FileResolver, MemoryResolver, Module, ModuleResolver, ModuleTable};
pub use object::Object;
pub use predefined::{Predefined, PredefinedFn};
pub use reference::Reference;
pub use value::{Cell, Slot};
pub use vm::{Outcome, VirtualMachine};
