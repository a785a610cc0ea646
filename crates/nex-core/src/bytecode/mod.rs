pub mod assembler;
pub mod disasm;
pub mod image;
pub mod opcode;
pub mod vint;
pub mod writer;

pub use assembler::{Assembler, Label};
pub use image::BytecodeImage;
pub use opcode::{Opcode, Operands};
pub use writer::ImageWriter;
