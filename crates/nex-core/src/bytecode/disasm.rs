//! Disassembler
//!
//! Renders an image's instruction stream one instruction per line.
//! No execution semantics.

use std::fmt::Write;

use super::image::BytecodeImage;
use super::opcode::{Opcode, Operands};
use super::vint::read_vint;
use crate::error::{NexError, NexResult};

/// Opcodes whose operands are all string-table ids
fn names_strings(op: Opcode) -> bool {
    use Opcode::*;
    matches!(
        op,
        PushN | PushS | PushY | PushPpg | PushPmg | CallP | CallMf | Except | PushPeg | PushCi
    )
}

/// One line per instruction: offset, mnemonic and decoded operands
pub fn disassemble(image: &BytecodeImage) -> NexResult<String> {
    let mut out = String::new();
    let code = &image.code;
    let mut ip = 0;
    while ip < code.len() {
        for f in image.functions.iter().filter(|f| f.entry == ip) {
            let name = String::from_utf8_lossy(image.bytes(f.name)?);
            writeln!(
                out,
                "; {} (nest {}, params {}, locals {})",
                name, f.nest, f.params, f.locals
            )
            .ok();
        }
        let start = ip;
        let op = Opcode::from_u8(code[ip]).ok_or(NexError::InvalidOpcode {
            opcode: code[ip],
            offset: ip,
        })?;
        ip += 1;

        let count = match op.operands() {
            Operands::None => 0,
            Operands::Byte => {
                let b = *code.get(ip).ok_or(NexError::Truncated { offset: ip, needed: 1 })?;
                ip += 1;
                writeln!(out, "{:6}  {:<8} {}", start, op.mnemonic(), b).ok();
                continue;
            }
            Operands::One => 1,
            Operands::Two => 2,
            Operands::Three => 3,
        };

        let mut line = format!("{:6}  {:<8}", start, op.mnemonic());
        for _ in 0..count {
            let v = read_vint(code, &mut ip)?;
            if names_strings(op) {
                write!(line, " {}={:?}", v, String::from_utf8_lossy(image.bytes(v)?)).ok();
            } else {
                write!(line, " {}", v).ok();
            }
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::assembler::Assembler;

    #[test]
    fn renders_operands_and_function_headers() {
        let mut asm = Assembler::new();
        asm.function("main", 0, 0, 1);
        asm.push_string("hi");
        asm.emit(Opcode::PushPl, &[0]);
        asm.op(Opcode::Ret);
        let text = disassemble(&asm.finish()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "; main (nest 0, params 0, locals 1)");
        assert!(lines[1].contains("PUSHS") && lines[1].contains("\"hi\""));
        assert!(lines[2].ends_with("PUSHPL   0"));
        assert!(lines[3].ends_with("RET"));
    }

    #[test]
    fn rejects_unknown_opcode() {
        let image = BytecodeImage {
            code: vec![200],
            ..BytecodeImage::default()
        };
        assert!(matches!(
            disassemble(&image),
            Err(NexError::InvalidOpcode { opcode: 200, offset: 0 })
        ));
    }
}
