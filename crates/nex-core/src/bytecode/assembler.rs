//! Assembler
//!
//! Builds a [`BytecodeImage`] instruction by instruction, with labels for
//! forward jumps. Jump targets are always written as 5-byte integers so they
//! can be patched in place; a jump table entry is therefore exactly six bytes.

use std::collections::HashMap;

use super::image::{
    BytecodeImage, ClassInfo, ExceptionEntry, ExportFunction, ExportVariable, Function, Import,
    JUMP_TABLE_ENTRY,
};
use super::opcode::{Opcode, Operands};
use super::vint::{write_vint, write_vint_wide};

/// Width of a patched jump target
const TARGET_WIDTH: usize = JUMP_TABLE_ENTRY - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

#[derive(Debug)]
struct PendingHandler {
    start: Label,
    end: Label,
    name: usize,
    handler: Label,
    stack_depth: usize,
}

#[derive(Debug, Default)]
pub struct Assembler {
    image: BytecodeImage,
    strings: HashMap<Vec<u8>, usize>,
    labels: Vec<Option<usize>>,
    fixups: Vec<(usize, Label)>,
    handlers: Vec<PendingHandler>,
}

impl Assembler {
    /// Empty image builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string-table entry
    pub fn string(&mut self, s: impl AsRef<[u8]>) -> usize {
        let bytes = s.as_ref().to_vec();
        if let Some(&id) = self.strings.get(&bytes) {
            return id;
        }
        let id = self.image.strtable.len();
        self.image.strtable.push(bytes.clone());
        self.strings.insert(bytes, id);
        id
    }

    /// Current code offset
    pub fn offset(&self) -> usize {
        self.image.code.len()
    }

    /// Number of global slots in the image
    pub fn set_globals(&mut self, count: usize) {
        self.image.global_size = count;
    }

    /// Source hash recorded in the header
    pub fn set_source_hash(&mut self, hash: [u8; 32]) {
        self.image.source_hash = hash;
    }

    /// Start a function at the current offset; returns its index
    pub fn function(&mut self, name: &str, nest: usize, params: usize, locals: usize) -> usize {
        let name = self.string(name);
        self.image.functions.push(Function {
            name,
            nest,
            params,
            locals,
            entry: self.offset(),
        });
        self.image.functions.len() - 1
    }

    /// Declare an import
    pub fn import(&mut self, module: &str, optional: bool) {
        let name = self.string(module);
        self.image.imports.push(Import {
            name,
            optional,
            hash: [0; 32],
        });
    }

    /// Export global `index` as a number variable
    pub fn export_variable(&mut self, name: &str, index: usize) {
        let name = self.string(name);
        let vtype = self.string("N");
        self.image.export_variables.push(ExportVariable { name, vtype, index });
    }

    /// Export function `index` under `name` and `descriptor`
    pub fn export_function(&mut self, name: &str, descriptor: &str, index: usize) {
        let name = self.string(name);
        let descriptor = self.string(descriptor);
        self.image.export_functions.push(ExportFunction {
            name,
            descriptor,
            index,
        });
    }

    /// Declare a class whose interfaces list function indices
    pub fn class(&mut self, name: &str, interfaces: Vec<Vec<usize>>) {
        let name = self.string(name);
        self.image.classes.push(ClassInfo { name, interfaces });
    }

    /// Register a handler for exceptions named `name` raised in `[start, end)`
    pub fn handler(&mut self, start: Label, end: Label, name: &str, handler: Label, stack_depth: usize) {
        let name = self.string(name);
        self.handlers.push(PendingHandler {
            start,
            end,
            name,
            handler,
            stack_depth,
        });
    }

    /// New unplaced label
    pub fn label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Bind `label` to the current offset
    pub fn place(&mut self, label: Label) {
        self.labels[label.0] = Some(self.offset());
    }

    /// Label placed at the current offset
    pub fn here(&mut self) -> Label {
        let l = self.label();
        self.place(l);
        l
    }

    /// Emit an opcode with its integer operands
    pub fn emit(&mut self, op: Opcode, args: &[usize]) -> &mut Self {
        let expected = match op.operands() {
            Operands::None => 0,
            Operands::Byte | Operands::One => 1,
            Operands::Two => 2,
            Operands::Three => 3,
        };
        assert_eq!(args.len(), expected, "{} takes {} operands", op.mnemonic(), expected);
        self.image.code.push(op as u8);
        if op.operands() == Operands::Byte {
            self.image.code.push(args[0] as u8);
        } else {
            for a in args {
                write_vint(&mut self.image.code, *a as u32);
            }
        }
        self
    }

    /// Emit an opcode without operands
    pub fn op(&mut self, op: Opcode) -> &mut Self {
        self.emit(op, &[])
    }

    /// `PUSHB`
    pub fn push_bool(&mut self, b: bool) -> &mut Self {
        self.emit(Opcode::PushB, &[usize::from(b)])
    }

    /// `PUSHN` with the number interned as text
    pub fn push_number(&mut self, n: f64) -> &mut Self {
        let id = self.string(n.to_string());
        self.emit(Opcode::PushN, &[id])
    }

    /// `PUSHI`
    pub fn push_int(&mut self, n: usize) -> &mut Self {
        self.emit(Opcode::PushI, &[n])
    }

    /// `PUSHS`
    pub fn push_string(&mut self, s: &str) -> &mut Self {
        let id = self.string(s);
        self.emit(Opcode::PushS, &[id])
    }

    /// `PUSHY`
    pub fn push_bytes(&mut self, b: &[u8]) -> &mut Self {
        let id = self.string(b);
        self.emit(Opcode::PushY, &[id])
    }

    /// Emit an opcode taking one string-table operand
    pub fn with_name(&mut self, op: Opcode, name: &str) -> &mut Self {
        let id = self.string(name);
        self.emit(op, &[id])
    }

    /// `CALLP` by name
    pub fn call_predefined(&mut self, name: &str) -> &mut Self {
        self.with_name(Opcode::CallP, name)
    }

    /// `EXCEPT`: raise `name` with the payload on top of the stack
    pub fn raise(&mut self, name: &str) -> &mut Self {
        self.with_name(Opcode::Except, name)
    }

    /// `CALLMF` into `module`; `function` is `name,descriptor`
    pub fn call_module(&mut self, module: &str, function: &str) -> &mut Self {
        let m = self.string(module);
        let f = self.string(function);
        self.emit(Opcode::CallMf, &[m, f])
    }

    /// `PUSHPMG` for an exported variable of `module`
    pub fn module_global(&mut self, module: &str, variable: &str) -> &mut Self {
        let m = self.string(module);
        let v = self.string(variable);
        self.emit(Opcode::PushPmg, &[m, v])
    }

    /// Emit `JUMP`, `JF` or `JT` to `target`
    pub fn jump(&mut self, op: Opcode, target: Label) -> &mut Self {
        self.image.code.push(op as u8);
        self.target(target);
        self
    }

    /// Emit `JUMPTBL` followed by one six-byte entry per label. The default
    /// case is whatever the caller emits next.
    pub fn jump_table(&mut self, targets: &[Label]) -> &mut Self {
        self.emit(Opcode::JumpTbl, &[targets.len()]);
        for t in targets {
            self.jump(Opcode::Jump, *t);
        }
        self
    }

    fn target(&mut self, label: Label) {
        self.fixups.push((self.offset(), label));
        write_vint_wide(&mut self.image.code, 0, TARGET_WIDTH);
    }

    fn resolve(&self, label: Label) -> usize {
        self.labels[label.0].unwrap_or_else(|| panic!("label {} never placed", label.0))
    }

    /// Patch all labels and produce the image
    pub fn finish(mut self) -> BytecodeImage {
        for (pos, label) in std::mem::take(&mut self.fixups) {
            let target = self.resolve(label);
            let mut patched = Vec::with_capacity(TARGET_WIDTH);
            write_vint_wide(&mut patched, target as u32, TARGET_WIDTH);
            self.image.code[pos..pos + TARGET_WIDTH].copy_from_slice(&patched);
        }
        let handlers = std::mem::take(&mut self.handlers);
        for h in handlers {
            let entry = ExceptionEntry {
                start: self.resolve(h.start),
                end: self.resolve(h.end),
                exid: h.name,
                handler: self.resolve(h.handler),
                stack_depth: h.stack_depth,
            };
            self.image.exceptions.push(entry);
        }
        self.image
    }
}
