//! Virtual Machine Core
//!
//! The fetch-decode-execute loop. Execution starts by invoking the entry
//! module's first function, then every imported module's first function in
//! initializer order; the loop ends when control returns to the end of the
//! entry module's code.

use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use tracing::{debug, trace};

use super::exception::ExceptionValue;
use super::memory::Frames;
use super::module::{Module, ModuleTable};
use super::object::format_number;
use super::predefined::{Predefined, PredefinedTable};
use super::reference::Reference;
use super::stack::Stack;
use super::value::{new_slot, Cell, ClassRef, Slot};
use crate::bytecode::image::JUMP_TABLE_ENTRY;
use crate::bytecode::opcode::Opcode;
use crate::bytecode::vint::read_vint;
use crate::config::NexConfig;
use crate::error::{NexError, NexResult, Signal, StepResult};

/// Where `RET` resumes
#[derive(Debug, Clone)]
pub struct ReturnAddress {
    pub module: Rc<Module>,
    pub ip: usize,
}

/// How a run ended
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Completed,
    Exited(i32),
    Unhandled(ExceptionValue),
}

#[derive(Debug)]
pub struct VirtualMachine {
    config: NexConfig,
    modules: ModuleTable,
    root: Rc<Module>,

    pub(crate) module: Rc<Module>,
    pub(crate) ip: usize,
    pub(crate) stack: Stack,
    pub(crate) callstack: Vec<ReturnAddress>,
    pub(crate) frames: Frames,

    predefined: PredefinedTable,
    predefined_globals: HashMap<String, Slot>,
}

/// Validate an array subscript: whole, non-negative and representable
fn array_index(n: f64) -> StepResult<usize> {
    if n < 0.0 || n.fract() != 0.0 || n >= usize::MAX as f64 {
        return Err(Signal::raise("ArrayIndexException", format_number(n)));
    }
    Ok(n as usize)
}

impl VirtualMachine {
    /// Machine positioned before the entry module
    pub fn new(config: NexConfig, modules: ModuleTable) -> NexResult<Self> {
        let root = modules.root()?;
        Ok(VirtualMachine {
            stack: Stack::new(config.max_stack_size),
            module: Rc::clone(&root),
            ip: root.image.code.len(),
            root,
            modules,
            callstack: Vec::new(),
            frames: Frames::new(),
            predefined: PredefinedTable::default(),
            predefined_globals: HashMap::new(),
            config,
        })
    }

    /// Attach the predefined operations reachable through `CALLP`
    pub fn with_predefined(mut self, ops: &'static [Predefined]) -> Self {
        self.predefined = PredefinedTable::new(ops);
        self
    }

    /// Bind a predefined global such as `sys$args`
    pub fn set_predefined_global(&mut self, name: impl Into<String>, value: Cell) {
        self.predefined_globals.insert(name.into(), new_slot(value));
    }

    /// Active configuration
    pub fn config(&self) -> &NexConfig {
        &self.config
    }

    /// Change the call-depth limit
    pub fn set_recursion_limit(&mut self, limit: usize) {
        self.config.recursion_limit = limit;
    }

    /// Whether `name` was linked
    pub fn is_module_imported(&self, name: &str) -> bool {
        self.modules.is_imported(name)
    }

    /// Whether the currently executing module is the entry module
    pub fn module_is_main(&self) -> bool {
        Rc::ptr_eq(&self.module, &self.root)
    }

    /// Linked modules
    pub fn modules(&self) -> &ModuleTable {
        &self.modules
    }

    /// Operand stack height
    pub fn stack_height(&self) -> usize {
        self.stack.size()
    }

    /// Active calls
    pub fn call_depth(&self) -> usize {
        self.callstack.len()
    }

    /// Top of the operand stack, if any
    pub fn peek(&self) -> Option<&Cell> {
        self.stack.peek().ok()
    }

    /// Run the program to completion, exit or unhandled exception
    pub fn run(&mut self) -> NexResult<Outcome> {
        self.module = Rc::clone(&self.root);
        self.ip = self.root.image.code.len();
        self.invoke(Rc::clone(&self.root), 0)?;
        let order = self.modules.init_order().to_vec();
        for m in order {
            debug!(module = %m.name, "scheduling initializer");
            self.invoke(m, 0)?;
        }

        loop {
            if self.ip >= self.module.image.code.len() {
                if self.module_is_main() {
                    debug!("program completed");
                    return Ok(Outcome::Completed);
                }
                return Err(NexError::InstructionOutOfRange {
                    module: self.module.name.clone(),
                    ip: self.ip,
                });
            }
            match self.step() {
                Ok(()) => {}
                Err(Signal::Raise(exc)) => {
                    if let Err(unhandled) = self.unwind(exc)? {
                        return Ok(Outcome::Unhandled(unhandled));
                    }
                }
                Err(Signal::Exit(code)) => {
                    debug!(code, "exit requested");
                    return Ok(Outcome::Exited(code));
                }
                Err(Signal::Fatal(err)) => return Err(err),
            }
        }
    }

    /// Push a return address and a frame, then jump to the function entry
    fn invoke(&mut self, module: Rc<Module>, index: usize) -> NexResult<()> {
        let f = module.function(index)?.clone();
        let opstack_depth = self
            .stack
            .size()
            .checked_sub(f.params)
            .ok_or(NexError::StackUnderflow)?;
        self.frames.enter(f.nest, f.locals, opstack_depth)?;
        self.callstack.push(ReturnAddress {
            module: Rc::clone(&self.module),
            ip: self.ip,
        });
        trace!(module = %module.name, function = index, entry = f.entry, "invoke");
        self.module = module;
        self.ip = f.entry;
        Ok(())
    }

    fn check_recursion(&self) -> StepResult {
        if self.callstack.len() >= self.config.recursion_limit {
            return Err(Signal::raise("StackOverflowException", ""));
        }
        Ok(())
    }

    /// Execute a single instruction
    fn step(&mut self) -> StepResult {
        let start = self.ip;
        let byte = self.module.image.code[start];
        let op = Opcode::from_u8(byte).ok_or(NexError::InvalidOpcode {
            opcode: byte,
            offset: start,
        })?;
        self.ip += 1;
        trace!(module = %self.module.name, ip = start, op = op.mnemonic(), height = self.stack.size());

        match op {
            // Immediate pushes
            Opcode::PushB => {
                let b = self.byte_operand()?;
                self.push(b != 0)
            }
            Opcode::PushN => {
                let id = self.operand()?;
                let text = self.string(id)?;
                let n = text
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| NexError::InvalidNumberLiteral(text.clone()))?;
                self.push(n)
            }
            Opcode::PushS => {
                let id = self.operand()?;
                let s = self.string(id)?;
                self.push(s)
            }
            Opcode::PushY => {
                let id = self.operand()?;
                let b = self.module.image.bytes(id)?.to_vec();
                self.push(Cell::Bytes(b))
            }
            Opcode::PushI => {
                let n = self.operand()?;
                self.push(n as f64)
            }

            // Address pushes
            Opcode::PushPg => {
                let index = self.operand()?;
                let slot = self.module.global(index)?;
                self.push(Reference::Slot(slot))
            }
            Opcode::PushPpg => {
                let id = self.operand()?;
                let name = self.string(id)?;
                let slot = self
                    .predefined_globals
                    .get(&name)
                    .cloned()
                    .ok_or(NexError::UnknownPredefinedGlobal(name))?;
                self.push(Reference::Slot(slot))
            }
            Opcode::PushPmg => {
                let m = self.operand()?;
                let v = self.operand()?;
                let module = self.modules.get(&self.string(m)?)?;
                let slot = module.export_variable(&self.string(v)?)?;
                self.push(Reference::Slot(slot))
            }
            Opcode::PushPl => {
                let index = self.operand()?;
                let slot = self.frames.local(index)?;
                self.push(Reference::Slot(slot))
            }
            Opcode::PushPol => {
                let back = self.operand()?;
                let index = self.operand()?;
                let slot = self.frames.outer_local(back, index)?;
                self.push(Reference::Slot(slot))
            }
            Opcode::PushNil => self.push(Reference::Nil),

            // Loads and stores share one semantics per direction
            Opcode::LoadB
            | Opcode::LoadN
            | Opcode::LoadS
            | Opcode::LoadY
            | Opcode::LoadA
            | Opcode::LoadD
            | Opcode::LoadP
            | Opcode::LoadJ
            | Opcode::LoadV => {
                let r = self.pop_reference()?;
                let value = r.load()?;
                self.push(value)
            }
            Opcode::StoreB
            | Opcode::StoreN
            | Opcode::StoreS
            | Opcode::StoreY
            | Opcode::StoreA
            | Opcode::StoreD
            | Opcode::StoreP
            | Opcode::StoreJ
            | Opcode::StoreV => {
                let r = self.pop_reference()?;
                let value = self.pop()?;
                r.store(value)?;
                Ok(())
            }
            Opcode::ResetC => {
                let r = self.pop_reference()?;
                r.store(Cell::None)?;
                Ok(())
            }

            // Arithmetic
            Opcode::NegN => {
                let n = self.pop_number()?;
                self.push(-n)
            }
            Opcode::AddN => self.binary(Self::pop_number, |a, b| Cell::Number(a + b)),
            Opcode::SubN => self.binary(Self::pop_number, |a, b| Cell::Number(a - b)),
            Opcode::MulN => self.binary(Self::pop_number, |a, b| Cell::Number(a * b)),
            Opcode::DivN => {
                let b = self.pop_number()?;
                let a = self.pop_number()?;
                if b == 0.0 {
                    return Err(Signal::raise("NumberException.DivideByZero", ""));
                }
                self.push(a / b)
            }
            Opcode::ModN => self.binary(Self::pop_number, |a, b| Cell::Number(a % b)),
            Opcode::ExpN => self.binary(Self::pop_number, |a, b| Cell::Number(a.powf(b))),

            // Comparison
            Opcode::EqB => self.binary(Self::pop_boolean, |a, b| Cell::Boolean(a == b)),
            Opcode::NeB => self.binary(Self::pop_boolean, |a, b| Cell::Boolean(a != b)),
            Opcode::EqN => self.binary(Self::pop_number, |a, b| Cell::Boolean(a == b)),
            Opcode::NeN => self.binary(Self::pop_number, |a, b| Cell::Boolean(a != b)),
            Opcode::LtN => self.binary(Self::pop_number, |a, b| Cell::Boolean(a < b)),
            Opcode::GtN => self.binary(Self::pop_number, |a, b| Cell::Boolean(a > b)),
            Opcode::LeN => self.binary(Self::pop_number, |a, b| Cell::Boolean(a <= b)),
            Opcode::GeN => self.binary(Self::pop_number, |a, b| Cell::Boolean(a >= b)),
            Opcode::EqS => self.binary(Self::pop_string, |a, b| Cell::Boolean(a == b)),
            Opcode::NeS => self.binary(Self::pop_string, |a, b| Cell::Boolean(a != b)),
            Opcode::LtS => self.binary(Self::pop_string, |a, b| Cell::Boolean(a < b)),
            Opcode::GtS => self.binary(Self::pop_string, |a, b| Cell::Boolean(a > b)),
            Opcode::LeS => self.binary(Self::pop_string, |a, b| Cell::Boolean(a <= b)),
            Opcode::GeS => self.binary(Self::pop_string, |a, b| Cell::Boolean(a >= b)),
            Opcode::EqY => self.binary(Self::pop_bytes, |a, b| Cell::Boolean(a == b)),
            Opcode::NeY => self.binary(Self::pop_bytes, |a, b| Cell::Boolean(a != b)),
            Opcode::LtY => self.binary(Self::pop_bytes, |a, b| Cell::Boolean(a < b)),
            Opcode::GtY => self.binary(Self::pop_bytes, |a, b| Cell::Boolean(a > b)),
            Opcode::LeY => self.binary(Self::pop_bytes, |a, b| Cell::Boolean(a <= b)),
            Opcode::GeY => self.binary(Self::pop_bytes, |a, b| Cell::Boolean(a >= b)),
            Opcode::EqA | Opcode::EqD | Opcode::EqV => {
                self.binary(Self::pop, |a, b| Cell::Boolean(a == b))
            }
            Opcode::NeA | Opcode::NeD | Opcode::NeV => {
                self.binary(Self::pop, |a, b| Cell::Boolean(a != b))
            }
            Opcode::EqP => self.binary(Self::pop_reference, |a, b| Cell::Boolean(a.same(&b))),
            Opcode::NeP => self.binary(Self::pop_reference, |a, b| Cell::Boolean(!a.same(&b))),

            // Boolean logic
            Opcode::AndB => self.binary(Self::pop_boolean, |a, b| Cell::Boolean(a && b)),
            Opcode::OrB => self.binary(Self::pop_boolean, |a, b| Cell::Boolean(a || b)),
            Opcode::NotB => {
                let b = self.pop_boolean()?;
                self.push(!b)
            }

            // Indexing and membership
            Opcode::IndexAr => {
                let n = self.pop_number()?;
                let r = self.pop_reference()?;
                let index = array_index(n)?;
                let len = r.inspect(|c| match c {
                    Some(Cell::Array(a)) => a.len(),
                    _ => 0,
                })?;
                if index >= len {
                    return Err(Signal::raise("ArrayIndexException", format_number(n)));
                }
                self.push(Reference::element(r, index))
            }
            Opcode::IndexAw => {
                let n = self.pop_number()?;
                let r = self.pop_reference()?;
                let index = array_index(n)?;
                r.modify(|c| match c {
                    Cell::Array(a) => {
                        if index >= a.len() {
                            a.resize(index + 1, Cell::None);
                        }
                    }
                    other => *other = Cell::Array(vec![Cell::None; index + 1]),
                })?;
                self.push(Reference::element(r, index))
            }
            Opcode::IndexAv => {
                let n = self.pop_number()?;
                let a = self.pop_array()?;
                let index = array_index(n)?;
                match a.into_iter().nth(index) {
                    Some(v) => self.push(v),
                    None => Err(Signal::raise("ArrayIndexException", format_number(n))),
                }
            }
            Opcode::IndexAn => {
                let n = self.pop_number()?;
                let a = self.pop_array()?;
                let v = match array_index(n) {
                    Ok(index) => a.into_iter().nth(index).unwrap_or_default(),
                    Err(_) => Cell::None,
                };
                self.push(v)
            }
            Opcode::IndexDr => {
                let key = self.pop_string()?;
                let r = self.pop_reference()?;
                let present = r.inspect(|c| matches!(c, Some(Cell::Dictionary(d)) if d.contains_key(&key)))?;
                if !present {
                    return Err(Signal::raise("DictionaryIndexException", key));
                }
                self.push(Reference::key(r, key))
            }
            Opcode::IndexDw => {
                let key = self.pop_string()?;
                let r = self.pop_reference()?;
                self.push(Reference::key(r, key))
            }
            Opcode::IndexDv => {
                let key = self.pop_string()?;
                let mut d = self.pop_dictionary()?;
                match d.remove(&key) {
                    Some(v) => self.push(v),
                    None => Err(Signal::raise("DictionaryIndexException", key)),
                }
            }
            Opcode::InA => {
                let a = self.pop_array()?;
                let v = self.pop()?;
                self.push(a.contains(&v))
            }
            Opcode::InD => {
                let d = self.pop_dictionary()?;
                let key = self.pop_string()?;
                self.push(d.contains_key(&key))
            }

            // Calls
            Opcode::CallP => {
                let id = self.operand()?;
                let name = self.string(id)?;
                let op = self
                    .predefined
                    .get(&name)
                    .ok_or_else(|| NexError::UnknownPredefined(name.clone()))?;
                let args = self.stack.pop_n(op.params)?;
                trace!(name = op.name, "predefined call");
                for result in (op.run)(self, args)? {
                    self.push(result)?;
                }
                Ok(())
            }
            Opcode::CallF => {
                let index = self.operand()?;
                self.check_recursion()?;
                self.invoke(Rc::clone(&self.module), index)?;
                Ok(())
            }
            Opcode::CallMf => {
                let m = self.operand()?;
                let f = self.operand()?;
                self.check_recursion()?;
                let module = self.modules.get(&self.string(m)?)?;
                let index = module.export_function(&self.string(f)?)?;
                self.invoke(module, index)?;
                Ok(())
            }
            Opcode::CallI => {
                self.check_recursion()?;
                let fp = self.pop_array()?;
                match fp.as_slice() {
                    [Cell::Module(m), Cell::Number(index)] => {
                        self.invoke(Rc::clone(m), *index as usize)?;
                        Ok(())
                    }
                    _ => Err(Signal::raise("InvalidFunctionException", "")),
                }
            }
            Opcode::CallV => {
                let method = self.operand()?;
                self.check_recursion()?;
                self.call_virtual(method)
            }
            Opcode::CallX => {
                for _ in 0..3 {
                    self.operand()?;
                }
                Err(NexError::Unsupported("CALLX").into())
            }
            Opcode::Ret => {
                self.frames.leave()?;
                let ra = self.callstack.pop().ok_or(NexError::NoActiveFrame)?;
                self.module = ra.module;
                self.ip = ra.ip;
                Ok(())
            }

            // Jumps
            Opcode::Jump => {
                self.ip = self.operand()?;
                Ok(())
            }
            Opcode::Jf | Opcode::Jt => {
                let target = self.operand()?;
                let b = self.pop_boolean()?;
                if b == (op == Opcode::Jt) {
                    self.ip = target;
                }
                Ok(())
            }
            Opcode::JumpTbl => {
                let count = self.operand()?;
                let n = self.pop_number()?;
                let entry = match array_index(n) {
                    Ok(i) if i < count => i,
                    _ => count,
                };
                self.ip += JUMP_TABLE_ENTRY * entry;
                Ok(())
            }

            // Stack shuffling
            Opcode::Dup => Ok(self.stack.dup()?),
            Opcode::DupX1 => {
                let a = self.pop()?;
                let b = self.pop()?;
                self.push(a.clone())?;
                self.push(b)?;
                self.push(a)
            }
            Opcode::Drop => {
                self.pop()?;
                Ok(())
            }
            Opcode::Swap => Ok(self.stack.swap()?),
            Opcode::DropN => {
                let depth = self.operand()?;
                self.stack.remove(depth)?;
                Ok(())
            }

            // Construction
            Opcode::ConsA => {
                let count = self.operand()?;
                let mut a = Vec::with_capacity(count);
                for _ in 0..count {
                    a.push(self.pop()?);
                }
                self.push(Cell::Array(a))
            }
            Opcode::ConsD => {
                let count = self.operand()?;
                let mut d = BTreeMap::new();
                for _ in 0..count {
                    let value = self.pop()?;
                    let key = self.pop_string()?;
                    d.insert(key, value);
                }
                self.push(Cell::Dictionary(d))
            }
            Opcode::Alloc => {
                let size = self.operand()?;
                let record = new_slot(Cell::Array(vec![Cell::None; size]));
                self.push(Reference::Slot(record))
            }
            Opcode::PushFp => {
                let index = self.operand()?;
                let fp = vec![Cell::Module(Rc::clone(&self.module)), Cell::Number(index as f64)];
                self.push(Cell::Array(fp))
            }
            Opcode::PushCi => {
                let id = self.operand()?;
                let name = self.string(id)?;
                let class = self.resolve_class(&name)?;
                self.push(Cell::ClassInfo(class))
            }
            Opcode::PushPeg => {
                self.operand()?;
                Err(NexError::Unsupported("PUSHPEG").into())
            }

            Opcode::Except => {
                let id = self.operand()?;
                // Handlers are matched against the offset of the raise itself
                self.ip = start;
                let name = self.string(id)?;
                let info = self.pop()?.into_object()?;
                Err(Signal::raise(&name, info))
            }
        }
    }

    fn call_virtual(&mut self, method: usize) -> StepResult {
        let mut pair = self.pop_array()?.into_iter();
        let instance = pair.next().unwrap_or_default().into_reference()?;
        let interface = pair.next().unwrap_or_default().as_number()? as usize;

        let class = instance
            .inspect(|c| match c {
                Some(Cell::Array(slots)) => match slots.first() {
                    Some(Cell::ClassInfo(ci)) => Some(ci.clone()),
                    _ => None,
                },
                _ => None,
            })?
            .ok_or_else(|| NexError::Malformed("instance record has no class-info slot".to_string()))?;

        let index = class
            .module
            .image
            .classes
            .get(class.class)
            .and_then(|c| c.interfaces.get(interface))
            .and_then(|methods| methods.get(method))
            .copied()
            .ok_or_else(|| {
                NexError::Malformed(format!(
                    "class {} has no method {} in interface {}",
                    class.class, method, interface
                ))
            })?;
        self.invoke(class.module, index)?;
        Ok(())
    }

    /// `Class` names a class of the current module, `module.Class` one of
    /// an imported module
    fn resolve_class(&self, name: &str) -> NexResult<ClassRef> {
        let (module, class) = match name.split_once('.') {
            Some((m, c)) => (self.modules.get(m)?, c),
            None => (Rc::clone(&self.module), name),
        };
        let class = module
            .image
            .find_class(class.as_bytes())
            .ok_or_else(|| NexError::ClassNotFound(name.to_string()))?;
        Ok(ClassRef { module, class })
    }

    fn operand(&mut self) -> NexResult<usize> {
        read_vint(&self.module.image.code, &mut self.ip)
    }

    fn byte_operand(&mut self) -> NexResult<u8> {
        let b = *self
            .module
            .image
            .code
            .get(self.ip)
            .ok_or(NexError::Truncated { offset: self.ip, needed: 1 })?;
        self.ip += 1;
        Ok(b)
    }

    fn string(&self, id: usize) -> NexResult<String> {
        self.module.image.string(id)
    }

    fn binary<T>(&mut self, pop: fn(&mut Self) -> NexResult<T>, f: impl FnOnce(T, T) -> Cell) -> StepResult {
        let b = pop(self)?;
        let a = pop(self)?;
        self.push(f(a, b))
    }

    fn push(&mut self, value: impl Into<Cell>) -> StepResult {
        Ok(self.stack.push(value.into())?)
    }

    fn pop(&mut self) -> NexResult<Cell> {
        self.stack.pop()
    }

    fn pop_boolean(&mut self) -> NexResult<bool> {
        self.pop()?.as_boolean()
    }

    fn pop_number(&mut self) -> NexResult<f64> {
        self.pop()?.as_number()
    }

    fn pop_string(&mut self) -> NexResult<String> {
        self.pop()?.into_string()
    }

    fn pop_bytes(&mut self) -> NexResult<Vec<u8>> {
        self.pop()?.into_bytes()
    }

    fn pop_array(&mut self) -> NexResult<Vec<Cell>> {
        self.pop()?.into_array()
    }

    fn pop_dictionary(&mut self) -> NexResult<BTreeMap<String, Cell>> {
        self.pop()?.into_dictionary()
    }

    fn pop_reference(&mut self) -> NexResult<Reference> {
        self.pop()?.into_reference()
    }
}
