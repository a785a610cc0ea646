//! NEX Error Types
//!
//! Two tiers of failure exist in the executor:
//!
//! - [`NexError`]: structural and link defects (malformed image, unresolved
//!   import, broken frame nesting). These are never visible to guest code and
//!   end the run.
//! - [`Signal`]: what an opcode handler hands back to the dispatch loop. A
//!   guest exception travels as [`Signal::Raise`] and is routed through the
//!   unwinder; [`Signal::Exit`] is an explicit exit request.

use std::io;

use thiserror::Error;

use crate::vm::object::Object;

#[derive(Debug, Error)]
pub enum NexError {
    // Image errors
    #[error("image is truncated (needed {needed} bytes at offset {offset})")]
    Truncated { offset: usize, needed: usize },

    #[error("bad image signature {0:02x?}")]
    BadSignature([u8; 4]),

    #[error("bytecode version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("variable-length integer at offset {0} exceeds the maximum")]
    IntegerOverflow(usize),

    #[error("string id {0} is outside the string table")]
    InvalidStringId(usize),

    #[error("invalid opcode 0x{opcode:02x} at offset {offset}")]
    InvalidOpcode { opcode: u8, offset: usize },

    #[error("malformed image: {0}")]
    Malformed(String),

    #[error("number literal {0:?} could not be parsed")]
    InvalidNumberLiteral(String),

    // Execution defects
    #[error("operand stack overflow (capacity {0})")]
    StackOverflow(usize),

    #[error("operand stack underflow")]
    StackUnderflow,

    #[error("instruction pointer {ip} is outside module {module:?}")]
    InstructionOutOfRange { module: String, ip: usize },

    #[error("expected {expected} on the operand stack, found {found}")]
    TypeMismatch { expected: &'static str, found: &'static str },

    #[error("global index {0} out of range")]
    InvalidGlobal(usize),

    #[error("local index {0} out of range")]
    InvalidLocal(usize),

    #[error("function index {index} out of range in module {module:?}")]
    InvalidFunction { module: String, index: usize },

    #[error("no active frame")]
    NoActiveFrame,

    #[error("frame nesting violation: {0}")]
    NestingViolation(String),

    #[error("frame handle refers to a frame that has returned")]
    StaleFrame,

    #[error("load or store through the nil reference")]
    NilReference,

    #[error("unsupported opcode {0}")]
    Unsupported(&'static str),

    // Link errors
    #[error("module not found: {0}")]
    ModuleNotFound(String),

    #[error("variable {name:?} not exported by module {module:?}")]
    VariableNotFound { module: String, name: String },

    #[error("function {name:?} not exported by module {module:?}")]
    FunctionNotFound { module: String, name: String },

    #[error("class not found: {0}")]
    ClassNotFound(String),

    #[error("unknown predefined function: {0}")]
    UnknownPredefined(String),

    #[error("unknown predefined global: {0}")]
    UnknownPredefinedGlobal(String),

    // IO boundary
    #[error("I/O failure on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

pub type NexResult<T> = Result<T, NexError>;

/// A guest exception as raised, before the unwinder attaches its offset.
#[derive(Debug, Clone, PartialEq)]
pub struct RaisedException {
    pub name: String,
    pub info: Object,
}

impl RaisedException {
    /// Exception named `name` carrying `info`
    pub fn new(name: impl Into<String>, info: impl Into<Object>) -> Self {
        RaisedException {
            name: name.into(),
            info: info.into(),
        }
    }
}

/// Non-local outcome of executing one instruction.
#[derive(Debug)]
pub enum Signal {
    Fatal(NexError),
    Raise(RaisedException),
    Exit(i32),
}

impl Signal {
    /// Shorthand for raising a named exception with a string payload.
    pub fn raise(name: &str, info: impl Into<Object>) -> Self {
        Signal::Raise(RaisedException::new(name, info))
    }
}

impl From<NexError> for Signal {
    fn from(err: NexError) -> Self {
        Signal::Fatal(err)
    }
}

impl From<RaisedException> for Signal {
    fn from(exc: RaisedException) -> Self {
        Signal::Raise(exc)
    }
}

pub type StepResult<T = ()> = Result<T, Signal>;
