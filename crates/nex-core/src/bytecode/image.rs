//! Bytecode Image Representation
//!
//! In-memory form of one compiled module. Immutable once loaded.
//! String-valued fields are ids into [`BytecodeImage::strtable`].

use crate::error::{NexError, NexResult};

/// Image signature: `N e \0 n`
pub const SIGNATURE: [u8; 4] = [0x4e, 0x65, 0x00, 0x6e];

/// The only format version this executor accepts
pub const BYTECODE_VERSION: u32 = 3;

/// Width of one `JUMPTBL` entry: a `JUMP` opcode and a 5-byte target
pub const JUMP_TABLE_ENTRY: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExportType {
    pub name: usize,
    pub descriptor: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExportConstant {
    pub name: usize,
    pub vtype: usize,
    pub value: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExportVariable {
    pub name: usize,
    pub vtype: usize,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExportFunction {
    pub name: usize,
    pub descriptor: usize,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExportException {
    pub name: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExportInterface {
    pub name: usize,
    pub method_descriptors: Vec<(usize, usize)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub name: usize,
    pub optional: bool,
    pub hash: [u8; 32],
}

/// Function table entry
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Function {
    pub name: usize,
    /// Lexical nesting level; 0 for top-level functions
    pub nest: usize,
    pub params: usize,
    pub locals: usize,
    pub entry: usize,
}

/// Exception table entry: handler for `[start, end)`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExceptionEntry {
    pub start: usize,
    pub end: usize,
    pub exid: usize,
    pub handler: usize,
    pub stack_depth: usize,
}

impl ExceptionEntry {
    /// Whether `ip` lies in the protected range
    pub fn covers(&self, ip: usize) -> bool {
        ip >= self.start && ip < self.end
    }
}

/// Class descriptor: each interface is a list of function indices
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClassInfo {
    pub name: usize,
    pub interfaces: Vec<Vec<usize>>,
}

/// A fully decoded module image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BytecodeImage {
    pub version: u32,
    pub source_hash: [u8; 32],
    pub global_size: usize,
    pub strtable: Vec<Vec<u8>>,
    pub export_types: Vec<ExportType>,
    pub export_constants: Vec<ExportConstant>,
    pub export_variables: Vec<ExportVariable>,
    pub export_functions: Vec<ExportFunction>,
    pub export_exceptions: Vec<ExportException>,
    pub export_interfaces: Vec<ExportInterface>,
    pub imports: Vec<Import>,
    pub functions: Vec<Function>,
    pub exceptions: Vec<ExceptionEntry>,
    pub classes: Vec<ClassInfo>,
    pub code: Vec<u8>,
}

impl Default for BytecodeImage {
    fn default() -> Self {
        BytecodeImage {
            version: BYTECODE_VERSION,
            source_hash: [0; 32],
            global_size: 0,
            strtable: Vec::new(),
            export_types: Vec::new(),
            export_constants: Vec::new(),
            export_variables: Vec::new(),
            export_functions: Vec::new(),
            export_exceptions: Vec::new(),
            export_interfaces: Vec::new(),
            imports: Vec::new(),
            functions: Vec::new(),
            exceptions: Vec::new(),
            classes: Vec::new(),
            code: Vec::new(),
        }
    }
}

impl BytecodeImage {
    /// Raw bytes of a string-table entry
    pub fn bytes(&self, id: usize) -> NexResult<&[u8]> {
        self.strtable
            .get(id)
            .map(Vec::as_slice)
            .ok_or(NexError::InvalidStringId(id))
    }

    /// String-table entry decoded as text; invalid UTF-8 is malformed
    pub fn string(&self, id: usize) -> NexResult<String> {
        let bytes = self.bytes(id)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| NexError::Malformed(format!("string {} is not valid UTF-8", id)))
    }

    /// Function table entry by index
    pub fn function(&self, index: usize) -> Option<&Function> {
        self.functions.get(index)
    }

    /// Find an exported variable by name
    pub fn find_export_variable(&self, name: &[u8]) -> Option<&ExportVariable> {
        self.export_variables
            .iter()
            .find(|v| self.strtable.get(v.name).map(Vec::as_slice) == Some(name))
    }

    /// Find an exported function by its `name,descriptor` key
    pub fn find_export_function(&self, key: &[u8]) -> Option<&ExportFunction> {
        self.export_functions.iter().find(|f| {
            match (self.strtable.get(f.name), self.strtable.get(f.descriptor)) {
                (Some(n), Some(d)) => {
                    key.len() == n.len() + 1 + d.len()
                        && key.starts_with(n)
                        && key[n.len()] == b','
                        && key.ends_with(d)
                }
                _ => false,
            }
        })
    }

    /// Find a class by name
    pub fn find_class(&self, name: &[u8]) -> Option<usize> {
        self.classes
            .iter()
            .position(|c| self.strtable.get(c.name).map(Vec::as_slice) == Some(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_must_be_utf8() {
        let image = BytecodeImage {
            strtable: vec![b"ok".to_vec(), vec![0x66, 0xff]],
            ..BytecodeImage::default()
        };
        assert_eq!(image.string(0).unwrap(), "ok");
        assert!(matches!(image.string(1), Err(NexError::Malformed(_))));
        assert_eq!(image.bytes(1).unwrap(), &[0x66, 0xff]);
        assert!(matches!(image.string(2), Err(NexError::InvalidStringId(2))));
    }
}
