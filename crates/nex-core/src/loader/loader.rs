//! Bytecode Loader
//!
//! Decodes a module image into a [`BytecodeImage`].
//! Sections are read in their fixed order; each table is prefixed by its
//! element count. This layer performs structural validation only: any
//! mismatch is a fatal format error, never a guest exception.

use tracing::debug;

use crate::bytecode::image::{
    BytecodeImage, ClassInfo, ExceptionEntry, ExportConstant, ExportException, ExportFunction,
    ExportInterface, ExportType, ExportVariable, Function, Import, BYTECODE_VERSION, SIGNATURE,
};
use crate::bytecode::vint::read_vint;
use crate::error::{NexError, NexResult};

/// Bytecode loader
pub struct BytecodeLoader;

impl BytecodeLoader {
    /// Load an image from raw bytes
    pub fn load(bytes: &[u8]) -> NexResult<BytecodeImage> {
        let mut cursor = 0;

        // Signature
        let sig = Self::read_exact(bytes, &mut cursor, 4)?;
        if sig != SIGNATURE {
            return Err(NexError::BadSignature([sig[0], sig[1], sig[2], sig[3]]));
        }

        // Version
        let version = read_vint(bytes, &mut cursor)? as u32;
        if version != BYTECODE_VERSION {
            return Err(NexError::VersionMismatch {
                expected: BYTECODE_VERSION,
                found: version,
            });
        }

        let source_hash = Self::read_hash(bytes, &mut cursor)?;
        let global_size = read_vint(bytes, &mut cursor)?;

        // String table: byte length, then length-prefixed entries
        let strtable_len = read_vint(bytes, &mut cursor)?;
        let region = Self::read_exact(bytes, &mut cursor, strtable_len)?;
        let strtable = Self::read_strtable(region)?;

        let export_types = Self::read_table(bytes, &mut cursor, |b, c| {
            Ok(ExportType {
                name: read_vint(b, c)?,
                descriptor: read_vint(b, c)?,
            })
        })?;

        let export_constants = Self::read_table(bytes, &mut cursor, |b, c| {
            let name = read_vint(b, c)?;
            let vtype = read_vint(b, c)?;
            let size = read_vint(b, c)?;
            let value = Self::read_exact(b, c, size)?.to_vec();
            Ok(ExportConstant { name, vtype, value })
        })?;

        let export_variables = Self::read_table(bytes, &mut cursor, |b, c| {
            Ok(ExportVariable {
                name: read_vint(b, c)?,
                vtype: read_vint(b, c)?,
                index: read_vint(b, c)?,
            })
        })?;

        let export_functions = Self::read_table(bytes, &mut cursor, |b, c| {
            Ok(ExportFunction {
                name: read_vint(b, c)?,
                descriptor: read_vint(b, c)?,
                index: read_vint(b, c)?,
            })
        })?;

        let export_exceptions = Self::read_table(bytes, &mut cursor, |b, c| {
            Ok(ExportException {
                name: read_vint(b, c)?,
            })
        })?;

        let export_interfaces = Self::read_table(bytes, &mut cursor, |b, c| {
            let name = read_vint(b, c)?;
            let method_descriptors =
                Self::read_table(b, c, |b, c| Ok((read_vint(b, c)?, read_vint(b, c)?)))?;
            Ok(ExportInterface {
                name,
                method_descriptors,
            })
        })?;

        let imports = Self::read_table(bytes, &mut cursor, |b, c| {
            let name = read_vint(b, c)?;
            let optional = read_vint(b, c)? != 0;
            let hash = Self::read_hash(b, c)?;
            Ok(Import {
                name,
                optional,
                hash,
            })
        })?;

        let functions = Self::read_table(bytes, &mut cursor, |b, c| {
            Ok(Function {
                name: read_vint(b, c)?,
                nest: read_vint(b, c)?,
                params: read_vint(b, c)?,
                locals: read_vint(b, c)?,
                entry: read_vint(b, c)?,
            })
        })?;

        let exceptions = Self::read_table(bytes, &mut cursor, |b, c| {
            Ok(ExceptionEntry {
                start: read_vint(b, c)?,
                end: read_vint(b, c)?,
                exid: read_vint(b, c)?,
                handler: read_vint(b, c)?,
                stack_depth: read_vint(b, c)?,
            })
        })?;

        let classes = Self::read_table(bytes, &mut cursor, |b, c| {
            let name = read_vint(b, c)?;
            let interfaces = Self::read_table(b, c, |b, c| Self::read_table(b, c, read_vint))?;
            Ok(ClassInfo { name, interfaces })
        })?;

        // Remaining bytes are the instruction stream
        let code = bytes[cursor..].to_vec();

        let image = BytecodeImage {
            version,
            source_hash,
            global_size,
            strtable,
            export_types,
            export_constants,
            export_variables,
            export_functions,
            export_exceptions,
            export_interfaces,
            imports,
            functions,
            exceptions,
            classes,
            code,
        };
        Self::validate(&image)?;

        debug!(
            strings = image.strtable.len(),
            functions = image.functions.len(),
            imports = image.imports.len(),
            code_len = image.code.len(),
            "image loaded"
        );
        Ok(image)
    }

    /// Basic structural assertions over the decoded tables.
    fn validate(image: &BytecodeImage) -> NexResult<()> {
        let code_len = image.code.len();
        let strings = image.strtable.len();

        for (i, f) in image.functions.iter().enumerate() {
            if f.params > f.locals {
                return Err(NexError::Malformed(format!(
                    "function {} has {} params but {} locals",
                    i, f.params, f.locals
                )));
            }
            if f.entry > code_len {
                return Err(NexError::Malformed(format!(
                    "function {} enters at {} beyond code length {}",
                    i, f.entry, code_len
                )));
            }
        }

        for e in &image.exceptions {
            if e.start >= e.end || e.handler >= code_len {
                return Err(NexError::Malformed(format!(
                    "exception range [{}, {}) with handler {} in code of length {}",
                    e.start, e.end, e.handler, code_len
                )));
            }
            if e.exid >= strings {
                return Err(NexError::InvalidStringId(e.exid));
            }
        }

        for imp in &image.imports {
            if imp.name >= strings {
                return Err(NexError::InvalidStringId(imp.name));
            }
        }

        for v in &image.export_variables {
            if v.index >= image.global_size {
                return Err(NexError::Malformed(format!(
                    "exported variable index {} beyond global count {}",
                    v.index, image.global_size
                )));
            }
        }

        for c in &image.classes {
            for method in c.interfaces.iter().flatten() {
                if *method >= image.functions.len() {
                    return Err(NexError::Malformed(format!(
                        "class method refers to function {} of {}",
                        method,
                        image.functions.len()
                    )));
                }
            }
        }
        Ok(())
    }

    fn read_strtable(region: &[u8]) -> NexResult<Vec<Vec<u8>>> {
        let mut strings = Vec::new();
        let mut i = 0;
        while i < region.len() {
            let len = read_vint(region, &mut i)?;
            strings.push(Self::read_exact(region, &mut i, len)?.to_vec());
        }
        Ok(strings)
    }

    /// Read a count-prefixed table using `entry` for each element
    fn read_table<T>(
        bytes: &[u8],
        cursor: &mut usize,
        mut entry: impl FnMut(&[u8], &mut usize) -> NexResult<T>,
    ) -> NexResult<Vec<T>> {
        let count = read_vint(bytes, cursor)?;
        // Guard against absurd counts in corrupt images before allocating
        let mut out = Vec::with_capacity(count.min(bytes.len()));
        for _ in 0..count {
            out.push(entry(bytes, cursor)?);
        }
        Ok(out)
    }

    fn read_hash(bytes: &[u8], cursor: &mut usize) -> NexResult<[u8; 32]> {
        let raw = Self::read_exact(bytes, cursor, 32)?;
        let mut hash = [0u8; 32];
        hash.copy_from_slice(raw);
        Ok(hash)
    }

    fn read_exact<'a>(bytes: &'a [u8], cursor: &mut usize, len: usize) -> NexResult<&'a [u8]> {
        if *cursor + len > bytes.len() {
            return Err(NexError::Truncated {
                offset: *cursor,
                needed: len,
            });
        }
        let v = &bytes[*cursor..*cursor + len];
        *cursor += len;
        Ok(v)
    }
}
