//! Image Writer
//!
//! Serializes a [`BytecodeImage`] in the exact layout the loader reads.

use super::image::{BytecodeImage, SIGNATURE};
use super::vint::write_vint;

pub struct ImageWriter;

impl ImageWriter {
    /// Serialize an image in load order
    pub fn write(image: &BytecodeImage) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&SIGNATURE);
        write_vint(&mut out, image.version);
        out.extend_from_slice(&image.source_hash);
        Self::count(&mut out, image.global_size);

        let mut strtable = Vec::new();
        for s in &image.strtable {
            Self::count(&mut strtable, s.len());
            strtable.extend_from_slice(s);
        }
        Self::count(&mut out, strtable.len());
        out.extend(strtable);

        Self::count(&mut out, image.export_types.len());
        for t in &image.export_types {
            Self::ints(&mut out, &[t.name, t.descriptor]);
        }

        Self::count(&mut out, image.export_constants.len());
        for c in &image.export_constants {
            Self::ints(&mut out, &[c.name, c.vtype, c.value.len()]);
            out.extend_from_slice(&c.value);
        }

        Self::count(&mut out, image.export_variables.len());
        for v in &image.export_variables {
            Self::ints(&mut out, &[v.name, v.vtype, v.index]);
        }

        Self::count(&mut out, image.export_functions.len());
        for f in &image.export_functions {
            Self::ints(&mut out, &[f.name, f.descriptor, f.index]);
        }

        Self::count(&mut out, image.export_exceptions.len());
        for e in &image.export_exceptions {
            Self::count(&mut out, e.name);
        }

        Self::count(&mut out, image.export_interfaces.len());
        for i in &image.export_interfaces {
            Self::count(&mut out, i.name);
            Self::count(&mut out, i.method_descriptors.len());
            for (first, second) in &i.method_descriptors {
                Self::ints(&mut out, &[*first, *second]);
            }
        }

        Self::count(&mut out, image.imports.len());
        for imp in &image.imports {
            Self::ints(&mut out, &[imp.name, usize::from(imp.optional)]);
            out.extend_from_slice(&imp.hash);
        }

        Self::count(&mut out, image.functions.len());
        for f in &image.functions {
            Self::ints(&mut out, &[f.name, f.nest, f.params, f.locals, f.entry]);
        }

        Self::count(&mut out, image.exceptions.len());
        for e in &image.exceptions {
            Self::ints(&mut out, &[e.start, e.end, e.exid, e.handler, e.stack_depth]);
        }

        Self::count(&mut out, image.classes.len());
        for c in &image.classes {
            Self::count(&mut out, c.name);
            Self::count(&mut out, c.interfaces.len());
            for methods in &c.interfaces {
                Self::count(&mut out, methods.len());
                for m in methods {
                    Self::count(&mut out, *m);
                }
            }
        }

        out.extend_from_slice(&image.code);
        out
    }

    fn count(out: &mut Vec<u8>, n: usize) {
        write_vint(out, n as u32);
    }

    fn ints(out: &mut Vec<u8>, values: &[usize]) {
        for v in values {
            Self::count(out, *v);
        }
    }
}
