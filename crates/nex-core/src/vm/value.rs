//! Runtime Cell Representation
//!
//! Defines the tagged value stored in every stack slot, global, local,
//! array element and dictionary entry.

use std::any::Any;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use super::module::Module;
use super::object::{format_number, quoted, Object};
use super::reference::Reference;
use crate::error::{NexError, NexResult};

/// A stable storage location. Globals, locals and allocated records each
/// live in their own slot so that references stay valid while the
/// containers around them are resized.
pub type Slot = Rc<RefCell<Cell>>;

/// Fresh shared slot holding `cell`
pub fn new_slot(cell: Cell) -> Slot {
    Rc::new(RefCell::new(cell))
}

/// A class descriptor together with the module that owns its methods
#[derive(Clone)]
pub struct ClassRef {
    pub module: Rc<Module>,
    pub class: usize,
}

impl fmt::Debug for ClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassRef({:?}, {})", self.module.name, self.class)
    }
}

/// Runtime cell
#[derive(Debug, Clone, Default)]
pub enum Cell {
    /// Empty slot
    #[default]
    None,
    Reference(Reference),
    Boolean(bool),

    /// Numeric value (IEEE 754)
    Number(f64),
    String(String),
    Bytes(Vec<u8>),
    Object(Object),
    Array(Vec<Cell>),
    Dictionary(BTreeMap<String, Cell>),
    Module(Rc<Module>),
    ClassInfo(ClassRef),

    /// Host-only payload, compared by identity
    Opaque(Rc<dyn Any>),
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Cell::None, Cell::None) => true,
            (Cell::Reference(a), Cell::Reference(b)) => a.same(b),
            (Cell::Boolean(a), Cell::Boolean(b)) => a == b,
            (Cell::Number(a), Cell::Number(b)) => a == b,
            (Cell::String(a), Cell::String(b)) => a == b,
            (Cell::Bytes(a), Cell::Bytes(b)) => a == b,
            (Cell::Object(a), Cell::Object(b)) => a == b,
            (Cell::Array(a), Cell::Array(b)) => a == b,
            (Cell::Dictionary(a), Cell::Dictionary(b)) => a == b,
            (Cell::Module(a), Cell::Module(b)) => Rc::ptr_eq(a, b),
            (Cell::ClassInfo(a), Cell::ClassInfo(b)) => {
                Rc::ptr_eq(&a.module, &b.module) && a.class == b.class
            }
            (Cell::Opaque(a), Cell::Opaque(b)) => {
                Rc::as_ptr(a) as *const () == Rc::as_ptr(b) as *const ()
            }
            _ => false,
        }
    }
}

impl Cell {
    /// Tag name used in type-mismatch errors
    pub fn type_name(&self) -> &'static str {
        match self {
            Cell::None => "none",
            Cell::Reference(_) => "reference",
            Cell::Boolean(_) => "boolean",
            Cell::Number(_) => "number",
            Cell::String(_) => "string",
            Cell::Bytes(_) => "bytes",
            Cell::Object(_) => "object",
            Cell::Array(_) => "array",
            Cell::Dictionary(_) => "dictionary",
            Cell::Module(_) => "module",
            Cell::ClassInfo(_) => "class-info",
            Cell::Opaque(_) => "opaque",
        }
    }

    fn mismatch(&self, expected: &'static str) -> NexError {
        NexError::TypeMismatch {
            expected,
            found: self.type_name(),
        }
    }

    /// String cell
    pub fn string(s: impl Into<String>) -> Cell {
        Cell::String(s.into())
    }

    /// `none` reads as `false`, matching a never-assigned variable
    pub fn as_boolean(&self) -> NexResult<bool> {
        match self {
            Cell::Boolean(b) => Ok(*b),
            Cell::None => Ok(false),
            other => Err(other.mismatch("boolean")),
        }
    }

    /// Number payload
    pub fn as_number(&self) -> NexResult<f64> {
        match self {
            Cell::Number(n) => Ok(*n),
            Cell::None => Ok(0.0),
            other => Err(other.mismatch("number")),
        }
    }

    /// String payload
    pub fn as_str(&self) -> NexResult<&str> {
        match self {
            Cell::String(s) => Ok(s),
            Cell::None => Ok(""),
            other => Err(other.mismatch("string")),
        }
    }

    /// Bytes payload
    pub fn as_bytes(&self) -> NexResult<&[u8]> {
        match self {
            Cell::Bytes(b) => Ok(b),
            Cell::None => Ok(&[]),
            other => Err(other.mismatch("bytes")),
        }
    }

    /// Take the string payload
    pub fn into_string(self) -> NexResult<String> {
        match self {
            Cell::String(s) => Ok(s),
            Cell::None => Ok(String::new()),
            other => Err(other.mismatch("string")),
        }
    }

    /// Take the bytes payload
    pub fn into_bytes(self) -> NexResult<Vec<u8>> {
        match self {
            Cell::Bytes(b) => Ok(b),
            Cell::None => Ok(Vec::new()),
            other => Err(other.mismatch("bytes")),
        }
    }

    /// Take the array elements
    pub fn into_array(self) -> NexResult<Vec<Cell>> {
        match self {
            Cell::Array(a) => Ok(a),
            Cell::None => Ok(Vec::new()),
            other => Err(other.mismatch("array")),
        }
    }

    /// Take the dictionary entries
    pub fn into_dictionary(self) -> NexResult<BTreeMap<String, Cell>> {
        match self {
            Cell::Dictionary(d) => Ok(d),
            Cell::None => Ok(BTreeMap::new()),
            other => Err(other.mismatch("dictionary")),
        }
    }

    /// Take the object payload
    pub fn into_object(self) -> NexResult<Object> {
        match self {
            Cell::Object(o) => Ok(o),
            Cell::None => Ok(Object::Null),
            other => Err(other.mismatch("object")),
        }
    }

    /// Take the reference payload
    pub fn into_reference(self) -> NexResult<Reference> {
        match self {
            Cell::Reference(r) => Ok(r),
            other => Err(other.mismatch("reference")),
        }
    }

    /// Human-readable rendering, as produced by `print` and `toString`
    pub fn render(&self) -> String {
        match self {
            Cell::None => String::new(),
            Cell::Reference(_) => "<reference>".to_string(),
            Cell::Boolean(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            Cell::Number(n) => format_number(*n),
            Cell::String(s) => s.clone(),
            Cell::Bytes(b) => Object::Bytes(b.clone()).to_string(),
            Cell::Object(o) => o.to_string(),
            Cell::Array(a) => {
                let items: Vec<String> = a.iter().map(Cell::render_literal).collect();
                format!("[{}]", items.join(", "))
            }
            Cell::Dictionary(d) => {
                let items: Vec<String> = d
                    .iter()
                    .map(|(k, v)| format!("{}: {}", quoted(k), v.render_literal()))
                    .collect();
                format!("{{{}}}", items.join(", "))
            }
            Cell::Module(m) => format!("<module {}>", m.name),
            Cell::ClassInfo(c) => format!("<class {}>", c.class),
            Cell::Opaque(_) => "<opaque>".to_string(),
        }
    }

    fn render_literal(&self) -> String {
        match self {
            Cell::String(s) => quoted(s),
            other => other.render(),
        }
    }
}

impl From<bool> for Cell {
    fn from(b: bool) -> Self {
        Cell::Boolean(b)
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Cell::Number(n)
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::String(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::String(s)
    }
}

impl From<Object> for Cell {
    fn from(o: Object) -> Self {
        Cell::Object(o)
    }
}

impl From<Reference> for Cell {
    fn from(r: Reference) -> Self {
        Cell::Reference(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dict(pairs: &[(&str, Cell)]) -> Cell {
        Cell::Dictionary(pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect())
    }

    #[test]
    fn equality_is_symmetric_and_recursive() {
        let a = Cell::Array(vec![Cell::from(1.0), Cell::Array(vec![Cell::from("x")])]);
        let b = Cell::Array(vec![Cell::from(1.0), Cell::Array(vec![Cell::from("x")])]);
        let c = Cell::Array(vec![Cell::Array(vec![Cell::from("x")]), Cell::from(1.0)]);
        assert_eq!(a, b);
        assert_eq!(b, a);
        assert_ne!(a, c);
        assert_ne!(c, a);
    }

    #[test]
    fn dictionary_equality_ignores_insertion_order() {
        let a = dict(&[("x", Cell::from(1.0)), ("y", Cell::from(true))]);
        let b = dict(&[("y", Cell::from(true)), ("x", Cell::from(1.0))]);
        assert_eq!(a, b);
        assert_ne!(a, dict(&[("x", Cell::from(1.0))]));
    }

    #[test]
    fn nan_is_not_equal_to_itself() {
        let n = Cell::from(f64::NAN);
        assert_ne!(n, n.clone());
    }

    #[test]
    fn references_compare_by_identity() {
        let s = new_slot(Cell::from(1.0));
        let t = new_slot(Cell::from(1.0));
        let a = Cell::Reference(Reference::Slot(s.clone()));
        assert_eq!(a, Cell::Reference(Reference::Slot(s)));
        assert_ne!(a, Cell::Reference(Reference::Slot(t)));
    }

    #[test]
    fn bytes_order_lexicographically() {
        let a = vec![1u8, 2];
        let b = vec![1u8, 2, 0];
        let c = vec![1u8, 3];
        assert!(a < b);
        assert!(b < c);
        assert_eq!(Cell::Bytes(a.clone()), Cell::Bytes(a));
    }

    #[test]
    fn none_reads_as_default() {
        assert_eq!(Cell::None.as_number().unwrap(), 0.0);
        assert!(!Cell::None.as_boolean().unwrap());
        assert!(matches!(
            Cell::from(true).as_number(),
            Err(NexError::TypeMismatch { expected: "number", found: "boolean" })
        ));
    }

    #[test]
    fn renders_containers_with_quoted_strings() {
        let a = Cell::Array(vec![Cell::from("a"), Cell::from(2.0), Cell::from(false)]);
        assert_eq!(a.render(), "[\"a\", 2, FALSE]");
    }
}
