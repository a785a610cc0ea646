//! Dynamic Objects
//!
//! The small dynamically-typed value used for data crossing the boundary to
//! opaque external sources. Each `get_*` accessor fails with a
//! `DynamicConversionException` when the variant does not match.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::RaisedException;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Object {
    #[default]
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    Bytes(Vec<u8>),
    Array(Vec<Object>),
    Dictionary(BTreeMap<String, Object>),
}

fn conversion(target: &str) -> RaisedException {
    RaisedException::new("DynamicConversionException", format!("to {}", target))
}

impl Object {
    /// Whether this is the null object
    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }

    /// Boolean payload, or `DynamicConversionException`
    pub fn get_boolean(&self) -> Result<bool, RaisedException> {
        match self {
            Object::Boolean(b) => Ok(*b),
            _ => Err(conversion("Boolean")),
        }
    }

    /// Number payload, or `DynamicConversionException`
    pub fn get_number(&self) -> Result<f64, RaisedException> {
        match self {
            Object::Number(n) => Ok(*n),
            _ => Err(conversion("Number")),
        }
    }

    /// String payload, or `DynamicConversionException`
    pub fn get_string(&self) -> Result<&str, RaisedException> {
        match self {
            Object::String(s) => Ok(s),
            _ => Err(conversion("String")),
        }
    }

    /// Bytes payload, or `DynamicConversionException`
    pub fn get_bytes(&self) -> Result<&[u8], RaisedException> {
        match self {
            Object::Bytes(b) => Ok(b),
            _ => Err(conversion("Bytes")),
        }
    }

    /// Array elements, or `DynamicConversionException`
    pub fn get_array(&self) -> Result<&[Object], RaisedException> {
        match self {
            Object::Array(a) => Ok(a),
            _ => Err(conversion("Array")),
        }
    }

    /// Dictionary entries, or `DynamicConversionException`
    pub fn get_dictionary(&self) -> Result<&BTreeMap<String, Object>, RaisedException> {
        match self {
            Object::Dictionary(d) => Ok(d),
            _ => Err(conversion("Dictionary")),
        }
    }

    /// Single-level index: a number into an array, a string into a dictionary
    pub fn subscript(&self, index: &Object) -> Result<Object, RaisedException> {
        match self {
            Object::Array(a) => {
                let i = index.get_number()?;
                if i >= 0.0 && i.fract() == 0.0 && (i as usize) < a.len() {
                    Ok(a[i as usize].clone())
                } else {
                    Err(RaisedException::new("ArrayIndexException", format_number(i)))
                }
            }
            Object::Dictionary(d) => {
                let k = index.get_string()?;
                d.get(k)
                    .cloned()
                    .ok_or_else(|| RaisedException::new("ObjectSubscriptException", k))
            }
            _ => Err(RaisedException::new("ObjectSubscriptException", index.to_string())),
        }
    }

    /// Rendering used inside containers: strings are quoted
    pub fn to_literal_string(&self) -> String {
        match self {
            Object::String(s) => quoted(s),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Null => write!(f, "null"),
            Object::Boolean(true) => write!(f, "TRUE"),
            Object::Boolean(false) => write!(f, "FALSE"),
            Object::Number(n) => write!(f, "{}", format_number(*n)),
            Object::String(s) => write!(f, "{}", s),
            Object::Bytes(b) => {
                let hex: Vec<String> = b.iter().map(|x| format!("{:02x}", x)).collect();
                write!(f, "HEXBYTES \"{}\"", hex.join(" "))
            }
            Object::Array(a) => {
                let items: Vec<String> = a.iter().map(Object::to_literal_string).collect();
                write!(f, "[{}]", items.join(", "))
            }
            Object::Dictionary(d) => {
                let items: Vec<String> = d
                    .iter()
                    .map(|(k, v)| format!("{}: {}", quoted(k), v.to_literal_string()))
                    .collect();
                write!(f, "{{{}}}", items.join(", "))
            }
        }
    }
}

impl From<&str> for Object {
    fn from(s: &str) -> Self {
        Object::String(s.to_string())
    }
}

impl From<String> for Object {
    fn from(s: String) -> Self {
        Object::String(s)
    }
}

impl From<f64> for Object {
    fn from(n: f64) -> Self {
        Object::Number(n)
    }
}

impl From<bool> for Object {
    fn from(b: bool) -> Self {
        Object::Boolean(b)
    }
}

/// Shortest decimal rendering; integral values print without a fraction
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else {
        format!("{}", n)
    }
}

/// Quote a string the way literals are written in source
pub fn quoted(s: &str) -> String {
    let mut r = String::with_capacity(s.len() + 2);
    r.push('"');
    for c in s.chars() {
        match c {
            '\u{8}' => r.push_str("\\b"),
            '\u{c}' => r.push_str("\\f"),
            '\n' => r.push_str("\\n"),
            '\r' => r.push_str("\\r"),
            '\t' => r.push_str("\\t"),
            '"' | '\\' => {
                r.push('\\');
                r.push(c);
            }
            ' '..='~' => r.push(c),
            c if (c as u32) < 0x10000 => r.push_str(&format!("\\u{:04x}", c as u32)),
            c => r.push_str(&format!("\\U{:08x}", c as u32)),
        }
    }
    r.push('"');
    r
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_failure_names_the_target() {
        let err = Object::Number(1.0).get_string().unwrap_err();
        assert_eq!(err.name, "DynamicConversionException");
        assert_eq!(err.info, Object::from("to String"));
    }

    #[test]
    fn subscript_array_and_dictionary() {
        let a = Object::Array(vec![Object::Number(10.0), Object::Null]);
        assert_eq!(a.subscript(&Object::Number(0.0)).unwrap(), Object::Number(10.0));
        let err = a.subscript(&Object::Number(2.0)).unwrap_err();
        assert_eq!(err.name, "ArrayIndexException");
        assert_eq!(err.info, Object::from("2"));

        let mut d = BTreeMap::new();
        d.insert("k".to_string(), Object::Boolean(true));
        let d = Object::Dictionary(d);
        assert_eq!(d.subscript(&Object::from("k")).unwrap(), Object::Boolean(true));
        assert_eq!(d.subscript(&Object::from("z")).unwrap_err().name, "ObjectSubscriptException");
        assert_eq!(
            d.subscript(&Object::Number(1.0)).unwrap_err().name,
            "DynamicConversionException"
        );
    }

    #[test]
    fn subscript_of_scalar_reports_the_index() {
        let err = Object::Number(3.0).subscript(&Object::from("key")).unwrap_err();
        assert_eq!(err.name, "ObjectSubscriptException");
        assert_eq!(err.info, Object::from("key"));
        let err = Object::Boolean(true).subscript(&Object::Number(2.0)).unwrap_err();
        assert_eq!(err.info, Object::from("2"));
    }

    #[test]
    fn renders_nested_values() {
        let mut d = BTreeMap::new();
        d.insert("b".to_string(), Object::Array(vec![Object::from("x\n"), Object::Number(1.5)]));
        d.insert("a".to_string(), Object::Null);
        assert_eq!(
            Object::Dictionary(d).to_string(),
            "{\"a\": null, \"b\": [\"x\\n\", 1.5]}"
        );
        assert_eq!(Object::Bytes(vec![1, 0xab]).to_string(), "HEXBYTES \"01 ab\"");
    }
}
