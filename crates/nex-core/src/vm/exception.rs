//! Exception Unwinder
//!
//! A raised exception carries its dotted name, an [`Object`] payload and the
//! code offset it was raised at. On the stack it is one array cell
//! `[name, payload, offset]`; this is the shape handlers and predefined
//! operations observe.

use std::fmt;
use std::rc::Rc;

use tracing::debug;

use super::object::Object;
use super::value::Cell;
use super::vm::VirtualMachine;
use crate::bytecode::image::{BytecodeImage, ExceptionEntry};
use crate::error::{NexResult, RaisedException};

#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionValue {
    pub name: String,
    pub info: Object,
    pub offset: usize,
}

impl ExceptionValue {
    /// The array cell a handler receives
    pub fn into_cell(self) -> Cell {
        Cell::Array(vec![
            Cell::String(self.name),
            Cell::Object(self.info),
            Cell::Number(self.offset as f64),
        ])
    }

    /// Read an exception cell back
    pub fn from_cell(cell: &Cell) -> Option<Self> {
        match cell {
            Cell::Array(a) => match a.as_slice() {
                [Cell::String(name), info, Cell::Number(offset)] => Some(ExceptionValue {
                    name: name.clone(),
                    info: match info {
                        Cell::Object(o) => o.clone(),
                        _ => Object::Null,
                    },
                    offset: *offset as usize,
                }),
                _ => None,
            },
            _ => None,
        }
    }
}

impl fmt::Display for ExceptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.info)
    }
}

/// A handler for `handler` catches `raised` on an exact match, or when
/// `handler` is a prefix of `raised` followed by a `.`
pub fn handler_matches(handler: &str, raised: &str) -> bool {
    raised == handler
        || (raised.len() > handler.len()
            && raised.starts_with(handler)
            && raised.as_bytes()[handler.len()] == b'.')
}

/// First handler in `image` covering `ip` that catches `name`
pub fn find_handler<'a>(image: &'a BytecodeImage, ip: usize, name: &str) -> Option<&'a ExceptionEntry> {
    image.exceptions.iter().find(|e| {
        e.covers(ip)
            && image
                .bytes(e.exid)
                .map(|h| handler_matches(&String::from_utf8_lossy(h), name))
                .unwrap_or(false)
    })
}

impl VirtualMachine {
    /// Transfer control to the nearest matching handler. Each call level
    /// searched without a match is discarded along with its frame. Returns
    /// the exception back when no level handles it.
    pub(crate) fn unwind(&mut self, exc: RaisedException) -> NexResult<Result<(), ExceptionValue>> {
        let value = ExceptionValue {
            name: exc.name,
            info: exc.info,
            offset: self.ip,
        };

        let mut module = Rc::clone(&self.module);
        let mut ip = self.ip;
        let mut sp = self.callstack.len();
        loop {
            let found = find_handler(&module.image, ip, &value.name).map(|e| (e.handler, e.stack_depth));
            if let Some((handler, depth)) = found {
                let base = self.frames.top().map_or(0, |f| f.opstack_depth);
                debug!(
                    exception = %value.name,
                    module = %module.name,
                    handler,
                    height = base + depth,
                    "exception caught"
                );
                self.stack.truncate(base + depth);
                self.ip = handler;
                self.callstack.truncate(sp);
                self.module = module;
                self.stack.push(value.into_cell())?;
                return Ok(Ok(()));
            }
            if sp == 0 {
                break;
            }
            sp -= 1;
            if !self.frames.is_empty() {
                self.frames.leave()?;
            }
            let ra = &self.callstack[sp];
            module = Rc::clone(&ra.module);
            ip = ra.ip;
        }

        debug!(exception = %value.name, "exception unhandled");
        Ok(Err(value))
    }
}
