//! References
//!
//! A reference is a path to a storage location rather than a pointer into
//! it. Element and dictionary-key references name their container by
//! another reference and are resolved on every access, so a reference into
//! an array element survives the array being grown or replaced.

use std::collections::BTreeMap;
use std::rc::Rc;

use super::value::{Cell, Slot};
use crate::error::{NexError, NexResult};

#[derive(Debug, Clone, Default)]
pub enum Reference {
    /// The reference pushed by `PUSHNIL`; any access is a defect
    #[default]
    Nil,

    /// A global, a local or an allocated record
    Slot(Slot),

    /// Element `index` of the array held by `container`
    Element { container: Rc<Reference>, index: usize },

    /// Entry `key` of the dictionary held by `container`
    Key { container: Rc<Reference>, key: String },
}

impl Reference {
    /// Element `index` of the array behind `container`
    pub fn element(container: Reference, index: usize) -> Self {
        Reference::Element {
            container: Rc::new(container),
            index,
        }
    }

    /// Entry `key` of the dictionary behind `container`
    pub fn key(container: Reference, key: impl Into<String>) -> Self {
        Reference::Key {
            container: Rc::new(container),
            key: key.into(),
        }
    }

    /// Read the referenced cell; missing elements and keys read as `none`
    pub fn load(&self) -> NexResult<Cell> {
        self.inspect(|c| c.cloned().unwrap_or_default())
    }

    /// Overwrite the referenced cell, materializing containers on the way
    pub fn store(&self, value: Cell) -> NexResult<()> {
        self.modify(|c| *c = value)
    }

    /// Run `f` over the referenced cell without creating anything
    pub fn inspect<R>(&self, f: impl FnOnce(Option<&Cell>) -> R) -> NexResult<R> {
        let mut f = Some(f);
        let mut out = None;
        self.inspect_dyn(&mut |c: Option<&Cell>| {
            if let Some(f) = f.take() {
                out = Some(f(c));
            }
        })?;
        out.ok_or(NexError::NilReference)
    }

    /// Run `f` over the referenced cell mutably. An element reference grows
    /// its array with `none` up to the index; a key reference turns an empty
    /// container into a dictionary and inserts the key.
    pub fn modify<R>(&self, f: impl FnOnce(&mut Cell) -> R) -> NexResult<R> {
        let mut f = Some(f);
        let mut out = None;
        self.modify_dyn(&mut |c: &mut Cell| {
            if let Some(f) = f.take() {
                out = Some(f(c));
            }
        })?;
        out.ok_or(NexError::NilReference)
    }

    // Paths nest arbitrarily deep, so the walk recurses through trait
    // objects rather than a fresh closure type per level.
    fn inspect_dyn(&self, f: &mut dyn FnMut(Option<&Cell>)) -> NexResult<()> {
        match self {
            Reference::Nil => Err(NexError::NilReference),
            Reference::Slot(slot) => {
                let cell = slot.borrow();
                f(Some(&*cell));
                Ok(())
            }
            Reference::Element { container, index } => {
                container.inspect_dyn(&mut |c: Option<&Cell>| match c {
                    Some(Cell::Array(a)) => f(a.get(*index)),
                    _ => f(None),
                })
            }
            Reference::Key { container, key } => {
                container.inspect_dyn(&mut |c: Option<&Cell>| match c {
                    Some(Cell::Dictionary(d)) => f(d.get(key)),
                    _ => f(None),
                })
            }
        }
    }

    fn modify_dyn(&self, f: &mut dyn FnMut(&mut Cell)) -> NexResult<()> {
        match self {
            Reference::Nil => Err(NexError::NilReference),
            Reference::Slot(slot) => {
                let mut cell = slot.borrow_mut();
                f(&mut *cell);
                Ok(())
            }
            Reference::Element { container, index } => {
                let index = *index;
                container.modify_dyn(&mut |c: &mut Cell| {
                    if !matches!(c, Cell::Array(_)) {
                        *c = Cell::Array(Vec::new());
                    }
                    if let Cell::Array(a) = c {
                        if index >= a.len() {
                            a.resize(index.saturating_add(1), Cell::None);
                        }
                        f(&mut a[index]);
                    }
                })
            }
            Reference::Key { container, key } => container.modify_dyn(&mut |c: &mut Cell| {
                if !matches!(c, Cell::Dictionary(_)) {
                    *c = Cell::Dictionary(BTreeMap::new());
                }
                if let Cell::Dictionary(d) = c {
                    f(d.entry(key.clone()).or_default());
                }
            }),
        }
    }

    /// Identity: both references name the same location
    pub fn same(&self, other: &Reference) -> bool {
        match (self, other) {
            (Reference::Nil, Reference::Nil) => true,
            (Reference::Slot(a), Reference::Slot(b)) => Rc::ptr_eq(a, b),
            (
                Reference::Element { container: a, index: i },
                Reference::Element { container: b, index: j },
            ) => i == j && a.same(b),
            (Reference::Key { container: a, key: k }, Reference::Key { container: b, key: l }) => {
                k == l && a.same(b)
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::value::new_slot;

    #[test]
    fn element_reference_survives_growth() {
        let slot = new_slot(Cell::Array(vec![Cell::from(1.0)]));
        let base = Reference::Slot(slot.clone());
        let first = Reference::element(base.clone(), 0);
        Reference::element(base, 100).store(Cell::from(2.0)).unwrap();
        first.store(Cell::from(9.0)).unwrap();
        let Cell::Array(a) = &*slot.borrow() else { panic!("not an array") };
        assert_eq!(a.len(), 101);
        assert_eq!(a[0], Cell::from(9.0));
        assert_eq!(a[50], Cell::None);
    }

    #[test]
    fn key_store_materializes_dictionary() {
        let slot = new_slot(Cell::None);
        let r = Reference::key(Reference::Slot(slot.clone()), "k");
        assert_eq!(r.load().unwrap(), Cell::None);
        assert_eq!(*slot.borrow(), Cell::None);
        r.store(Cell::from("v")).unwrap();
        let Cell::Dictionary(d) = &*slot.borrow() else { panic!("not a dictionary") };
        assert_eq!(d.get("k"), Some(&Cell::from("v")));
    }

    #[test]
    fn nested_paths_resolve_lazily() {
        let slot = new_slot(Cell::None);
        let inner = Reference::element(Reference::key(Reference::Slot(slot.clone()), "a"), 2);
        inner.store(Cell::from(true)).unwrap();
        assert_eq!(inner.load().unwrap(), Cell::from(true));
        let outer = Reference::key(Reference::Slot(slot), "a");
        assert_eq!(
            outer.load().unwrap(),
            Cell::Array(vec![Cell::None, Cell::None, Cell::from(true)])
        );
    }

    #[test]
    fn deep_paths_load_and_store() {
        let slot = new_slot(Cell::None);
        let mut r = Reference::Slot(slot.clone());
        for depth in 0..32 {
            r = if depth % 2 == 0 {
                Reference::element(r, 1)
            } else {
                Reference::key(r, "k")
            };
        }
        r.store(Cell::from(7.0)).unwrap();
        assert_eq!(r.load().unwrap(), Cell::from(7.0));
        assert_eq!(r.modify(|c| c.clone()).unwrap(), Cell::from(7.0));
        assert!(matches!(&*slot.borrow(), Cell::Array(a) if a.len() == 2));
    }

    #[test]
    fn nil_is_fatal() {
        assert!(matches!(Reference::Nil.load(), Err(NexError::NilReference)));
    }

    #[test]
    fn identity_follows_the_path() {
        let slot = new_slot(Cell::None);
        let a = Reference::element(Reference::Slot(slot.clone()), 1);
        let b = Reference::element(Reference::Slot(slot.clone()), 1);
        let c = Reference::element(Reference::Slot(slot), 2);
        assert!(a.same(&b));
        assert!(!a.same(&c));
    }
}
