//! Identifier interning.
//!
//! Mirrors the teacher's `Symbol`/interner split (`types/entity.rs` uses
//! `Symbol` throughout and interns keywords via `intern`): identifiers are
//! interned once so the symbol table and AST can compare/hash names in O(1)
//! instead of carrying owned `String`s at every use site.

use std::cell::RefCell;
use hashbrown::HashMap;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(u32);

impl Symbol {
  #[must_use] pub fn as_str(self) -> String {
    with_interner(|i| i.strings[self.0 as usize].to_string())
  }
}

impl std::fmt::Debug for Symbol {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{:?}", self.as_str())
  }
}

impl std::fmt::Display for Symbol {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

#[derive(Default)]
struct Interner {
  map: HashMap<Box<str>, u32>,
  strings: Vec<Box<str>>,
}

impl Interner {
  fn intern(&mut self, s: &str) -> Symbol {
    if let Some(&id) = self.map.get(s) { return Symbol(id) }
    let id = u32::try_from(self.strings.len()).expect("interner overflow");
    let b: Box<str> = s.into();
    self.strings.push(b.clone());
    self.map.insert(b, id);
    Symbol(id)
  }
}

thread_local! {
  static INTERNER: RefCell<Interner> = RefCell::new(Interner::default());
}

fn with_interner<R>(f: impl FnOnce(&Interner) -> R) -> R {
  INTERNER.with(|i| f(&i.borrow()))
}

/// Intern a string, returning a cheaply-comparable [`Symbol`].
#[must_use]
pub fn intern(s: &str) -> Symbol {
  INTERNER.with(|i| i.borrow_mut().intern(s))
}

#[cfg(test)]
mod test {
  use super::intern;

  #[test]
  fn interning_is_idempotent() {
    assert_eq!(intern("foo"), intern("foo"));
    assert_ne!(intern("foo"), intern("bar"));
    assert_eq!(intern("foo").as_str(), "foo");
  }
}
