//! Lexically scoped symbol table (spec §3.2).
//!
//! Following the design note on shared symbol tables: `Scope`s live in one
//! arena and are referenced from AST nodes by [`ScopeId`] handle, so many
//! nodes can cheaply share the same table without a lifetime parameter.

use hashbrown::HashMap;
use crate::ir::ValueId;
use crate::mk_idx;
use crate::symbol::Symbol;
use crate::ty::Type;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScopeKind { Global, Function, Loop, Plain }

/// A constant-folded literal, recorded into the table by the `fold` pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Literal { Int(i64), Float(f64) }

#[derive(Clone, Debug)]
pub struct Entry {
  pub ty: Type,
  pub literal: Option<Literal>,
  pub is_initialized: bool,
  pub is_used: bool,
  pub is_deref_taken: bool,
  /// Populated during IR emission: the storage slot backing this symbol.
  pub backend_handle: Option<ValueId>,
}

impl Entry {
  #[must_use] pub fn new(ty: Type) -> Self {
    Entry { ty, literal: None, is_initialized: false, is_used: false, is_deref_taken: false, backend_handle: None }
  }
}

mk_idx! { ScopeId }

pub struct Scope {
  pub kind: ScopeKind,
  pub parent: Option<ScopeId>,
  names: HashMap<Symbol, Entry>,
}

/// The arena of all scopes created during a compile. Handle-indexed per the
/// design note; a `ScopeId` is `Copy` and carries no borrow.
#[derive(Default)]
pub struct SymbolTables {
  scopes: Vec<Scope>,
}

impl SymbolTables {
  pub fn new_scope(&mut self, kind: ScopeKind, parent: Option<ScopeId>) -> ScopeId {
    self.scopes.push(Scope { kind, parent, names: HashMap::new() });
    ScopeId(u32::try_from(self.scopes.len() - 1).expect("too many scopes"))
  }

  #[must_use] pub fn get(&self, id: ScopeId) -> &Scope { &self.scopes[id.0 as usize] }
  pub fn get_mut(&mut self, id: ScopeId) -> &mut Scope { &mut self.scopes[id.0 as usize] }

  /// Insert `name` into `scope`, applying spec §3.2's redeclaration policy:
  /// a redeclaration in the same scope fails, except in `Global` scope where
  /// a redeclaration with an identical type may add an initializer to a
  /// previously-uninitialized entry.
  pub fn insert(&mut self, scope: ScopeId, name: Symbol, entry: Entry) -> Result<(), String> {
    let s = &mut self.scopes[scope.0 as usize];
    if let Some(prev) = s.names.get(&name) {
      if s.kind == ScopeKind::Global && prev.ty == entry.ty && !prev.is_initialized {
        let mut merged = entry;
        merged.is_used = merged.is_used || prev.is_used;
        s.names.insert(name, merged);
        return Ok(())
      }
      return Err(format!("redefinition of '{name}'"))
    }
    s.names.insert(name, entry);
    Ok(())
  }

  /// Walk up the parent chain looking for `name`.
  #[must_use] pub fn lookup(&self, scope: ScopeId, name: Symbol) -> Option<(ScopeId, &Entry)> {
    let mut cur = Some(scope);
    while let Some(id) = cur {
      let s = &self.scopes[id.0 as usize];
      if let Some(e) = s.names.get(&name) { return Some((id, e)) }
      cur = s.parent;
    }
    None
  }

  pub fn lookup_mut(&mut self, scope: ScopeId, name: Symbol) -> Option<&mut Entry> {
    let mut cur = Some(scope);
    while let Some(id) = cur {
      if self.scopes[id.0 as usize].names.contains_key(&name) {
        return self.scopes[id.0 as usize].names.get_mut(&name)
      }
      cur = self.scopes[id.0 as usize].parent;
    }
    None
  }

  /// `lookup_scope(kind)`: whether `scope` or any ancestor has the given kind.
  #[must_use] pub fn lookup_scope(&self, scope: ScopeId, kind: ScopeKind) -> bool {
    let mut cur = Some(scope);
    while let Some(id) = cur {
      let s = &self.scopes[id.0 as usize];
      if s.kind == kind { return true }
      cur = s.parent;
    }
    false
  }

  /// Entries declared directly in `scope` (not ancestors), used by `fold`'s
  /// unused-variable removal.
  pub fn entries(&self, scope: ScopeId) -> impl Iterator<Item = (&Symbol, &Entry)> {
    self.scopes[scope.0 as usize].names.iter()
  }

  pub fn names_in(&self, scope: ScopeId) -> Vec<Symbol> {
    self.scopes[scope.0 as usize].names.keys().copied().collect()
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::ty::Type;

  fn sym() -> Symbol { crate::symbol::intern("x") }

  #[test]
  fn redeclaration_in_same_scope_fails() {
    let mut t = SymbolTables::default();
    let g = t.new_scope(ScopeKind::Plain, None);
    let x = sym();
    t.insert(g, x, Entry::new(Type::int())).unwrap();
    assert!(t.insert(g, x, Entry::new(Type::int())).is_err());
  }

  #[test]
  fn global_redeclaration_adds_initializer() {
    let mut t = SymbolTables::default();
    let g = t.new_scope(ScopeKind::Global, None);
    let x = sym();
    let mut e = Entry::new(Type::int());
    t.insert(g, x, e.clone()).unwrap();
    e.is_initialized = true;
    assert!(t.insert(g, x, e).is_ok());
    assert!(t.lookup(g, x).unwrap().1.is_initialized);
  }

  #[test]
  fn lookup_walks_parents() {
    let mut t = SymbolTables::default();
    let g = t.new_scope(ScopeKind::Global, None);
    let child = t.new_scope(ScopeKind::Plain, Some(g));
    let x = sym();
    t.insert(g, x, Entry::new(Type::int())).unwrap();
    assert!(t.lookup(child, x).is_some());
  }

  #[test]
  fn lookup_scope_finds_enclosing_loop() {
    let mut t = SymbolTables::default();
    let g = t.new_scope(ScopeKind::Function, None);
    let l = t.new_scope(ScopeKind::Loop, Some(g));
    let inner = t.new_scope(ScopeKind::Plain, Some(l));
    assert!(t.lookup_scope(inner, ScopeKind::Loop));
    assert!(t.lookup_scope(inner, ScopeKind::Function));
    assert!(!t.lookup_scope(g, ScopeKind::Loop));
  }
}
