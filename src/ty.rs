//! The type algebra (spec §3.1, §4.1): base/pointer/array/function types,
//! widening rank, and the unary/binary/conversion rules.

use crate::diag::{Diagnostic, Diagnostics};
use crate::span::Span;

/// Integral and floating base kinds, ordered by widening rank.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BaseKind { Char, Short, Int, Long, Float, Double }

impl BaseKind {
  #[must_use] pub fn is_float(self) -> bool { matches!(self, BaseKind::Float | BaseKind::Double) }

  #[must_use] pub fn size(self) -> u32 {
    match self {
      BaseKind::Char => 1,
      BaseKind::Short => 2,
      BaseKind::Int | BaseKind::Float => 4,
      BaseKind::Long | BaseKind::Double => 8,
    }
  }
}

#[derive(Clone, Debug)]
pub enum TypeKind {
  Void,
  Base(BaseKind),
  Pointer(Box<Type>),
  Array(Option<u32>, Box<Type>),
  /// Only ever appears as the type of a symbol-table entry, never nested
  /// inside another type constructor (spec §3.1 invariant).
  Function(Box<Type>, Vec<Type>, bool),
}

/// Equality ignores `const` (spec §3.1, invariant 1 of spec §8): the
/// `is_const` flag lives on [`Type`], not [`TypeKind`], so deriving equality
/// on `TypeKind` and delegating `Type`'s `PartialEq` to it is sufficient.
impl PartialEq for TypeKind {
  fn eq(&self, other: &Self) -> bool {
    match (self, other) {
      (TypeKind::Void, TypeKind::Void) => true,
      (TypeKind::Base(a), TypeKind::Base(b)) => a == b,
      (TypeKind::Pointer(a), TypeKind::Pointer(b)) => a == b,
      (TypeKind::Array(la, a), TypeKind::Array(lb, b)) => la == lb && a == b,
      (TypeKind::Function(ra, pa, va), TypeKind::Function(rb, pb, vb)) =>
        ra == rb && pa == pb && va == vb,
      _ => false,
    }
  }
}
impl Eq for TypeKind {}

#[derive(Clone, Debug)]
pub struct Type {
  pub kind: TypeKind,
  pub is_const: bool,
}

impl PartialEq for Type {
  fn eq(&self, other: &Self) -> bool { self.kind == other.kind }
}
impl Eq for Type {}

impl Type {
  #[must_use] pub fn new(kind: TypeKind) -> Self { Type { kind, is_const: false } }
  #[must_use] pub fn constant(mut self) -> Self { self.is_const = true; self }

  #[must_use] pub fn void() -> Self { Type::new(TypeKind::Void) }
  #[must_use] pub fn base(k: BaseKind) -> Self { Type::new(TypeKind::Base(k)) }
  #[must_use] pub fn int() -> Self { Type::base(BaseKind::Int) }
  #[must_use] pub fn pointer(inner: Type) -> Self { Type::new(TypeKind::Pointer(Box::new(inner))) }
  #[must_use] pub fn array(len: Option<u32>, elem: Type) -> Self { Type::new(TypeKind::Array(len, Box::new(elem))) }
  #[must_use] pub fn function(ret: Type, params: Vec<Type>, variadic: bool) -> Self {
    Type::new(TypeKind::Function(Box::new(ret), params, variadic))
  }

  #[must_use] pub fn is_void(&self) -> bool { matches!(self.kind, TypeKind::Void) }
  #[must_use] pub fn is_pointer(&self) -> bool { matches!(self.kind, TypeKind::Pointer(_)) }
  #[must_use] pub fn is_array(&self) -> bool { matches!(self.kind, TypeKind::Array(..)) }
  #[must_use] pub fn is_function(&self) -> bool { matches!(self.kind, TypeKind::Function(..)) }

  #[must_use] pub fn as_base(&self) -> Option<BaseKind> {
    if let TypeKind::Base(k) = self.kind { Some(k) } else { None }
  }

  /// `deref(T)`: defined only for `Pointer`/`Array`, returns the inner type.
  #[must_use] pub fn deref(&self) -> Option<&Type> {
    match &self.kind {
      TypeKind::Pointer(t) | TypeKind::Array(_, t) => Some(t),
      _ => None,
    }
  }

  /// Byte size of a value of this type. Unsized (`Array(None, _)`) types
  /// have no meaningful size and return 0; callers must reject them earlier.
  #[must_use] pub fn size(&self) -> u32 {
    match &self.kind {
      TypeKind::Void | TypeKind::Function(..) => 0,
      TypeKind::Base(k) => k.size(),
      TypeKind::Pointer(_) => 4,
      TypeKind::Array(len, elem) => len.unwrap_or(0) * elem.size(),
    }
  }

  /// MIPS word/byte alignment for this type's storage.
  #[must_use] pub fn align(&self) -> u32 {
    match &self.kind {
      TypeKind::Array(_, elem) => elem.align(),
      _ => self.size().max(1),
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnOp { Deref, AddressOf, LogicalNot, Plus, Neg, BitNot }

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
  Add, Sub, Mul, Div, Mod,
  LogicalAnd, LogicalOr,
  Eq, Ne, Lt, Le, Gt, Ge,
  BitAnd, BitOr, BitXor, Shl, Shr,
}

impl BinOp {
  #[must_use] pub fn is_logical(self) -> bool { matches!(self, BinOp::LogicalAnd | BinOp::LogicalOr) }
  #[must_use] pub fn is_comparison(self) -> bool {
    matches!(self, BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge)
  }
}

/// `unary(op, T)` (spec §4.1).
pub fn unary(op: UnOp, t: &Type, span: Span, diags: &mut Diagnostics) -> Option<Type> {
  match op {
    UnOp::Deref => match t.deref() {
      Some(inner) => Some(inner.clone()),
      None => { diags.push(Diagnostic::error(span, "cannot dereference non-pointer type")); None }
    },
    UnOp::AddressOf => Some(Type::pointer(t.clone())),
    UnOp::LogicalNot => Some(Type::int()),
    UnOp::Plus | UnOp::Neg | UnOp::BitNot => {
      if t.is_pointer() {
        diags.push(Diagnostic::error(span, "invalid operand to unary operator: pointer"));
        None
      } else {
        Some(t.clone())
      }
    }
  }
}

/// `combine(op, L, R)` (spec §4.1).
pub fn combine(op: BinOp, l: &Type, r: &Type, span: Span, diags: &mut Diagnostics) -> Option<Type> {
  if op.is_logical() { return Some(Type::int()) }

  if let (Some(lb), Some(rb)) = (l.as_base(), r.as_base()) {
    if op == BinOp::Mod && (lb.is_float() || rb.is_float()) {
      diags.push(Diagnostic::error(span, "invalid operands to modulo: float"));
      return None
    }
    return Some(if op.is_comparison() { Type::int() } else { Type::base(lb.max(rb)) })
  }

  if l.is_pointer() && r.is_pointer() {
    return if op.is_comparison() {
      Some(Type::int())
    } else {
      diags.push(Diagnostic::error(span, "invalid operands: pointer arithmetic between two pointers"));
      None
    }
  }

  let ptr_plus_int = |ptr: &Type, int_ty: &Type, int_on_left: bool| -> Option<Type> {
    if int_ty.as_base().is_some_and(BaseKind::is_float) {
      diags.push(Diagnostic::error(span, "invalid operands: pointer arithmetic with float"));
      return None
    }
    match op {
      BinOp::Add => Some(ptr.clone()),
      BinOp::Sub if !int_on_left => Some(ptr.clone()),
      _ => { diags.push(Diagnostic::error(span, "invalid operands: pointer arithmetic")); None }
    }
  };

  if l.is_pointer() && r.as_base().is_some() { return ptr_plus_int(l, r, false) }
  if r.is_pointer() && l.as_base().is_some() { return ptr_plus_int(r, l, true) }

  diags.push(Diagnostic::error(span, "invalid operands"));
  None
}

/// `convert(from, to, is_cast)` (spec §4.1). Returns `Ok(())` if the
/// conversion is allowed, pushing a warning for conversions that are allowed
/// but flagged; returns `Err(())` (having pushed an error) if disallowed.
pub fn convert(from: &Type, to: &Type, is_cast: bool, span: Span, diags: &mut Diagnostics) -> Result<(), ()> {
  if from.is_void() != to.is_void() {
    diags.push(Diagnostic::error(span, "cannot convert between void and non-void"));
    return Err(())
  }
  let from_float = from.as_base().is_some_and(BaseKind::is_float);
  let to_float = to.as_base().is_some_and(BaseKind::is_float);
  if (from.is_pointer() && to_float) || (from_float && to.is_pointer()) {
    diags.push(Diagnostic::error(span, "cannot convert between pointer and float"));
    return Err(())
  }
  if !is_cast {
    if (from.is_pointer() && to.as_base().is_some()) || (from.as_base().is_some() && to.is_pointer()) {
      diags.push(Diagnostic::warning(span, "conversion between pointer and integer"));
    }
    if let (Some(fb), Some(tb)) = (from.as_base(), to.as_base()) {
      if tb < fb { diags.push(Diagnostic::warning(span, "narrowing conversion")); }
    }
    if let (Some(fi), Some(ti)) = (from.deref(), to.deref()) {
      if from.is_pointer() && to.is_pointer() && fi != ti {
        diags.push(Diagnostic::warning(span, "conversion between distinct pointer types"));
      }
    }
    if from.is_pointer() && to.as_base() == Some(BaseKind::Char) {
      diags.push(Diagnostic::warning(span, "narrowing conversion from pointer to char"));
    }
  }
  Ok(())
}
