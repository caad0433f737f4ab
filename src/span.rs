//! Source locations.
//!
//! Every AST/IR node and every diagnostic carries one of these. The original
//! implementation (`original_source/src/ast.cpp`) threads a location object
//! through every node constructor; this is the same idea with a `width` so
//! that callers can underline more than a single column.

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Span {
  pub line: u32,
  pub col: u32,
  pub width: u32,
}

impl Span {
  pub const DUMMY: Span = Span { line: 0, col: 0, width: 0 };

  #[must_use]
  pub fn new(line: u32, col: u32, width: u32) -> Self { Span { line, col, width } }
}

impl fmt::Display for Span {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.line, self.col)
  }
}

/// A value tagged with the span it came from.
#[derive(Clone, Copy, Debug)]
pub struct Spanned<T> {
  pub span: Span,
  pub k: T,
}

impl<T> Spanned<T> {
  pub fn new(span: Span, k: T) -> Self { Spanned { span, k } }
}
