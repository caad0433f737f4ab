//! Diagnostics (spec §7): errors accumulate within a pass so a user sees
//! every problem found by one run, not just the first.

use std::fmt;
use crate::span::Span;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity { Warning, Error }

#[derive(Clone, Debug)]
pub struct Diagnostic {
  pub span: Span,
  pub severity: Severity,
  pub message: String,
}

impl Diagnostic {
  pub fn error(span: Span, message: impl Into<String>) -> Self {
    Diagnostic { span, severity: Severity::Error, message: message.into() }
  }
  pub fn warning(span: Span, message: impl Into<String>) -> Self {
    Diagnostic { span, severity: Severity::Warning, message: message.into() }
  }
}

impl fmt::Display for Diagnostic {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let kind = match self.severity { Severity::Warning => "warning", Severity::Error => "error" };
    write!(f, "{}: {}: {}", self.span, kind, self.message)
  }
}

/// A pass's diagnostic sink. Warnings are logged and kept; errors are
/// logged, kept, and checked by [`Diagnostics::has_errors`] so the driver
/// can abort after the pass completes rather than mid-pass.
#[derive(Default)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
  pub fn push(&mut self, d: Diagnostic) {
    match d.severity {
      Severity::Warning => log::warn!("{d}"),
      Severity::Error => log::error!("{d}"),
    }
    self.0.push(d);
  }

  #[must_use] pub fn has_errors(&self) -> bool {
    self.0.iter().any(|d| d.severity == Severity::Error)
  }

  #[must_use] pub fn error_count(&self) -> usize {
    self.0.iter().filter(|d| d.severity == Severity::Error).count()
  }

  pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> { self.0.iter() }
  pub fn extend(&mut self, other: Diagnostics) { self.0.extend(other.0); }
  #[must_use] pub fn into_vec(self) -> Vec<Diagnostic> { self.0 }
}
