//! Top-level error types (spec §7).

use thiserror::Error;

/// Driver-level I/O failures; not a problem with the source program.
#[derive(Debug, Error)]
pub enum DriverError {
  #[error("cannot open input file {path}: {source}")]
  OpenInput { path: String, #[source] source: std::io::Error },
  #[error("cannot write output file {path}: {source}")]
  WriteOutput { path: String, #[source] source: std::io::Error },
  #[error("{0}")]
  Unsupported(String),
}

/// A violated compiler invariant. Unlike [`crate::diag::Diagnostic`]s this
/// always indicates a bug in the compiler, not the input program, and
/// aborts immediately rather than accumulating (spec §7 policy).
#[derive(Debug, Error)]
pub enum InternalError {
  #[error("internal compiler error: {0}")]
  Invariant(String),
}

impl InternalError {
  pub fn bug(msg: impl Into<String>) -> Self { InternalError::Invariant(msg.into()) }
}

#[derive(Debug, Error)]
pub enum CompileError {
  #[error(transparent)]
  Driver(#[from] DriverError),
  #[error("compilation failed with {0} error(s)")]
  Semantic(usize),
  #[error(transparent)]
  Internal(#[from] InternalError),
}
