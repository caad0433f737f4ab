//! `cmips`: a compiler for a C-like imperative language, targeting MIPS32
//! assembly (SPIM/MARS). See `DESIGN.md` for how each module is grounded.
//!
//! The pipeline (spec §2): `fill` → `check` → `fold` over an [`ast::Ast`],
//! then [`irgen::lower`] to a linear [`ir::Module`], then the `mips` backend
//! turns that into assembly text. [`driver::run`] wires the whole thing
//! together; [`frontend::build`] is the documented seam an external parser
//! fills in (spec §1: parsing is out of scope).

pub mod ast;
pub mod diag;
pub mod driver;
pub mod error;
pub mod frontend;
pub mod idx;
pub mod ir;
pub mod irgen;
pub mod mips;
pub mod passes;
pub mod scope;
pub mod span;
pub mod symbol;
pub mod ty;
