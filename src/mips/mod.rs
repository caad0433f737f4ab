//! The MIPS32 backend (spec §4.4–§4.6): a per-function register mapper, a
//! per-opcode instruction emitter built on it, and `.data`/`.text` module
//! assembly.

pub mod emit;
pub mod module;
pub mod regmap;
