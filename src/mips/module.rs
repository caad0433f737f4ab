//! `.data`/`.text` section printing (spec §4.6).

use crate::ir::{GlobalId, GlobalInit, Module};
use crate::symbol::Symbol;

/// The assembler label a global variable is printed/referenced under.
/// Combines the arena id (for guaranteed uniqueness) with the source name
/// (for readability) — spec §4.5 labels blocks/values by raw identity, but
/// for globals keeping the name is worth the extra readability since
/// nothing else needs to parse the label back out.
#[must_use] pub fn global_label(id: GlobalId, name: Symbol) -> String {
  format!("g{}_{}", id.0, name)
}

/// The label a float constant is printed under; matches
/// `RegMapper::load_value`'s `__fconst{idx}` references.
#[must_use] pub fn float_const_label(idx: usize) -> String { format!("__fconst{idx}") }

/// Assemble a whole module to MIPS text. Emission runs before `.data` is
/// printed because a function body can still intern new float constants
/// while it's being emitted (spec §4.4 `load_value`'s constant-
/// materialization step) — the module's `.data` section is only fully known
/// once every function has been emitted.
#[must_use] pub fn assemble(module: &mut Module) -> String {
  let ids: Vec<_> = module.functions.enum_iter().map(|(id, _)| id).collect();
  let mut func_texts = Vec::with_capacity(ids.len());
  for fid in ids {
    let f = module.functions[fid].clone();
    func_texts.push(crate::mips::emit::emit_function_text(module, &f));
  }

  let mut out = String::new();
  out.push_str(".data\n");
  for (idx, val) in module.float_consts.iter().enumerate() {
    out.push_str(&format!("{}: .float {}\n", float_const_label(idx), val));
  }
  for (gid, g) in module.globals.enum_iter() {
    let label = global_label(gid, g.name);
    match &g.init {
      Some(GlobalInit::Word(w)) => out.push_str(&format!("{label}: .word {w}\n")),
      Some(GlobalInit::Bytes(b)) if is_c_string(b) => {
        out.push_str(&format!("{label}: .asciiz \"{}\"\n", escape_ascii(b)));
      }
      Some(GlobalInit::Bytes(b)) => out.push_str(&format!("{label}: .byte {}\n", format_bytes(b))),
      None => out.push_str(&format!("{label}: .space {}\n", g.size.max(1))),
    }
  }
  out.push('\n');
  out.push_str(".text\n");
  out.push_str("  j main\n");
  for text in func_texts {
    out.push_str(&text);
  }
  out
}

fn is_c_string(b: &[u8]) -> bool {
  !b.is_empty() && b.last() == Some(&0) && b[..b.len() - 1].iter().all(|&c| c != 0)
}

fn escape_ascii(b: &[u8]) -> String {
  b[..b.len() - 1].iter().map(|&c| match c {
    b'\n' => "\\n".to_string(),
    b'\t' => "\\t".to_string(),
    b'"' => "\\\"".to_string(),
    b'\\' => "\\\\".to_string(),
    c => (c as char).to_string(),
  }).collect()
}

fn format_bytes(b: &[u8]) -> String {
  b.iter().map(u8::to_string).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::idx::IdxVec;
  use crate::ir::{BasicBlock, BlockId, Function, GlobalVar, Instruction, Opcode};

  #[test]
  fn assemble_starts_with_data_then_text_with_jump_to_main() {
    let mut m = Module::default();
    m.globals.push(GlobalVar { name: crate::symbol::intern("g"), size: 4, init: Some(GlobalInit::Word(3)) });
    let mut bl = BasicBlock::default();
    bl.insts.push(Instruction { result: None, op: Opcode::Return(None) });
    let f = Function {
      name: crate::symbol::intern("main"),
      params: vec![],
      ret_is_float: false,
      ret_size: 4,
      is_main: true,
      blocks: { let mut b = IdxVec::new(); b.push(bl); b },
      values: IdxVec::new(),
      entry: BlockId(0),
    };
    m.functions.push(f);
    let text = assemble(&mut m);
    let data_pos = text.find(".data").unwrap();
    let text_pos = text.find(".text").unwrap();
    assert!(data_pos < text_pos);
    assert!(text.contains("j main"));
    assert!(text.contains("main:"));
  }
}
