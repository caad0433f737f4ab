//! MIPS instruction emission (spec §4.5), per the corrected semantics in
//! spec §9 (shifted `lui` immediate, a single consistent float load/store
//! register pair, valid `s.s` encoding) — the known source defects are not
//! reproduced.
//!
//! One linear pass per function: blocks are walked in id order, each
//! instruction is emitted through [`RegMapper`], and branches/jumps fall
//! through when the target is literally the next block. The frame size is
//! only known once the whole body has been walked (the register mapper
//! grows the stack on demand as it allocates and spills), so the `Return`
//! epilogue is a placeholder line patched in after the fact.

use crate::ir::{
  BlockId, CastKind, FBinOp, FCmpOp, Function, GepIndex, IBinOp, ICmpOp, Instruction, Module, Opcode, Operand, Size,
  ValueId,
};
use crate::mips::regmap::{Class, ConstMat, Reg, RegMapper};
use crate::symbol::Symbol;

const RETURN_SENTINEL: &str = "@@RETURN@@";

/// Emit one function's body as MIPS text, including its label, prologue and
/// epilogue. May intern new float constants into `module` (spec §4.4
/// `load_value`'s constant-materialization step).
#[must_use] pub fn emit_function_text(module: &mut Module, f: &Function) -> String {
  let mut rm = RegMapper::new();
  let mut body: Vec<String> = Vec::new();
  let mut labels = 0u32;

  for (bid, bl) in f.blocks.enum_iter() {
    if bid != f.entry {
      body.push(format!("{}:", block_label(f, bid)));
    }
    let next = next_block(f, bid);
    for inst in &bl.insts {
      emit_inst(&mut rm, f, module, &mut body, inst, next, &mut labels);
    }
  }

  // The body is fully emitted and `rm.stack_size` final; reserve one more
  // word for the saved return address, 8-byte aligned.
  let frame_size = (rm.stack_size + 4).div_ceil(8) * 8;
  let ra_offset = frame_size - 4;

  let mut out = String::new();
  out.push_str(&format!("{}:\n", f.name));
  out.push_str(&format!("  addi $sp, $sp, -{frame_size}\n"));
  out.push_str(&format!("  sw $ra, {ra_offset}($sp)\n"));
  for line in body {
    if line == RETURN_SENTINEL {
      out.push_str(&format!("  lw $ra, {ra_offset}($sp)\n"));
      out.push_str(&format!("  addi $sp, $sp, {frame_size}\n"));
      out.push_str("  jr $ra\n");
    } else if line.ends_with(':') {
      out.push_str(&line);
      out.push('\n');
    } else {
      out.push_str("  ");
      out.push_str(&line);
      out.push('\n');
    }
  }
  out
}

fn block_label(f: &Function, bid: BlockId) -> String {
  if bid == f.entry { f.name.to_string() } else { format!("{}_L{}", f.name, bid.0) }
}

fn next_block(f: &Function, bid: BlockId) -> Option<BlockId> {
  let n = BlockId(bid.0 + 1);
  if (n.0 as usize) < f.blocks.len() { Some(n) } else { None }
}

fn fresh_label(f: &Function, labels: &mut u32) -> String {
  *labels += 1;
  format!("{}_tmp{}", f.name, *labels)
}

fn operand_class(f: &Function, op: Operand) -> Class {
  match op {
    Operand::ConstInt(_) => Class::Int,
    Operand::ConstFloat(_) => Class::Float,
    Operand::Value(v) => Class::of(f.values[v].kind),
  }
}

fn mnemonic_move(class: Class) -> &'static str {
  match class { Class::Int => "move", Class::Float => "mov.s" }
}

/// `GEP` with a variable index: scale the index (`mulu` into a scratch when
/// the element size isn't 1) then add it onto the base.
fn emit_gep_var(
  rm: &mut RegMapper, f: &Function, module: &mut Module, out: &mut Vec<String>, dreg: &Reg, breg: &Reg,
  idx_op: Operand, scale: u32,
) {
  let ireg = rm.load_value(f, module, out, idx_op);
  if scale == 1 {
    out.push(format!("addu {}, {}, {}", dreg.name, breg.name, ireg.name));
  } else {
    let sreg = rm.materialize_const(Class::Int, out, ConstMat::Int(i64::from(scale)));
    let preg = rm.scratch(Class::Int);
    out.push(format!("mulu {}, {}, {}", preg.name, ireg.name, sreg.name));
    out.push(format!("addu {}, {}, {}", dreg.name, breg.name, preg.name));
  }
}

#[allow(clippy::too_many_lines)]
fn emit_inst(
  rm: &mut RegMapper, f: &Function, module: &mut Module, out: &mut Vec<String>, inst: &Instruction,
  next: Option<BlockId>, labels: &mut u32,
) {
  match &inst.op {
    Opcode::Move(src) => {
      let Some(result) = inst.result else { return };
      let sreg = rm.load_value(f, module, out, *src);
      let dreg = rm.dest_for(f, out, result);
      out.push(format!("{} {}, {}", mnemonic_move(dreg.class), dreg.name, sreg.name));
    }
    Opcode::IBin(op, l, r) => {
      let Some(result) = inst.result else { return };
      let lr = rm.load_value(f, module, out, *l);
      let rr = rm.load_value(f, module, out, *r);
      let dreg = rm.dest_for(f, out, result);
      let mn = match op {
        IBinOp::Add => "add", IBinOp::Sub => "sub", IBinOp::Mul => "mul",
        IBinOp::Div => "div", IBinOp::DivU => "divu",
        IBinOp::And => "and", IBinOp::Or => "or", IBinOp::Xor => "xor",
        IBinOp::Shl => "sllv", IBinOp::Shr => "srlv",
      };
      out.push(format!("{mn} {}, {}, {}", dreg.name, lr.name, rr.name));
    }
    Opcode::FBin(op, l, r) => {
      let Some(result) = inst.result else { return };
      let lr = rm.load_value(f, module, out, *l);
      let rr = rm.load_value(f, module, out, *r);
      let dreg = rm.dest_for(f, out, result);
      let mn = match op { FBinOp::Add => "add.s", FBinOp::Sub => "sub.s", FBinOp::Mul => "mul.s", FBinOp::Div => "div.s" };
      out.push(format!("{mn} {}, {}, {}", dreg.name, lr.name, rr.name));
    }
    Opcode::Mod(l, r) => {
      let Some(result) = inst.result else { return };
      let lr = rm.load_value(f, module, out, *l);
      let rr = rm.load_value(f, module, out, *r);
      let dreg = rm.dest_for(f, out, result);
      out.push(format!("divu {}, {}", lr.name, rr.name));
      out.push(format!("mfhi {}", dreg.name));
    }
    Opcode::ICmp(op, l, r) => {
      let Some(result) = inst.result else { return };
      let lr = rm.load_value(f, module, out, *l);
      let rr = rm.load_value(f, module, out, *r);
      let dreg = rm.dest_for(f, out, result);
      let mn = match op {
        ICmpOp::Eq => "seq", ICmpOp::Ne => "sne",
        ICmpOp::Lt => "slt", ICmpOp::Le => "sle", ICmpOp::Gt => "sgt", ICmpOp::Ge => "sge",
        ICmpOp::LtU => "sltu", ICmpOp::LeU => "sleu", ICmpOp::GtU => "sgtu", ICmpOp::GeU => "sgeu",
      };
      out.push(format!("{mn} {}, {}, {}", dreg.name, lr.name, rr.name));
    }
    Opcode::FCmp(op, l, r) => {
      let Some(result) = inst.result else { return };
      let lr = rm.load_value(f, module, out, *l);
      let rr = rm.load_value(f, module, out, *r);
      let dreg = rm.dest_for(f, out, result);
      let (cc, invert) = match op {
        FCmpOp::Eq => ("c.eq.s", false), FCmpOp::Ne => ("c.eq.s", true),
        FCmpOp::Lt => ("c.lt.s", false), FCmpOp::Le => ("c.le.s", false),
      };
      let skip = fresh_label(f, labels);
      out.push(format!("{cc} {}, {}", lr.name, rr.name));
      out.push(format!("li {}, 0", dreg.name));
      out.push(format!("{} {skip}", if invert { "bc1t" } else { "bc1f" }));
      out.push(format!("li {}, 1", dreg.name));
      out.push(format!("{skip}:"));
    }
    Opcode::Load(addr, size) => {
      let Some(result) = inst.result else { return };
      let areg = rm.load_value(f, module, out, *addr);
      let dreg = rm.dest_for(f, out, result);
      let mn = match dreg.class {
        Class::Float => "l.s",
        Class::Int if *size == Size::Byte => "lb",
        Class::Int => "lw",
      };
      out.push(format!("{mn} {}, 0({})", dreg.name, areg.name));
    }
    Opcode::Store(addr, val, size) => {
      let areg = rm.load_value(f, module, out, *addr);
      let vreg = rm.load_value(f, module, out, *val);
      let mn = match operand_class(f, *val) {
        Class::Float => "s.s",
        Class::Int if *size == Size::Byte => "sb",
        Class::Int => "sw",
      };
      out.push(format!("{mn} {}, 0({})", vreg.name, areg.name));
    }
    Opcode::Alloca(size) => {
      let Some(result) = inst.result else { return };
      rm.alloca(result, *size);
    }
    Opcode::Gep(base, indices) => {
      let Some(result) = inst.result else { return };
      let breg = rm.load_value(f, module, out, *base);
      let dreg = rm.dest_for(f, out, result);
      match indices.as_slice() {
        [] | [GepIndex::Const(0, _)] => out.push(format!("move {}, {}", dreg.name, breg.name)),
        [GepIndex::Const(k, scale)] => {
          let off = k * i64::from(*scale);
          out.push(format!("addu {}, {}, {off}", dreg.name, breg.name));
        }
        [GepIndex::Var(idx_op, scale)] => {
          emit_gep_var(rm, f, module, out, &dreg, &breg, *idx_op, *scale);
        }
        chained => {
          out.push(format!("move {}, {}", dreg.name, breg.name));
          for gi in chained {
            match *gi {
              GepIndex::Const(k, scale) => {
                let off = k * i64::from(scale);
                if off != 0 { out.push(format!("addu {}, {}, {off}", dreg.name, dreg.name)); }
              }
              GepIndex::Var(idx_op, scale) => {
                let dreg2 = dreg.clone();
                emit_gep_var(rm, f, module, out, &dreg2, &dreg2, idx_op, scale);
              }
            }
          }
        }
      }
    }
    Opcode::Branch(cond, t, e) => {
      let creg = rm.load_value(f, module, out, *cond);
      let tl = block_label(f, *t);
      let el = block_label(f, *e);
      if next == Some(*t) {
        out.push(format!("beqz {}, {el}", creg.name));
      } else if next == Some(*e) {
        out.push(format!("bnez {}, {tl}", creg.name));
      } else {
        out.push(format!("beqz {}, {el}", creg.name));
        out.push(format!("j {tl}"));
      }
    }
    Opcode::Jump(target) => {
      if next != Some(*target) {
        out.push(format!("j {}", block_label(f, *target)));
      }
    }
    Opcode::Call(fid, args) => {
      let callee = module.functions[*fid].name;
      emit_call(rm, f, module, out, callee, args, inst.result);
    }
    Opcode::ExternCall(name, args) => {
      emit_call(rm, f, module, out, *name, args, inst.result);
    }
    Opcode::Return(val) if f.is_main => {
      // main's return is the program's exit: the returned value becomes the
      // exit code via syscall 17, not an ordinary callee return.
      if let Some(v) = val {
        let reg = rm.load_value(f, module, out, *v);
        out.push(format!("move $a0, {}", reg.name));
      }
      out.push("li $v0, 17".to_string());
      out.push("syscall".to_string());
    }
    Opcode::Return(val) => {
      if let Some(v) = val {
        let reg = rm.load_value(f, module, out, *v);
        match reg.class {
          Class::Int => out.push(format!("move $v0, {}", reg.name)),
          Class::Float => out.push(format!("mov.s $f0, {}", reg.name)),
        }
      }
      rm.load_saved(out);
      out.push(RETURN_SENTINEL.to_string());
    }
    Opcode::Cast(kind, v) => {
      let Some(result) = inst.result else { return };
      let sreg = rm.load_value(f, module, out, *v);
      let dreg = rm.dest_for(f, out, result);
      match kind {
        CastKind::Trivial => out.push(format!("move {}, {}", dreg.name, sreg.name)),
        CastKind::IntToFloat => {
          out.push(format!("mtc1 {}, {}", sreg.name, dreg.name));
          out.push(format!("cvt.s.w {}, {}", dreg.name, dreg.name));
        }
        CastKind::FloatToInt => {
          let tmp = rm.scratch(Class::Float);
          out.push(format!("cvt.w.s {}, {}", tmp.name, sreg.name));
          out.push(format!("mfc1 {}, {}", dreg.name, tmp.name));
        }
      }
    }
  }
}

/// Shared `Call`/`ExternCall` lowering: spill every live register (the
/// callee may clobber any of them — spec §4.4 has no callee-saved class),
/// move arguments into the incoming-argument window (`RegMapper::param_reg`'s
/// counterpart on the caller side), `jal`, then bind the result.
fn emit_call(
  rm: &mut RegMapper, f: &Function, module: &mut Module, out: &mut Vec<String>, label: Symbol,
  args: &[Operand], result: Option<ValueId>,
) {
  for v in rm.live_values() {
    rm.spill_for_call(f, out, v);
  }

  const INT_ARG: [&str; 4] = ["$a0", "$a1", "$a2", "$a3"];
  const FLOAT_ARG: [&str; 2] = ["$f12", "$f14"];
  let mut int_n = 0usize;
  let mut float_n = 0usize;
  for &a in args {
    let reg = rm.load_value(f, module, out, a);
    match operand_class(f, a) {
      Class::Int => {
        out.push(format!("move {}, {}", INT_ARG[int_n], reg.name));
        int_n += 1;
      }
      Class::Float => {
        out.push(format!("mov.s {}, {}", FLOAT_ARG[float_n], reg.name));
        float_n += 1;
      }
    }
  }

  out.push(format!("jal {label}"));

  if let Some(result) = result {
    let dreg = rm.dest_for(f, out, result);
    match dreg.class {
      Class::Int => out.push(format!("move {}, $v0", dreg.name)),
      Class::Float => out.push(format!("mov.s {}, $f0", dreg.name)),
    }
  }
}
