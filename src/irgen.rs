//! AST → IR lowering (spec §4.3).
//!
//! A single-pass, bottom-up lowering: each function becomes one [`Function`]
//! whose body is lowered block by block. L-value vs r-value context is
//! tracked per call site rather than per node — `address_of` computes a
//! storage address, `lower_expr` always computes a value — mirroring the
//! AST passes' own "small state struct carrying the current function" shape
//! (spec §9's note on replacing per-variant visitor methods with a match
//! driven by explicit context).

use hashbrown::HashMap;

use crate::ast::{Ast, ControlKind, ExprId, ExprKind, Literal, LitValue, PostOp, StmtId, StmtKind};
use crate::idx::IdxVec;
use crate::ir::{
  BasicBlock, BlockId, CastKind, FBinOp, FCmpOp, FuncId, Function, GepIndex, GlobalId, GlobalInit, GlobalVar,
  IBinOp, ICmpOp, Instruction, Module, Opcode, Operand, Size, ValueData, ValueId, ValueKind, ValueOrigin,
};
use crate::symbol::Symbol;
use crate::ty::{BaseKind, BinOp, Type, UnOp};

fn value_kind(ty: &Type) -> ValueKind {
  match ty.as_base() {
    Some(b) if b.is_float() => ValueKind::Float,
    Some(BaseKind::Char) => ValueKind::Int(Size::Byte),
    Some(_) => ValueKind::Int(Size::Word),
    None => ValueKind::Ptr,
  }
}

fn store_size(k: ValueKind) -> Size {
  match k { ValueKind::Int(s) => s, ValueKind::Float | ValueKind::Ptr => Size::Word }
}

/// Lower a fully filled/checked/folded [`Ast`] into an IR [`Module`].
///
/// Mutates `ast` only to stamp each variable `Entry`'s `backend_handle` with
/// the `ValueId` of the storage address the variable was given in its
/// function (spec §3.2's "backend handle slot ... populated during IR
/// emission").
pub fn lower(ast: &mut Ast) -> Module {
  let mut module = Module::default();
  let mut func_ids: HashMap<Symbol, FuncId> = HashMap::new();
  let mut global_ids: HashMap<Symbol, GlobalId> = HashMap::new();

  let Some(root) = ast.root else { return module };
  let top = match ast.stmts[root].kind.clone() {
    StmtKind::Scope(b, _) => b,
    _ => return module,
  };

  for &s in &top {
    if let StmtKind::VariableDeclaration(name, ty, init) = ast.stmts[s].kind.clone() {
      let init_kind = init.map(|e| ast.exprs[e].kind.clone());
      let ginit = match init_kind {
        Some(ExprKind::Literal(Literal { value: LitValue::Int(i), .. })) => Some(GlobalInit::Word(i)),
        Some(ExprKind::Literal(Literal { value: LitValue::Float(f), .. })) =>
          Some(GlobalInit::Word(i64::from((f as f32).to_bits()))),
        Some(ExprKind::StringLiteral(bytes)) => Some(GlobalInit::Bytes(bytes)),
        _ => None,
      };
      let gid = module.globals.push(GlobalVar { name, size: ty.size().max(1), init: ginit });
      global_ids.insert(name, gid);
    }
  }

  for &s in &top {
    if let StmtKind::FunctionDefinition(name, ret, _, _) = ast.stmts[s].kind.clone() {
      let fid = module.functions.push(Function {
        name,
        params: Vec::new(),
        ret_is_float: ret.as_base().is_some_and(BaseKind::is_float),
        ret_size: ret.size(),
        is_main: name.as_str() == "main",
        blocks: IdxVec::new(),
        values: IdxVec::new(),
        entry: BlockId(0),
      });
      if name.as_str() == "main" { module.main = Some(fid); }
      func_ids.insert(name, fid);
    }
  }

  for &s in &top {
    if let StmtKind::FunctionDefinition(name, _, params, body) = ast.stmts[s].kind.clone() {
      let fid = func_ids[&name];
      lower_function(ast, &mut module, &func_ids, &global_ids, fid, &params, body);
    }
  }

  module
}

fn lower_function(
  ast: &mut Ast, module: &mut Module, func_ids: &HashMap<Symbol, FuncId>, global_ids: &HashMap<Symbol, GlobalId>,
  fid: FuncId, params: &[(Symbol, Type)], body: StmtId,
) {
  let entry = module.functions[fid].blocks.push(BasicBlock::default());
  module.functions[fid].entry = entry;
  let mut cx = FnCx { ast, module, func_ids, global_ids, fid, cur: entry, loop_stack: Vec::new() };

  let body_scope = cx.ast.stmts[body].scope;
  for (i, (pname, pty)) in params.iter().enumerate() {
    let kind = value_kind(pty);
    let praw = cx.new_value(kind, ValueOrigin::Param(u32::try_from(i).expect("too many parameters")));
    cx.module.functions[fid].params.push(praw);
    let size = pty.size().max(1);
    let addr = cx.emit(ValueKind::Ptr, Opcode::Alloca(size));
    cx.emit_void(Opcode::Store(Operand::Value(addr), Operand::Value(praw), store_size(kind)));
    if let Some(e) = cx.ast.tables.lookup_mut(body_scope, *pname) { e.backend_handle = Some(addr); }
  }

  cx.lower_stmt(body);
  if !cx.is_terminated() { cx.emit_void(Opcode::Return(None)); }
  cx.module.functions[fid].prune_unreachable_tail();
}

struct FnCx<'a> {
  ast: &'a mut Ast,
  module: &'a mut Module,
  func_ids: &'a HashMap<Symbol, FuncId>,
  global_ids: &'a HashMap<Symbol, GlobalId>,
  fid: FuncId,
  cur: BlockId,
  /// (break target, continue target) for the innermost enclosing loop.
  loop_stack: Vec<(BlockId, BlockId)>,
}

impl<'a> FnCx<'a> {
  fn new_value(&mut self, kind: ValueKind, origin: ValueOrigin) -> ValueId {
    self.module.functions[self.fid].values.push(ValueData { kind, origin })
  }
  fn new_block(&mut self) -> BlockId { self.module.functions[self.fid].blocks.push(BasicBlock::default()) }
  fn switch_to(&mut self, b: BlockId) { self.cur = b; }
  fn is_terminated(&self) -> bool { self.module.functions[self.fid].blocks[self.cur].is_terminated() }

  fn push_inst(&mut self, result: Option<ValueId>, op: Opcode) {
    self.module.functions[self.fid].blocks[self.cur].insts.push(Instruction { result, op });
  }
  fn emit(&mut self, kind: ValueKind, op: Opcode) -> ValueId {
    let v = self.new_value(kind, ValueOrigin::Inst);
    self.push_inst(Some(v), op);
    v
  }
  fn emit_void(&mut self, op: Opcode) { self.push_inst(None, op); }

  fn lower_stmt(&mut self, id: StmtId) {
    let node = self.ast.stmts[id].clone();
    match node.kind {
      StmtKind::Scope(body, _) => {
        for s in body {
          if self.is_terminated() { break }
          self.lower_stmt(s);
        }
      }
      StmtKind::Expr(e) => { self.lower_expr(e); }
      StmtKind::VariableDeclaration(name, ty, init) => {
        let kind = value_kind(&ty);
        let size = ty.size().max(1);
        let addr = self.emit(ValueKind::Ptr, Opcode::Alloca(size));
        if let Some(e) = self.ast.tables.lookup_mut(node.scope, name) { e.backend_handle = Some(addr); }
        if let Some(e) = init {
          let v = self.lower_expr(e);
          self.emit_void(Opcode::Store(Operand::Value(addr), v, store_size(kind)));
        }
      }
      StmtKind::FunctionDeclaration(..) | StmtKind::FunctionDefinition(..) | StmtKind::IncludeStdio => {}
      StmtKind::If(cond, t, e) => self.lower_if(cond, t, e),
      StmtKind::Loop { init, cond, iter, body, do_while } => self.lower_loop(init, cond, iter, body, do_while),
      StmtKind::Control(k) => {
        let (brk, cont) = *self.loop_stack.last().expect("break/continue outside loop rejected by check");
        let target = match k { ControlKind::Break => brk, ControlKind::Continue => cont };
        self.emit_void(Opcode::Jump(target));
      }
      StmtKind::Return(e) => {
        let v = e.map(|e| self.lower_expr(e));
        self.emit_void(Opcode::Return(v));
      }
    }
  }

  fn lower_if(&mut self, cond: ExprId, t: StmtId, e: Option<StmtId>) {
    let c = self.lower_expr(cond);
    let then_b = self.new_block();
    let else_b = self.new_block();
    let merge_b = self.new_block();
    self.emit_void(Opcode::Branch(c, then_b, else_b));

    self.switch_to(then_b);
    self.lower_stmt(t);
    if !self.is_terminated() { self.emit_void(Opcode::Jump(merge_b)); }

    self.switch_to(else_b);
    if let Some(e) = e { self.lower_stmt(e); }
    if !self.is_terminated() { self.emit_void(Opcode::Jump(merge_b)); }

    self.switch_to(merge_b);
  }

  fn lower_loop(&mut self, init: Option<StmtId>, cond: Option<ExprId>, iter: Option<ExprId>, body: StmtId, do_while: bool) {
    if let Some(i) = init { self.lower_stmt(i); }
    let header = self.new_block();
    let body_b = self.new_block();
    let latch = self.new_block();
    let exit = self.new_block();

    self.emit_void(Opcode::Jump(if do_while { body_b } else { header }));

    self.switch_to(header);
    match cond {
      Some(c) => { let v = self.lower_expr(c); self.emit_void(Opcode::Branch(v, body_b, exit)); }
      None => self.emit_void(Opcode::Jump(body_b)),
    }

    self.switch_to(body_b);
    self.loop_stack.push((exit, latch));
    self.lower_stmt(body);
    self.loop_stack.pop();
    if !self.is_terminated() { self.emit_void(Opcode::Jump(latch)); }

    self.switch_to(latch);
    if let Some(it) = iter { self.lower_expr(it); }
    self.emit_void(Opcode::Jump(header));

    self.switch_to(exit);
  }

  /// The storage address of an l-value expression (`Variable`, `Subscript`,
  /// or `Deref`'d pointer) — what `Assignment`'s left side and `&x` both need.
  fn address_of(&mut self, id: ExprId) -> Operand {
    let node = self.ast.exprs[id].clone();
    match node.kind {
      ExprKind::Variable(name) => {
        let handle = self.ast.tables.lookup(node.scope, name).and_then(|(_, e)| e.backend_handle);
        if let Some(v) = handle { return Operand::Value(v) }
        let gid = *self.global_ids.get(&name).expect("undeclared variable reached irgen");
        Operand::Value(self.new_value(ValueKind::Ptr, ValueOrigin::Global(gid)))
      }
      ExprKind::Subscript(base, index) => {
        let base_ty = self.ast.exprs[base].ty.clone().unwrap_or_else(Type::int);
        let base_addr = if base_ty.is_array() { self.address_of(base) } else { self.lower_expr(base) };
        let elem_ty = base_ty.deref().cloned().unwrap_or_else(Type::int);
        let elem_size = elem_ty.size().max(1);
        let index_kind = self.ast.exprs[index].kind.clone();
        let gi = if let ExprKind::Literal(Literal { value: LitValue::Int(k), .. }) = index_kind {
          GepIndex::Const(k, elem_size)
        } else {
          let iv = self.lower_expr(index);
          GepIndex::Var(iv, elem_size)
        };
        Operand::Value(self.emit(ValueKind::Ptr, Opcode::Gep(base_addr, vec![gi])))
      }
      ExprKind::Prefix(UnOp::Deref, e) => self.lower_expr(e),
      _ => unreachable!("expression is not an lvalue"),
    }
  }

  fn lower_expr(&mut self, id: ExprId) -> Operand {
    let node = self.ast.exprs[id].clone();
    let ty = node.ty.clone().unwrap_or_else(Type::int);
    match node.kind {
      ExprKind::Literal(lit) => match lit.value {
        LitValue::Int(i) => Operand::ConstInt(i),
        LitValue::Float(f) => Operand::ConstFloat(f as f32),
      },
      ExprKind::StringLiteral(bytes) => {
        let label = crate::symbol::intern(&format!("__str{}", self.module.globals.len()));
        let gid = self.module.globals.push(GlobalVar {
          name: label,
          size: u32::try_from(bytes.len().max(1)).unwrap_or(1),
          init: Some(GlobalInit::Bytes(bytes)),
        });
        Operand::Value(self.new_value(ValueKind::Ptr, ValueOrigin::Global(gid)))
      }
      ExprKind::Variable(_) => {
        let addr = self.address_of(id);
        let k = value_kind(&ty);
        Operand::Value(self.emit(k, Opcode::Load(addr, store_size(k))))
      }
      ExprKind::Binary(op, l, r) => {
        let l_ty = self.ast.exprs[l].ty.clone().unwrap_or_else(Type::int);
        let r_ty = self.ast.exprs[r].ty.clone().unwrap_or_else(Type::int);
        let lv = self.lower_expr(l);
        let rv = self.lower_expr(r);
        let operand_is_float = l_ty.as_base().is_some_and(BaseKind::is_float) || r_ty.as_base().is_some_and(BaseKind::is_float);
        self.lower_binary(op, lv, rv, operand_is_float, &ty)
      }
      ExprKind::Prefix(op, e) => self.lower_unary(op, e, &ty),
      ExprKind::Postfix(op, e) => self.lower_postfix(op, e, &ty),
      ExprKind::Cast(_, e) => {
        let from_ty = self.ast.exprs[e].ty.clone().unwrap_or_else(Type::int);
        let v = self.lower_expr(e);
        self.lower_cast(v, &from_ty, &ty)
      }
      ExprKind::Subscript(..) => {
        let addr = self.address_of(id);
        let k = value_kind(&ty);
        Operand::Value(self.emit(k, Opcode::Load(addr, store_size(k))))
      }
      ExprKind::Call(name, args) => self.lower_call(name, &args, &ty),
      ExprKind::Assignment(lvalue, rvalue) => {
        let addr = self.address_of(lvalue);
        let v = self.lower_expr(rvalue);
        let k = value_kind(&ty);
        self.emit_void(Opcode::Store(addr, v, store_size(k)));
        v
      }
    }
  }

  fn lower_binary(&mut self, op: BinOp, l: Operand, r: Operand, operand_is_float: bool, result_ty: &Type) -> Operand {
    if op.is_comparison() {
      if operand_is_float {
        let (fop, lo, ro) = match op {
          BinOp::Eq => (FCmpOp::Eq, l, r),
          BinOp::Ne => (FCmpOp::Ne, l, r),
          BinOp::Lt => (FCmpOp::Lt, l, r),
          BinOp::Le => (FCmpOp::Le, l, r),
          BinOp::Gt => (FCmpOp::Lt, r, l),
          BinOp::Ge => (FCmpOp::Le, r, l),
          _ => unreachable!(),
        };
        return Operand::Value(self.emit(ValueKind::Int(Size::Word), Opcode::FCmp(fop, lo, ro)))
      }
      let iop = match op {
        BinOp::Eq => ICmpOp::Eq, BinOp::Ne => ICmpOp::Ne, BinOp::Lt => ICmpOp::Lt,
        BinOp::Le => ICmpOp::Le, BinOp::Gt => ICmpOp::Gt, BinOp::Ge => ICmpOp::Ge,
        _ => unreachable!(),
      };
      return Operand::Value(self.emit(ValueKind::Int(Size::Word), Opcode::ICmp(iop, l, r)))
    }
    if op.is_logical() {
      let lb = self.emit(ValueKind::Int(Size::Word), Opcode::ICmp(ICmpOp::Ne, l, Operand::ConstInt(0)));
      let rb = self.emit(ValueKind::Int(Size::Word), Opcode::ICmp(ICmpOp::Ne, r, Operand::ConstInt(0)));
      let iop = if op == BinOp::LogicalAnd { IBinOp::And } else { IBinOp::Or };
      return Operand::Value(self.emit(
        ValueKind::Int(Size::Word), Opcode::IBin(iop, Operand::Value(lb), Operand::Value(rb)),
      ))
    }
    let kind = value_kind(result_ty);
    if kind == ValueKind::Float {
      let fop = match op {
        BinOp::Add => FBinOp::Add, BinOp::Sub => FBinOp::Sub, BinOp::Mul => FBinOp::Mul, BinOp::Div => FBinOp::Div,
        _ => unreachable!("non-arithmetic float binary op"),
      };
      return Operand::Value(self.emit(ValueKind::Float, Opcode::FBin(fop, l, r)))
    }
    if op == BinOp::Mod { return Operand::Value(self.emit(kind, Opcode::Mod(l, r))) }
    let iop = match op {
      BinOp::Add => IBinOp::Add, BinOp::Sub => IBinOp::Sub, BinOp::Mul => IBinOp::Mul, BinOp::Div => IBinOp::Div,
      BinOp::BitAnd => IBinOp::And, BinOp::BitOr => IBinOp::Or, BinOp::BitXor => IBinOp::Xor,
      BinOp::Shl => IBinOp::Shl, BinOp::Shr => IBinOp::Shr,
      _ => unreachable!("comparison/logical handled above"),
    };
    Operand::Value(self.emit(kind, Opcode::IBin(iop, l, r)))
  }

  fn lower_unary(&mut self, op: UnOp, e: ExprId, result_ty: &Type) -> Operand {
    match op {
      UnOp::AddressOf => self.address_of(e),
      UnOp::Deref => {
        let ptr = self.lower_expr(e);
        let kind = value_kind(result_ty);
        Operand::Value(self.emit(kind, Opcode::Load(ptr, store_size(kind))))
      }
      UnOp::LogicalNot => {
        let v = self.lower_expr(e);
        Operand::Value(self.emit(ValueKind::Int(Size::Word), Opcode::ICmp(ICmpOp::Eq, v, Operand::ConstInt(0))))
      }
      UnOp::Plus => self.lower_expr(e),
      UnOp::Neg => {
        let v = self.lower_expr(e);
        let kind = value_kind(result_ty);
        if kind == ValueKind::Float {
          Operand::Value(self.emit(ValueKind::Float, Opcode::FBin(FBinOp::Sub, Operand::ConstFloat(0.0), v)))
        } else {
          Operand::Value(self.emit(kind, Opcode::IBin(IBinOp::Sub, Operand::ConstInt(0), v)))
        }
      }
      UnOp::BitNot => {
        let v = self.lower_expr(e);
        let kind = value_kind(result_ty);
        Operand::Value(self.emit(kind, Opcode::IBin(IBinOp::Xor, v, Operand::ConstInt(-1))))
      }
    }
  }

  fn lower_postfix(&mut self, op: PostOp, e: ExprId, ty: &Type) -> Operand {
    let addr = self.address_of(e);
    let kind = value_kind(ty);
    let old = self.emit(kind, Opcode::Load(addr, store_size(kind)));
    let new = if kind == ValueKind::Float {
      let fop = if op == PostOp::Inc { FBinOp::Add } else { FBinOp::Sub };
      self.emit(ValueKind::Float, Opcode::FBin(fop, Operand::Value(old), Operand::ConstFloat(1.0)))
    } else {
      let iop = if op == PostOp::Inc { IBinOp::Add } else { IBinOp::Sub };
      self.emit(kind, Opcode::IBin(iop, Operand::Value(old), Operand::ConstInt(1)))
    };
    self.emit_void(Opcode::Store(addr, Operand::Value(new), store_size(kind)));
    Operand::Value(old)
  }

  fn lower_cast(&mut self, v: Operand, from: &Type, to: &Type) -> Operand {
    let from_float = from.as_base().is_some_and(BaseKind::is_float);
    let to_float = to.as_base().is_some_and(BaseKind::is_float);
    let to_kind = value_kind(to);
    match (from_float, to_float) {
      (false, true) => Operand::Value(self.emit(ValueKind::Float, Opcode::Cast(CastKind::IntToFloat, v))),
      (true, false) => Operand::Value(self.emit(to_kind, Opcode::Cast(CastKind::FloatToInt, v))),
      _ => Operand::Value(self.emit(to_kind, Opcode::Cast(CastKind::Trivial, v))),
    }
  }

  fn lower_call(&mut self, name: Symbol, args: &[ExprId], ret_ty: &Type) -> Operand {
    let arg_vals: Vec<Operand> = args.iter().map(|&a| self.lower_expr(a)).collect();
    let kind = value_kind(ret_ty);
    if let Some(&callee) = self.func_ids.get(&name) {
      if ret_ty.is_void() {
        self.emit_void(Opcode::Call(callee, arg_vals));
        Operand::ConstInt(0)
      } else {
        Operand::Value(self.emit(kind, Opcode::Call(callee, arg_vals)))
      }
    } else if ret_ty.is_void() {
      self.emit_void(Opcode::ExternCall(name, arg_vals));
      Operand::ConstInt(0)
    } else {
      Operand::Value(self.emit(kind, Opcode::ExternCall(name, arg_vals)))
    }
  }
}
