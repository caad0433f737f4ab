//! The `fold` pass (spec §4.2): constant folding and dead-code elimination.
//!
//! A tree rewrite: every `fold_stmt` call returns the (possibly absent)
//! replacement for a statement, and every `fold_expr` call returns the
//! (always present — expressions are never removed outright, only
//! statements) replacement for an expression. Folding is idempotent modulo
//! node identity (spec §8): re-running it over an already-folded tree
//! performs no further rewrites beyond allocating fresh, value-identical
//! nodes.

use crate::ast::{Ast, ExprId, ExprKind, Literal, LitValue, StmtId, StmtKind};
use crate::scope::{ScopeId, ScopeKind};
use crate::span::Span;
use crate::symbol::Symbol;
use crate::ty::{BaseKind, BinOp, Type, TypeKind, UnOp};

pub fn fold(ast: &mut Ast) {
  if let Some(root) = ast.root {
    if fold_stmt(ast, root).is_none() {
      let scope = ast.stmts[root].scope;
      ast.stmts[root].kind = StmtKind::Scope(Vec::new(), scope);
    }
  }
}

fn empty_scope(ast: &mut Ast, scope: ScopeId, span: Span) -> StmtId {
  ast.push_stmt(StmtKind::Scope(Vec::new(), scope), span, scope)
}

fn fold_stmt(ast: &mut Ast, id: StmtId) -> Option<StmtId> {
  let node = ast.stmts[id].clone();
  match node.kind {
    StmtKind::Scope(body, scope) => {
      let mut new_body = Vec::new();
      for s in body {
        let Some(fid) = fold_stmt(ast, s) else { continue };
        let scope_kind = ast.tables.get(scope).kind;
        let stop = match &ast.stmts[fid].kind {
          StmtKind::Return(_) => scope_kind == ScopeKind::Function,
          StmtKind::Control(_) => scope_kind == ScopeKind::Loop,
          _ => false,
        };
        new_body.push(fid);
        if stop { break }
      }
      ast.stmts[id].kind = StmtKind::Scope(new_body, scope);
      Some(id)
    }
    StmtKind::Expr(e) => {
      let folded = fold_expr(ast, e);
      ast.stmts[id].kind = StmtKind::Expr(folded);
      Some(id)
    }
    StmtKind::VariableDeclaration(name, ty, init) => fold_var_decl(ast, id, name, ty, init, node.scope, node.span),
    StmtKind::FunctionDefinition(name, ret, params, body) => {
      let folded_body = fold_stmt(ast, body)
        .unwrap_or_else(|| empty_scope(ast, ast.stmts[body].scope, node.span));
      ast.stmts[id].kind = StmtKind::FunctionDefinition(name, ret, params, folded_body);
      Some(id)
    }
    StmtKind::FunctionDeclaration(..) | StmtKind::IncludeStdio | StmtKind::Control(_) => Some(id),
    StmtKind::If(cond, t, e) => {
      let cond_id = fold_expr(ast, cond);
      if let ExprKind::Literal(lit) = ast.exprs[cond_id].kind.clone() {
        return if truthy(lit.value) { fold_stmt(ast, t) } else { e.and_then(|e| fold_stmt(ast, e)) }
      }
      let t_id = fold_stmt(ast, t).unwrap_or_else(|| empty_scope(ast, ast.stmts[t].scope, node.span));
      let e_id = e.and_then(|e| fold_stmt(ast, e));
      ast.stmts[id].kind = StmtKind::If(cond_id, t_id, e_id);
      Some(id)
    }
    StmtKind::Loop { init, cond, iter, body, do_while } => {
      let init_id = init.and_then(|i| fold_stmt(ast, i));
      let cond_id = cond.map(|c| fold_expr(ast, c));
      if let Some(cid) = cond_id {
        if let ExprKind::Literal(lit) = ast.exprs[cid].kind.clone() {
          if !truthy(lit.value) { return None }
        }
      }
      let iter_id = iter.map(|i| fold_expr(ast, i));
      let body_id = fold_stmt(ast, body).unwrap_or_else(|| empty_scope(ast, ast.stmts[body].scope, node.span));
      ast.stmts[id].kind = StmtKind::Loop { init: init_id, cond: cond_id, iter: iter_id, body: body_id, do_while };
      Some(id)
    }
    StmtKind::Return(e) => {
      let e2 = e.map(|e| fold_expr(ast, e));
      ast.stmts[id].kind = StmtKind::Return(e2);
      Some(id)
    }
  }
}

fn fold_var_decl(
  ast: &mut Ast, id: StmtId, name: Symbol, ty: Type, init: Option<ExprId>, scope: ScopeId, span: Span,
) -> Option<StmtId> {
  let mut init_id = init.map(|e| fold_expr(ast, e));

  // "A precast is inserted when a constant initializer's type differs from
  // the declared type" — we fold the cast immediately rather than leaving a
  // `Cast` node, since a cast of a literal is itself constant-foldable.
  if let (Some(e), TypeKind::Base(declared)) = (init_id, &ty.kind) {
    if let ExprKind::Literal(lit) = ast.exprs[e].kind.clone() {
      if lit.kind != *declared {
        let casted = cast_literal(lit, *declared);
        init_id = Some(ast.push_expr(ExprKind::Literal(casted), ast.exprs[e].span, ast.exprs[e].scope));
      }
    }
  }

  let literal_val = init_id.and_then(|e| match ast.exprs[e].kind.clone() {
    ExprKind::Literal(lit) => Some(lit),
    _ => None,
  });

  let Some((_, entry)) = ast.tables.lookup(scope, name) else {
    ast.stmts[id].kind = StmtKind::VariableDeclaration(name, ty, init_id);
    return Some(id)
  };
  let (is_used, is_deref_taken) = (entry.is_used, entry.is_deref_taken);

  if ty.is_const {
    if let Some(lit) = literal_val {
      if let Some(e) = ast.tables.lookup_mut(scope, name) {
        e.literal = Some(match lit.value {
          LitValue::Int(i) => crate::scope::Literal::Int(i),
          LitValue::Float(f) => crate::scope::Literal::Float(f),
        });
      }
      if !is_deref_taken { return None }
      ast.stmts[id].kind = StmtKind::VariableDeclaration(name, ty, init_id);
      return Some(id)
    }
  }

  if !is_used { return None }
  ast.stmts[id].kind = StmtKind::VariableDeclaration(name, ty, init_id);
  Some(id)
}

fn fold_expr(ast: &mut Ast, id: ExprId) -> ExprId {
  let node = ast.exprs[id].clone();
  match node.kind {
    ExprKind::Literal(_) | ExprKind::StringLiteral(_) => id,
    ExprKind::Variable(name) => {
      if let Some((_, entry)) = ast.tables.lookup(node.scope, name) {
        if let Some(lit) = entry.literal {
          let kind = entry.ty.as_base().unwrap_or(BaseKind::Int);
          let value = match lit {
            crate::scope::Literal::Int(i) => LitValue::Int(i),
            crate::scope::Literal::Float(f) => LitValue::Float(f),
          };
          return ast.push_expr(ExprKind::Literal(Literal { value, kind }), node.span, node.scope)
        }
      }
      id
    }
    ExprKind::Binary(op, l, r) => {
      let l2 = fold_expr(ast, l);
      let r2 = fold_expr(ast, r);
      if let (ExprKind::Literal(ll), ExprKind::Literal(rl)) = (ast.exprs[l2].kind.clone(), ast.exprs[r2].kind.clone()) {
        let result_kind = if op.is_comparison() || op.is_logical() { BaseKind::Int } else { ll.kind.max(rl.kind) };
        if let Some(folded) = fold_binary(op, ll, rl, result_kind) {
          return ast.push_expr(ExprKind::Literal(folded), node.span, node.scope)
        }
      }
      ast.exprs[id].kind = ExprKind::Binary(op, l2, r2);
      id
    }
    ExprKind::Prefix(op, e) => {
      // The operand of `&x` must remain a place expression; substituting a
      // const variable's folded literal there would silently change `&x`
      // into the address of a temporary.
      if op == UnOp::AddressOf { return id }
      let e2 = fold_expr(ast, e);
      if let ExprKind::Literal(lit) = ast.exprs[e2].kind.clone() {
        if let Some(folded) = fold_unary(op, lit) {
          return ast.push_expr(ExprKind::Literal(folded), node.span, node.scope)
        }
      }
      ast.exprs[id].kind = ExprKind::Prefix(op, e2);
      id
    }
    // `x++`/`x--` require `e` to remain an lvalue; no folding of `e` itself.
    ExprKind::Postfix(..) => id,
    ExprKind::Cast(target, e) => {
      let e2 = fold_expr(ast, e);
      if let ExprKind::Literal(lit) = ast.exprs[e2].kind.clone() {
        if let Some(tb) = target.as_base() {
          let folded = cast_literal(lit, tb);
          return ast.push_expr(ExprKind::Literal(folded), node.span, node.scope)
        }
      }
      ast.exprs[id].kind = ExprKind::Cast(target, e2);
      id
    }
    ExprKind::Subscript(b, i) => {
      let b2 = fold_expr(ast, b);
      let i2 = fold_expr(ast, i);
      ast.exprs[id].kind = ExprKind::Subscript(b2, i2);
      id
    }
    ExprKind::Call(name, args) => {
      let a2: Vec<_> = args.into_iter().map(|a| fold_expr(ast, a)).collect();
      ast.exprs[id].kind = ExprKind::Call(name, a2);
      id
    }
    ExprKind::Assignment(l, r) => {
      let l2 = fold_expr(ast, l);
      let r2 = fold_expr(ast, r);
      ast.exprs[id].kind = ExprKind::Assignment(l2, r2);
      id
    }
  }
}

fn truncate_int(i: i64, k: BaseKind) -> i64 {
  match k {
    BaseKind::Char => i64::from(i as i8),
    BaseKind::Short => i64::from(i as i16),
    BaseKind::Int => i64::from(i as i32),
    BaseKind::Long | BaseKind::Float | BaseKind::Double => i,
  }
}

fn cast_literal(lit: Literal, target: BaseKind) -> Literal {
  let value = match (lit.value, target.is_float()) {
    (LitValue::Int(i), false) => LitValue::Int(truncate_int(i, target)),
    (LitValue::Int(i), true) => LitValue::Float(i as f64),
    (LitValue::Float(f), false) => LitValue::Int(truncate_int(f as i64, target)),
    (LitValue::Float(f), true) => LitValue::Float(f),
  };
  Literal { value, kind: target }
}

fn as_f64(v: LitValue) -> f64 { match v { LitValue::Int(i) => i as f64, LitValue::Float(f) => f } }
fn as_i64(v: LitValue) -> i64 { match v { LitValue::Int(i) => i, LitValue::Float(f) => f as i64 } }
fn truthy(v: LitValue) -> bool { match v { LitValue::Int(i) => i != 0, LitValue::Float(f) => f != 0.0 } }

fn cmp(op: BinOp, a: f64, b: f64) -> bool {
  match op {
    BinOp::Eq => a == b,
    BinOp::Ne => a != b,
    BinOp::Lt => a < b,
    BinOp::Le => a <= b,
    BinOp::Gt => a > b,
    BinOp::Ge => a >= b,
    _ => unreachable!("cmp called with non-comparison op"),
  }
}

fn fold_unary(op: UnOp, v: Literal) -> Option<Literal> {
  match op {
    UnOp::Plus => Some(v),
    UnOp::Neg => Some(match v.value {
      LitValue::Int(i) => Literal { value: LitValue::Int(truncate_int(i.wrapping_neg(), v.kind)), kind: v.kind },
      LitValue::Float(f) => Literal { value: LitValue::Float(-f), kind: v.kind },
    }),
    UnOp::LogicalNot => Some(Literal { value: LitValue::Int(i64::from(!truthy(v.value))), kind: BaseKind::Int }),
    UnOp::BitNot => match v.value {
      LitValue::Int(i) => Some(Literal { value: LitValue::Int(truncate_int(!i, v.kind)), kind: v.kind }),
      LitValue::Float(_) => None,
    },
    UnOp::Deref | UnOp::AddressOf => None,
  }
}

fn fold_binary(op: BinOp, l: Literal, r: Literal, result_kind: BaseKind) -> Option<Literal> {
  if op.is_logical() {
    let v = match op {
      BinOp::LogicalAnd => truthy(l.value) && truthy(r.value),
      BinOp::LogicalOr => truthy(l.value) || truthy(r.value),
      _ => unreachable!(),
    };
    return Some(Literal { value: LitValue::Int(i64::from(v)), kind: BaseKind::Int })
  }
  if op.is_comparison() {
    let v = cmp(op, as_f64(l.value), as_f64(r.value));
    return Some(Literal { value: LitValue::Int(i64::from(v)), kind: BaseKind::Int })
  }
  if result_kind.is_float() {
    let (a, b) = (as_f64(l.value), as_f64(r.value));
    let v = match op {
      BinOp::Add => a + b,
      BinOp::Sub => a - b,
      BinOp::Mul => a * b,
      BinOp::Div => { if b == 0.0 { return None } a / b }
      _ => return None,
    };
    return Some(Literal { value: LitValue::Float(v), kind: result_kind })
  }
  let (a, b) = (as_i64(l.value), as_i64(r.value));
  let v = match op {
    BinOp::Add => a.wrapping_add(b),
    BinOp::Sub => a.wrapping_sub(b),
    BinOp::Mul => a.wrapping_mul(b),
    BinOp::Div => { if b == 0 { return None } a.wrapping_div(b) }
    BinOp::Mod => { if b == 0 { return None } a.wrapping_rem(b) }
    BinOp::BitAnd => a & b,
    BinOp::BitOr => a | b,
    BinOp::BitXor => a ^ b,
    BinOp::Shl => a.wrapping_shl(u32::try_from(b).unwrap_or(0)),
    BinOp::Shr => a.wrapping_shr(u32::try_from(b).unwrap_or(0)),
    _ => return None,
  };
  Some(Literal { value: LitValue::Int(truncate_int(v, result_kind)), kind: result_kind })
}
