//! The `check` pass (spec §4.2): type-checks every expression per the
//! type algebra in `ty`, validates `break`/`continue`/`return` placement,
//! and requires non-void function bodies to contain a `return` and global
//! initializers to be constant expressions.

use crate::ast::{Ast, ControlKind, ExprId, ExprKind, PostOp, StmtId, StmtKind};
use crate::diag::{Diagnostic, Diagnostics};
use crate::scope::ScopeKind;
use crate::ty::{self, BaseKind, Type, UnOp};

struct Ctx {
  /// The declared return type of the function currently being walked.
  ret_ty: Option<Type>,
}

pub fn check(ast: &mut Ast, diags: &mut Diagnostics) {
  if let Some(root) = ast.root {
    let mut ctx = Ctx { ret_ty: None };
    check_stmt(ast, root, &mut ctx, diags);
  }
}

fn check_stmt(ast: &mut Ast, id: StmtId, ctx: &mut Ctx, diags: &mut Diagnostics) {
  let node = ast.stmts[id].clone();
  match node.kind {
    StmtKind::Scope(body, _) => for s in body { check_stmt(ast, s, ctx, diags); },
    StmtKind::Expr(e) => { check_expr(ast, e, ctx, diags); }
    StmtKind::VariableDeclaration(_, ref ty, init) => {
      if let Some(e) = init {
        let ety = check_expr(ast, e, ctx, diags);
        if let Some(ety) = ety {
          let _ = crate::ty::convert(&ety, ty, false, node.span, diags);
        }
        if ast.tables.get(node.scope).kind == ScopeKind::Global && !is_constant_expr(ast, e) {
          diags.push(Diagnostic::error(node.span, "global initializer is not a constant expression"));
        }
      }
    }
    StmtKind::FunctionDeclaration(..) | StmtKind::IncludeStdio => {}
    StmtKind::FunctionDefinition(_, ref ret, _, body) => {
      let saved = ctx.ret_ty.replace(ret.clone());
      check_stmt(ast, body, ctx, diags);
      if !ret.is_void() && !stmt_contains_return(ast, body) {
        diags.push(Diagnostic::error(node.span, "non-void function has no return statement"));
      }
      ctx.ret_ty = saved;
    }
    StmtKind::If(cond, t, e) => {
      check_expr(ast, cond, ctx, diags);
      check_stmt(ast, t, ctx, diags);
      if let Some(e) = e { check_stmt(ast, e, ctx, diags); }
    }
    StmtKind::Loop { init, cond, iter, body, .. } => {
      if let Some(init) = init { check_stmt(ast, init, ctx, diags); }
      if let Some(cond) = cond { check_expr(ast, cond, ctx, diags); }
      if let Some(iter) = iter { check_expr(ast, iter, ctx, diags); }
      check_stmt(ast, body, ctx, diags);
    }
    StmtKind::Control(_) => {
      if !ast.tables.lookup_scope(node.scope, ScopeKind::Loop) {
        diags.push(Diagnostic::error(node.span, "break/continue outside of a loop"));
      }
    }
    StmtKind::Return(e) => {
      if !ast.tables.lookup_scope(node.scope, ScopeKind::Function) {
        diags.push(Diagnostic::error(node.span, "return outside of a function"));
      }
      let ety = e.and_then(|e| check_expr(ast, e, ctx, diags));
      let ret_ty = ctx.ret_ty.clone().unwrap_or_else(Type::void);
      match (e, ety) {
        (None, _) if !ret_ty.is_void() =>
          diags.push(Diagnostic::error(node.span, "return with no value in non-void function")),
        (Some(_), Some(ety)) => { let _ = crate::ty::convert(&ety, &ret_ty, false, node.span, diags); }
        _ => {}
      }
    }
  }
}

/// Structural existence check: does `id`'s subtree contain a `return`
/// anywhere (regardless of reachability)? Sufficient for spec §4.2's "at
/// least one return" requirement.
fn stmt_contains_return(ast: &Ast, id: StmtId) -> bool {
  match &ast.stmts[id].kind {
    StmtKind::Return(_) => true,
    StmtKind::Scope(body, _) => body.iter().any(|&s| stmt_contains_return(ast, s)),
    StmtKind::If(_, t, e) => stmt_contains_return(ast, *t) || e.is_some_and(|e| stmt_contains_return(ast, e)),
    StmtKind::Loop { body, .. } => stmt_contains_return(ast, *body),
    _ => false,
  }
}

/// Structural constant-expression check used for global initializers
/// (spec §4.2). Folding (which can turn a `const` variable reference into
/// a literal) runs later, so only literal-rooted trees qualify here.
fn is_constant_expr(ast: &Ast, id: ExprId) -> bool {
  match &ast.exprs[id].kind {
    ExprKind::Literal(_) | ExprKind::StringLiteral(_) => true,
    ExprKind::Cast(_, e) => is_constant_expr(ast, *e),
    ExprKind::Prefix(op, e) => matches!(op, UnOp::Plus | UnOp::Neg | UnOp::LogicalNot | UnOp::BitNot)
      && is_constant_expr(ast, *e),
    ExprKind::Binary(_, l, r) => is_constant_expr(ast, *l) && is_constant_expr(ast, *r),
    _ => false,
  }
}

fn check_expr(ast: &mut Ast, id: ExprId, ctx: &mut Ctx, diags: &mut Diagnostics) -> Option<Type> {
  let node = ast.exprs[id].clone();
  let ty = match node.kind {
    ExprKind::Literal(lit) => Some(Type::base(lit.kind)),
    ExprKind::StringLiteral(_) => Some(Type::pointer(Type::base(BaseKind::Char).constant())),
    ExprKind::Variable(name) => match ast.tables.lookup(node.scope, name) {
      Some((_, e)) => {
        let ty = e.ty.clone();
        if let Some(e) = ast.tables.lookup_mut(node.scope, name) { e.is_used = true; }
        Some(ty)
      }
      None => { diags.push(Diagnostic::error(node.span, format!("use of undeclared identifier '{name}'"))); None }
    },
    ExprKind::Binary(op, l, r) => {
      let lt = check_expr(ast, l, ctx, diags);
      let rt = check_expr(ast, r, ctx, diags);
      match (lt, rt) {
        (Some(lt), Some(rt)) => ty::combine(op, &lt, &rt, node.span, diags),
        _ => None,
      }
    }
    ExprKind::Prefix(op, e) => {
      let et = check_expr(ast, e, ctx, diags);
      if op == UnOp::AddressOf { mark_address_taken(ast, e); }
      et.and_then(|et| ty::unary(op, &et, node.span, diags))
    }
    ExprKind::Postfix(PostOp::Inc | PostOp::Dec, e) => check_expr(ast, e, ctx, diags),
    ExprKind::Cast(target, e) => {
      let et = check_expr(ast, e, ctx, diags);
      if let Some(et) = et { let _ = ty::convert(&et, &target, true, node.span, diags); }
      Some(target)
    }
    ExprKind::Subscript(base, index) => {
      let bt = check_expr(ast, base, ctx, diags);
      let it = check_expr(ast, index, ctx, diags);
      if let Some(it) = &it {
        if it.as_base().is_some_and(BaseKind::is_float) {
          diags.push(Diagnostic::error(node.span, "array index must be integral"));
        }
      }
      bt.and_then(|bt| match bt.deref() {
        Some(inner) => Some(inner.clone()),
        None => { diags.push(Diagnostic::error(node.span, "subscript of non-array/pointer type")); None }
      })
    }
    ExprKind::Call(name, ref args) => {
      let arg_tys: Vec<Option<Type>> = args.iter().map(|&a| check_expr(ast, a, ctx, diags)).collect();
      match ast.tables.lookup(node.scope, name) {
        Some((_, e)) if e.ty.is_function() => {
          let ret = if let crate::ty::TypeKind::Function(ret, params, variadic) = &e.ty.kind {
            if args.len() < params.len() || (!*variadic && args.len() != params.len()) {
              diags.push(Diagnostic::error(node.span, format!("'{name}' called with wrong number of arguments")));
            }
            for (param_ty, arg_ty) in params.iter().zip(arg_tys.iter().flatten()) {
              let _ = ty::convert(arg_ty, param_ty, false, node.span, diags);
            }
            (**ret).clone()
          } else { unreachable!() };
          Some(ret)
        }
        Some(_) => { diags.push(Diagnostic::error(node.span, format!("'{name}' is not callable"))); None }
        None => { diags.push(Diagnostic::error(node.span, format!("call to undeclared function '{name}'"))); None }
      }
    }
    ExprKind::Assignment(lvalue, rvalue) => {
      let lt = check_expr(ast, lvalue, ctx, diags);
      let rt = check_expr(ast, rvalue, ctx, diags);
      if let (Some(lt), Some(rt)) = (&lt, &rt) {
        if lt.is_const {
          diags.push(Diagnostic::error(node.span, "cannot assign to a const-qualified lvalue"));
        }
        let _ = ty::convert(rt, lt, false, node.span, diags);
      }
      lt
    }
  };
  ast.exprs[id].ty = ty.clone();
  ty
}

fn mark_address_taken(ast: &mut Ast, id: ExprId) {
  if let ExprKind::Variable(name) = ast.exprs[id].kind {
    let scope = ast.exprs[id].scope;
    if let Some(e) = ast.tables.lookup_mut(scope, name) { e.is_deref_taken = true; }
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::ast::*;
  use crate::passes::fill::fill;
  use crate::span::Span;
  use crate::symbol::intern;
  use crate::ty::BaseKind;

  fn dummy_span() -> Span { Span::DUMMY }

  fn lit(ast: &mut Ast, scope: crate::scope::ScopeId, n: i64) -> ExprId {
    ast.push_expr(ExprKind::Literal(Literal { value: LitValue::Int(n), kind: BaseKind::Int }), dummy_span(), scope)
  }

  #[test]
  fn return_type_must_convert() {
    let mut ast = Ast::default();
    let root = ast.new_program();
    let gscope = ast.stmts[root].scope;
    let fscope = ast.tables.new_scope(crate::scope::ScopeKind::Function, Some(gscope));
    let one = lit(&mut ast, fscope, 1);
    let ret = ast.push_stmt(StmtKind::Return(Some(one)), dummy_span(), fscope);
    let body = ast.push_stmt(StmtKind::Scope(vec![ret], fscope), dummy_span(), fscope);
    let def = ast.push_stmt(
      StmtKind::FunctionDefinition(intern("f"), Type::int(), vec![], body),
      dummy_span(), gscope,
    );
    if let StmtKind::Scope(b, _) = &mut ast.stmts[root].kind { b.push(def); }
    let mut diags = Diagnostics::default();
    fill(&mut ast, &mut diags);
    check(&mut ast, &mut diags);
    assert!(!diags.has_errors());
  }

  #[test]
  fn missing_return_in_nonvoid_function_errors() {
    let mut ast = Ast::default();
    let root = ast.new_program();
    let gscope = ast.stmts[root].scope;
    let fscope = ast.tables.new_scope(crate::scope::ScopeKind::Function, Some(gscope));
    let body = ast.push_stmt(StmtKind::Scope(vec![], fscope), dummy_span(), fscope);
    let def = ast.push_stmt(
      StmtKind::FunctionDefinition(intern("f"), Type::int(), vec![], body),
      dummy_span(), gscope,
    );
    if let StmtKind::Scope(b, _) = &mut ast.stmts[root].kind { b.push(def); }
    let mut diags = Diagnostics::default();
    fill(&mut ast, &mut diags);
    check(&mut ast, &mut diags);
    assert!(diags.has_errors());
  }

  #[test]
  fn break_outside_loop_errors() {
    let mut ast = Ast::default();
    let root = ast.new_program();
    let gscope = ast.stmts[root].scope;
    let brk = ast.push_stmt(StmtKind::Control(ControlKind::Break), dummy_span(), gscope);
    if let StmtKind::Scope(b, _) = &mut ast.stmts[root].kind { b.push(brk); }
    let mut diags = Diagnostics::default();
    check(&mut ast, &mut diags);
    assert!(diags.has_errors());
  }

  #[test]
  fn global_initializer_must_be_constant() {
    let mut ast = Ast::default();
    let root = ast.new_program();
    let gscope = ast.stmts[root].scope;
    let x = intern("x");
    let y = intern("y");
    let var_expr = ast.push_expr(ExprKind::Variable(x), dummy_span(), gscope);
    let decl_x = ast.push_stmt(StmtKind::VariableDeclaration(x, Type::int(), None), dummy_span(), gscope);
    let decl_y = ast.push_stmt(StmtKind::VariableDeclaration(y, Type::int(), Some(var_expr)), dummy_span(), gscope);
    if let StmtKind::Scope(b, _) = &mut ast.stmts[root].kind { b.push(decl_x); b.push(decl_y); }
    let mut diags = Diagnostics::default();
    fill(&mut ast, &mut diags);
    check(&mut ast, &mut diags);
    assert!(diags.has_errors());
  }
}
