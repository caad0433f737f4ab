//! The `fill` pass (spec §4.2): populate symbol tables and validate
//! declarations. Runs first, depth-first, invoking itself on children in
//! declaration order (a function's own symbol is inserted before its body
//! is walked, so recursive calls resolve).

use crate::ast::{Ast, ExprKind, StmtId, StmtKind};
use crate::diag::{Diagnostic, Diagnostics};
use crate::scope::Entry;
use crate::symbol::intern;
use crate::ty::{BaseKind, Type};

/// Run `fill` over the whole program.
pub fn fill(ast: &mut Ast, diags: &mut Diagnostics) {
  if let Some(root) = ast.root {
    fill_stmt(ast, root, diags);
  }
}

fn fill_stmt(ast: &mut Ast, id: StmtId, diags: &mut Diagnostics) {
  let node = ast.stmts[id].clone();
  match node.kind {
    StmtKind::Scope(body, _) => {
      for s in body { fill_stmt(ast, s, diags); }
    }
    StmtKind::Expr(e) => fill_expr(ast, e, diags),
    StmtKind::VariableDeclaration(name, ty, init) => {
      let mut entry = Entry::new(ty);
      entry.is_initialized = init.is_some();
      if let Err(msg) = ast.tables.insert(node.scope, name, entry) {
        diags.push(Diagnostic::error(node.span, msg));
      }
      if let Some(e) = init { fill_expr(ast, e, diags); }
    }
    StmtKind::FunctionDeclaration(name, ret, params) => {
      let ty = Type::function(ret, params, false);
      declare_function(ast, node.scope, name, ty, node.span, diags);
    }
    StmtKind::FunctionDefinition(name, ret, ref params, body) => {
      let ty = Type::function(ret, params.iter().map(|(_, t)| t.clone()).collect(), false);
      declare_function(ast, node.scope, name, ty, node.span, diags);
      let body_scope = ast.stmts[body].scope;
      for (pname, pty) in params {
        let mut entry = Entry::new(pty.clone());
        entry.is_initialized = true;
        if let Err(msg) = ast.tables.insert(body_scope, *pname, entry) {
          diags.push(Diagnostic::error(node.span, msg));
        }
      }
      fill_stmt(ast, body, diags);
    }
    StmtKind::IncludeStdio => {
      let stdio_sig = Type::function(Type::int(), vec![Type::pointer(Type::base(BaseKind::Char))], true);
      for name in ["printf", "scanf"] {
        declare_function(ast, node.scope, intern(name), stdio_sig.clone(), node.span, diags);
      }
    }
    StmtKind::If(cond, t, e) => {
      fill_expr(ast, cond, diags);
      fill_stmt(ast, t, diags);
      if let Some(e) = e { fill_stmt(ast, e, diags); }
    }
    StmtKind::Loop { init, cond, iter, body, .. } => {
      if let Some(init) = init { fill_stmt(ast, init, diags); }
      if let Some(cond) = cond { fill_expr(ast, cond, diags); }
      if let Some(iter) = iter { fill_expr(ast, iter, diags); }
      fill_stmt(ast, body, diags);
    }
    StmtKind::Return(e) => { if let Some(e) = e { fill_expr(ast, e, diags); } }
    StmtKind::Control(_) => {}
  }
}

fn declare_function(
  ast: &mut crate::ast::Ast, scope: crate::scope::ScopeId, name: crate::symbol::Symbol,
  ty: Type, span: crate::span::Span, diags: &mut Diagnostics,
) {
  match ast.tables.lookup(scope, name) {
    Some((owner, prev)) if owner == scope => {
      if prev.ty != ty {
        diags.push(Diagnostic::error(span, format!("conflicting declaration of '{name}'")));
      }
    }
    _ => {
      let mut entry = Entry::new(ty);
      entry.is_initialized = true;
      // Function declarations never conflict with an empty scope; any
      // error here is a genuine redefinition against a non-function name.
      if let Err(msg) = ast.tables.insert(scope, name, entry) {
        diags.push(Diagnostic::error(span, msg));
      }
    }
  }
}

fn fill_expr(ast: &mut Ast, id: crate::ast::ExprId, diags: &mut Diagnostics) {
  let kind = ast.exprs[id].kind.clone();
  match kind {
    ExprKind::Literal(_) | ExprKind::StringLiteral(_) | ExprKind::Variable(_) => {}
    ExprKind::Prefix(_, e) | ExprKind::Postfix(_, e) | ExprKind::Cast(_, e) => fill_expr(ast, e, diags),
    ExprKind::Binary(_, l, r) | ExprKind::Subscript(l, r) | ExprKind::Assignment(l, r) => {
      fill_expr(ast, l, diags);
      fill_expr(ast, r, diags);
    }
    ExprKind::Call(_, args) => for a in args { fill_expr(ast, a, diags); }
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::ast::*;
  use crate::scope::ScopeKind;
  use crate::span::Span;

  #[test]
  fn declares_variable_in_enclosing_scope() {
    let mut ast = Ast::default();
    let root = ast.new_program();
    let scope = ast.stmts[root].scope;
    let x = intern("x");
    let decl = ast.push_stmt(StmtKind::VariableDeclaration(x, Type::int(), None), Span::DUMMY, scope);
    if let StmtKind::Scope(body, _) = &mut ast.stmts[root].kind { body.push(decl); }
    let mut diags = Diagnostics::default();
    fill(&mut ast, &mut diags);
    assert!(!diags.has_errors());
    assert!(ast.tables.lookup(scope, x).is_some());
  }

  #[test]
  fn include_stdio_declares_printf_and_scanf() {
    let mut ast = Ast::default();
    let root = ast.new_program();
    let scope = ast.stmts[root].scope;
    let inc = ast.push_stmt(StmtKind::IncludeStdio, Span::DUMMY, scope);
    if let StmtKind::Scope(body, _) = &mut ast.stmts[root].kind { body.push(inc); }
    let mut diags = Diagnostics::default();
    fill(&mut ast, &mut diags);
    assert!(!diags.has_errors());
    assert!(ast.tables.lookup(scope, intern("printf")).is_some());
    assert!(ast.tables.lookup(scope, intern("scanf")).is_some());
  }

  #[test]
  fn redeclaring_variable_is_an_error() {
    let mut ast = Ast::default();
    let root = ast.new_program();
    let scope = ast.stmts[root].scope;
    let x = intern("x");
    let d1 = ast.push_stmt(StmtKind::VariableDeclaration(x, Type::int(), None), Span::DUMMY, scope);
    let d2 = ast.push_stmt(StmtKind::VariableDeclaration(x, Type::int(), None), Span::DUMMY, scope);
    if let StmtKind::Scope(body, _) = &mut ast.stmts[root].kind { body.push(d1); body.push(d2); }
    let mut diags = Diagnostics::default();
    fill(&mut ast, &mut diags);
    assert!(diags.has_errors());
  }

  #[test]
  fn function_params_fill_body_scope() {
    let mut ast = Ast::default();
    let root = ast.new_program();
    let gscope = ast.stmts[root].scope;
    let fscope = ast.tables.new_scope(ScopeKind::Function, Some(gscope));
    let body = ast.push_stmt(StmtKind::Scope(vec![], fscope), Span::DUMMY, fscope);
    let n = intern("n");
    let f = intern("f");
    let def = ast.push_stmt(
      StmtKind::FunctionDefinition(f, Type::int(), vec![(n, Type::int())], body),
      Span::DUMMY, gscope,
    );
    if let StmtKind::Scope(b, _) = &mut ast.stmts[root].kind { b.push(def); }
    let mut diags = Diagnostics::default();
    fill(&mut ast, &mut diags);
    assert!(!diags.has_errors());
    assert!(ast.tables.lookup(fscope, n).is_some());
    assert!(ast.tables.lookup(gscope, f).is_some());
  }
}
