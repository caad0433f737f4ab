//! The AST (spec §3.3).
//!
//! Nodes live in two handle-indexed arenas (`exprs`, `stmts`) owned by
//! [`Ast`]; ownership is strictly downward (a node's children are its own
//! `ExprId`/`StmtId`s) while the symbol table is shared by [`ScopeId`]
//! handle, per the design notes. AST construction from a concrete parse
//! tree is an external collaborator's job (spec §1); this module is the
//! target shape that collaborator builds into via [`Ast`]'s `push_*`
//! constructors.

use smallvec::SmallVec;

use crate::idx::IdxVec;
use crate::mk_idx;
use crate::scope::{ScopeId, ScopeKind, SymbolTables};
use crate::span::Span;
use crate::symbol::Symbol;
use crate::ty::{BaseKind, BinOp, Type, UnOp};

mk_idx! { ExprId }
mk_idx! { StmtId }

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LitValue { Int(i64), Float(f64) }

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Literal { pub value: LitValue, pub kind: BaseKind }

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PostOp { Inc, Dec }

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
  Literal(Literal),
  StringLiteral(Vec<u8>),
  Variable(Symbol),
  Binary(BinOp, ExprId, ExprId),
  Prefix(UnOp, ExprId),
  Postfix(PostOp, ExprId),
  Cast(Type, ExprId),
  Subscript(ExprId, ExprId),
  Call(Symbol, Vec<ExprId>),
  Assignment(ExprId, ExprId),
}

/// An expression node. `ty` starts `None` and is filled in by the `check`
/// pass; after `check` succeeds every node's `ty` is `Some`.
#[derive(Clone, Debug)]
pub struct ExprNode {
  pub kind: ExprKind,
  pub ty: Option<Type>,
  pub span: Span,
  pub scope: ScopeId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlKind { Break, Continue }

#[derive(Clone, Debug)]
pub enum StmtKind {
  /// A `{ ... }` block; `inner` is the scope created for its body.
  Scope(Vec<StmtId>, ScopeId),
  /// An expression evaluated for its side effect (an assignment, a call to
  /// a `void` function) and discarded — the original keeps no separate
  /// expression-statement node either; `Assignment`/`FunctionCall` are
  /// visited directly wherever a block's body admits one.
  Expr(ExprId),
  VariableDeclaration(Symbol, Type, Option<ExprId>),
  FunctionDefinition(Symbol, Type, Vec<(Symbol, Type)>, StmtId),
  FunctionDeclaration(Symbol, Type, Vec<Type>),
  If(ExprId, StmtId, Option<StmtId>),
  Loop { init: Option<StmtId>, cond: Option<ExprId>, iter: Option<ExprId>, body: StmtId, do_while: bool },
  Control(ControlKind),
  Return(Option<ExprId>),
  IncludeStdio,
}

#[derive(Clone, Debug)]
pub struct StmtNode {
  pub kind: StmtKind,
  pub span: Span,
  pub scope: ScopeId,
}

/// A reference to either kind of node, used for generic tree walks (dot
/// export, etc.) that don't care which arena a child lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnyId { Expr(ExprId), Stmt(StmtId) }

pub struct Ast {
  pub exprs: IdxVec<ExprId, ExprNode>,
  pub stmts: IdxVec<StmtId, StmtNode>,
  pub tables: SymbolTables,
  pub root: Option<StmtId>,
}

impl Default for Ast {
  fn default() -> Self {
    Ast { exprs: IdxVec::new(), stmts: IdxVec::new(), tables: SymbolTables::default(), root: None }
  }
}

impl Ast {
  /// Create the top-level global scope and the root `Scope` statement that
  /// owns it. Called once by whatever builds the AST before any
  /// declarations are pushed.
  pub fn new_program(&mut self) -> StmtId {
    let global = self.tables.new_scope(ScopeKind::Global, None);
    let root = self.stmts.push(StmtNode {
      kind: StmtKind::Scope(Vec::new(), global),
      span: Span::DUMMY,
      scope: global,
    });
    self.root = Some(root);
    root
  }

  pub fn push_expr(&mut self, kind: ExprKind, span: Span, scope: ScopeId) -> ExprId {
    self.exprs.push(ExprNode { kind, ty: None, span, scope })
  }

  pub fn push_stmt(&mut self, kind: StmtKind, span: Span, scope: ScopeId) -> StmtId {
    self.stmts.push(StmtNode { kind, span, scope })
  }

  /// The direct children of an expression node, for tree walks that don't
  /// need to distinguish expression kinds (dot export's seam; spec §6).
  #[must_use] pub fn expr_children(&self, id: ExprId) -> SmallVec<[AnyId; 4]> {
    let mut out = SmallVec::new();
    match &self.exprs[id].kind {
      ExprKind::Literal(_) | ExprKind::StringLiteral(_) | ExprKind::Variable(_) => {}
      ExprKind::Prefix(_, e) | ExprKind::Postfix(_, e) | ExprKind::Cast(_, e) => out.push(AnyId::Expr(*e)),
      ExprKind::Binary(_, l, r) | ExprKind::Subscript(l, r) | ExprKind::Assignment(l, r) => {
        out.push(AnyId::Expr(*l));
        out.push(AnyId::Expr(*r));
      }
      ExprKind::Call(_, args) => out.extend(args.iter().copied().map(AnyId::Expr)),
    }
    out
  }

  /// The direct children of a statement node.
  #[must_use] pub fn stmt_children(&self, id: StmtId) -> SmallVec<[AnyId; 4]> {
    let mut out = SmallVec::new();
    match &self.stmts[id].kind {
      StmtKind::Scope(body, _) => out.extend(body.iter().copied().map(AnyId::Stmt)),
      StmtKind::Expr(e) => out.push(AnyId::Expr(*e)),
      StmtKind::VariableDeclaration(_, _, init) => out.extend(init.map(AnyId::Expr)),
      StmtKind::FunctionDefinition(_, _, _, body) => out.push(AnyId::Stmt(*body)),
      StmtKind::FunctionDeclaration(..) | StmtKind::Control(_) | StmtKind::IncludeStdio => {}
      StmtKind::If(c, t, e) => {
        out.push(AnyId::Expr(*c));
        out.push(AnyId::Stmt(*t));
        out.extend(e.map(AnyId::Stmt));
      }
      StmtKind::Loop { init, cond, iter, body, .. } => {
        out.extend(init.map(AnyId::Stmt));
        out.extend(cond.map(AnyId::Expr));
        out.extend(iter.map(AnyId::Expr));
        out.push(AnyId::Stmt(*body));
      }
      StmtKind::Return(e) => out.extend(e.map(AnyId::Expr)),
    }
    out
  }
}
